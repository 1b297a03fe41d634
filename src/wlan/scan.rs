//! Scan result buffer behind a non-blocking gate.
//!
//! The radio controller holds the gate for the whole scan and fills the
//! buffer; a reader holding the gate sees a stable snapshot and keeps the
//! next scan from starting.  Neither side ever waits: a busy gate means
//! "skip this cycle" for the scanner and "try later" for a reader.

use core::ops::Deref;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::{Mutex, MutexGuard};
use serde::Serialize;

use crate::config::SCAN_MAX_AP;
use crate::error::ScanError;

/// One access point seen by a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApRecord {
    pub ssid: heapless::String<32>,
    pub rssi: i8,
}

impl ApRecord {
    /// SSIDs longer than 32 bytes are truncated.
    pub fn new(ssid: &str, rssi: i8) -> Self {
        let mut s = heapless::String::new();
        for c in ssid.chars() {
            if s.push(c).is_err() {
                break;
            }
        }
        Self { ssid: s, rssi }
    }
}

pub type ApRecords = heapless::Vec<ApRecord, SCAN_MAX_AP>;

#[derive(Default)]
pub struct ScanResults {
    records: Mutex<CriticalSectionRawMutex, ApRecords>,
}

impl ScanResults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the gate without waiting.
    pub fn try_get(&self) -> Result<ScanGuard<'_>, ScanError> {
        self.records
            .try_lock()
            .map(|guard| ScanGuard { guard })
            .map_err(|_| ScanError::Busy)
    }
}

/// Held scan gate; released on drop.
pub struct ScanGuard<'a> {
    guard: MutexGuard<'a, CriticalSectionRawMutex, ApRecords>,
}

impl ScanGuard<'_> {
    pub fn replace(&mut self, records: ApRecords) {
        *self.guard = records;
    }
}

impl Deref for ScanGuard<'_> {
    type Target = [ApRecord];

    fn deref(&self) -> &[ApRecord] {
        &self.guard
    }
}
