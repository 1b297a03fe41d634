//! Stored Wi-Fi credentials with scoped, bounded-wait checkout.
//!
//! Up to five `{ssid, key}` entries live in one postcard blob in NVS.  A
//! reader takes a [`CredentialsGuard`] through [`CredentialStore::checkout`];
//! the lock is released when the guard is dropped, on every path.  Only an
//! explicit `release(true)` writes the entries back.

use core::ops::{Deref, DerefMut};
use core::time::Duration;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::{Mutex, MutexGuard};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::app::ports::StoragePort;
use crate::config::{MAX_WIFI_NETWORKS, validate_ssid};
use crate::error::StorageError;
use crate::sync::lock_within;
use crate::wlan::scan::ApRecord;

const NAMESPACE: &str = "wifi";
const KEY: &str = "creds";
const BLOB_SIZE: usize = 512;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiNetwork {
    pub ssid: heapless::String<32>,
    pub key: heapless::String<64>,
}

impl WifiNetwork {
    pub fn is_empty(&self) -> bool {
        self.ssid.is_empty()
    }
}

/// The fixed table of stored networks.  An empty SSID marks a free slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiCredentials {
    networks: [WifiNetwork; MAX_WIFI_NETWORKS],
}

impl WifiCredentials {
    pub fn networks(&self) -> impl Iterator<Item = &WifiNetwork> {
        self.networks.iter().filter(|n| !n.is_empty())
    }

    /// Overwrite slot `index`.
    pub fn set(&mut self, index: usize, ssid: &str, key: &str) -> Result<(), &'static str> {
        validate_ssid(ssid)?;
        let slot = self.networks.get_mut(index).ok_or("slot out of range")?;
        let mut entry = WifiNetwork::default();
        entry.ssid.push_str(ssid).map_err(|()| "ssid too long")?;
        entry.key.push_str(key).map_err(|()| "key too long")?;
        *slot = entry;
        Ok(())
    }

    pub fn clear(&mut self, index: usize) {
        if let Some(slot) = self.networks.get_mut(index) {
            *slot = WifiNetwork::default();
        }
    }

    /// The stored entry for the first scanned network we know, in scan order.
    pub fn first_match(&self, scanned: &[ApRecord]) -> Option<&WifiNetwork> {
        scanned.iter().find_map(|ap| self.networks().find(|n| n.ssid == ap.ssid))
    }
}

struct Inner {
    storage: Box<dyn StoragePort + Send>,
    credentials: WifiCredentials,
}

pub struct CredentialStore {
    inner: Mutex<CriticalSectionRawMutex, Inner>,
    lock_wait: Duration,
}

impl CredentialStore {
    /// Load the stored table.  Missing or undecodable data yields an empty
    /// table.
    pub fn open(storage: Box<dyn StoragePort + Send>, lock_wait: Duration) -> Self {
        let mut buf = [0u8; BLOB_SIZE];
        let credentials = match storage.read(NAMESPACE, KEY, &mut buf) {
            Ok(len) => postcard::from_bytes(&buf[..len]).unwrap_or_else(|_| {
                warn!("fs: wifi credentials corrupted, starting empty");
                WifiCredentials::default()
            }),
            Err(StorageError::NotFound) => WifiCredentials::default(),
            Err(e) => {
                warn!("fs: wifi credentials unreadable ({})", e);
                WifiCredentials::default()
            }
        };
        info!("fs: {} stored networks", credentials.networks().count());
        Self {
            inner: Mutex::new(Inner {
                storage,
                credentials,
            }),
            lock_wait,
        }
    }

    /// Exclusive access to the credential table, waiting at most the
    /// configured lock wait.
    pub fn checkout(&self) -> Result<CredentialsGuard<'_>, StorageError> {
        match lock_within(&self.inner, self.lock_wait) {
            Some(guard) => Ok(CredentialsGuard { guard }),
            None => {
                warn!("fs: wifi credentials busy");
                Err(StorageError::Busy)
            }
        }
    }
}

/// Checked-out credential table.  Dropping it releases without persisting.
pub struct CredentialsGuard<'a> {
    guard: MutexGuard<'a, CriticalSectionRawMutex, Inner>,
}

impl CredentialsGuard<'_> {
    /// Release the checkout, writing the table to flash when `persist`.
    pub fn release(mut self, persist: bool) -> Result<(), StorageError> {
        if !persist {
            return Ok(());
        }
        let inner = &mut *self.guard;
        let bytes =
            postcard::to_allocvec(&inner.credentials).map_err(|_| StorageError::IoError)?;
        inner.storage.write(NAMESPACE, KEY, &bytes)?;
        info!("fs: wifi credentials saved");
        Ok(())
    }
}

impl Deref for CredentialsGuard<'_> {
    type Target = WifiCredentials;

    fn deref(&self) -> &WifiCredentials {
        &self.guard.credentials
    }
}

impl DerefMut for CredentialsGuard<'_> {
    fn deref_mut(&mut self) -> &mut WifiCredentials {
        &mut self.guard.credentials
    }
}
