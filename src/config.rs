//! System configuration parameters
//!
//! Tunable parameters for the audio appliance network stack, plus the
//! compile-time capacities of the fixed-size tables.

use core::time::Duration;

use serde::{Deserialize, Serialize};

// --- Compile-time capacities ---

/// Distinct message types the bus can hand out (bit width of the mask).
pub const MAX_MESSAGE_TYPES: usize = 32;
/// Listener registrations the bus accepts.
pub const MAX_LISTENERS: usize = 20;
/// Queue depth of every listener.
pub const LISTENER_DEPTH: usize = 10;
/// Live rows in the connection table.
pub const MAX_CONNECTIONS: usize = 5;
/// Access-point records kept from one scan.
pub const SCAN_MAX_AP: usize = 20;
/// Stored Wi-Fi networks.
pub const MAX_WIFI_NETWORKS: usize = 5;

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Identity ---
    /// Hostname for both interfaces and mDNS.
    pub hostname: heapless::String<24>,
    /// Two-letter regulatory domain.
    pub country_code: heapless::String<2>,

    // --- Soft AP ---
    /// SSID broadcast while hosting the access point.
    pub ap_ssid: heapless::String<32>,
    /// WPA2 key of the access point.
    pub ap_key: heapless::String<64>,
    /// Radio channel of the access point (1-13).
    pub ap_channel: u8,
    /// Maximum simultaneously attached AP clients.
    pub ap_max_clients: u8,

    // --- Service advertisement ---
    /// mDNS service type, e.g. `_audio-jsonrpc-ws`.
    pub mdns_service: heapless::String<32>,
    /// TCP port of the HTTP/WebSocket server.
    pub http_port: u16,

    // --- Timing ---
    /// Station reconnect period (seconds).
    pub reconnect_secs: u32,
    /// Bounded wait for table and storage locks (milliseconds).
    pub lock_wait_ms: u32,
}

impl SystemConfig {
    pub fn reconnect_period(&self) -> Duration {
        Duration::from_secs(u64::from(self.reconnect_secs))
    }

    pub fn lock_wait(&self) -> Duration {
        Duration::from_millis(u64::from(self.lock_wait_ms))
    }

    /// Range-check every field.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.hostname.is_empty() {
            return Err("hostname must not be empty");
        }
        if self.country_code.len() != 2 {
            return Err("country_code must be two letters");
        }
        validate_ssid(&self.ap_ssid)?;
        if !self.ap_key.is_empty() && self.ap_key.len() < 8 {
            return Err("ap_key must be 8-64 bytes or empty");
        }
        if !(1..=13).contains(&self.ap_channel) {
            return Err("ap_channel must be 1-13");
        }
        if self.ap_max_clients == 0 || usize::from(self.ap_max_clients) > MAX_CONNECTIONS {
            return Err("ap_max_clients must be 1-5");
        }
        if self.reconnect_secs == 0 {
            return Err("reconnect_secs must be non-zero");
        }
        if self.lock_wait_ms == 0 {
            return Err("lock_wait_ms must be non-zero");
        }
        Ok(())
    }
}

/// SSIDs are 1-32 printable ASCII bytes.
pub fn validate_ssid(ssid: &str) -> Result<(), &'static str> {
    if ssid.is_empty() || ssid.len() > 32 {
        return Err("ssid must be 1-32 bytes");
    }
    if !ssid.bytes().all(|b| (0x20..=0x7E).contains(&b)) {
        return Err("ssid must be printable ASCII");
    }
    Ok(())
}

fn fixed<const N: usize>(s: &str) -> heapless::String<N> {
    let mut out = heapless::String::new();
    for c in s.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            hostname: fixed("esp32-audio"),
            country_code: fixed("DE"),

            ap_ssid: fixed("esp32-audio"),
            ap_key: fixed("audio-esp"),
            ap_channel: 6,
            ap_max_clients: 1,

            mdns_service: fixed("_audio-jsonrpc-ws"),
            http_port: 80,

            reconnect_secs: 30,
            lock_wait_ms: 100,
        }
    }
}
