//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter        | Implements       | Connects to                    |
//! |----------------|------------------|--------------------------------|
//! | `credentials`  | (uses Storage)   | Wi-Fi network list in NVS      |
//! | `http`         | Transport        | ESP-IDF httpd + WebSocket      |
//! | `mdns`         | (none)           | ESP-IDF mDNS responder         |
//! | `nvs`          | StoragePort      | NVS / in-memory store          |
//! | `timer`        | ReconnectTimer   | esp_timer / sleeper thread     |
//! | `wifi`         | RadioDriver      | ESP-IDF Wi-Fi / simulation     |

pub mod credentials;
#[cfg(target_os = "espidf")]
pub mod http;
pub mod mdns;
pub mod nvs;
pub mod timer;
pub mod wifi;
