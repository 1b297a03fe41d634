//! Port traits: the hexagonal boundary between control logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ RadioController / RpcService
//! ```
//!
//! Driven adapters (radio, HTTP/WebSocket transport, reconnect timer,
//! storage) implement these traits.  The core consumes them via generics,
//! so none of `bus`, `connection`, `rpc` or `wlan` touches ESP-IDF directly.

use core::time::Duration;
use std::sync::Arc;

use crate::config::SCAN_MAX_AP;
use crate::connection::{ConnectionId, Role, Socket};
use crate::error::{RadioError, StorageError};
use crate::wlan::scan::ApRecord;

// ───────────────────────────────────────────────────────────────
// Radio driver port (domain → radio)
// ───────────────────────────────────────────────────────────────

/// Commands to the underlying Wi-Fi driver.
///
/// Completion is reported asynchronously: the adapter posts driver events
/// (station started, got IP, disconnected, AP client attached/detached) to
/// the controller through [`WlanHandle::driver_event`](crate::wlan::WlanHandle::driver_event).
pub trait RadioDriver {
    fn start_station(&mut self) -> Result<(), RadioError>;

    /// Disconnect and stop the station interface.
    fn stop_station(&mut self) -> Result<(), RadioError>;

    fn start_access_point(&mut self) -> Result<(), RadioError>;

    /// Deauthenticate every client and stop the access point.
    fn stop_access_point(&mut self) -> Result<(), RadioError>;

    /// Blocking active scan.
    fn scan(&mut self) -> Result<heapless::Vec<ApRecord, SCAN_MAX_AP>, RadioError>;

    /// Configure station credentials and start association.
    fn connect(&mut self, ssid: &str, key: &str) -> Result<(), RadioError>;
}

// ───────────────────────────────────────────────────────────────
// Transport port (domain → HTTP/WebSocket server)
// ───────────────────────────────────────────────────────────────

/// Lifecycle and output side of the HTTP/WebSocket server.
///
/// Every call is a no-op when it does not apply (stopping a stopped
/// server, sending to an unknown connection).
pub trait Transport: Send + Sync {
    /// Start serving on the interface of `role`.
    fn start(&self, role: Role);

    /// Close every client and stop serving.
    fn stop(&self);

    fn close(&self, socket: Socket);

    fn send_text(&self, connection: ConnectionId, text: &str);
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn start(&self, role: Role) {
        (**self).start(role);
    }

    fn stop(&self) {
        (**self).stop();
    }

    fn close(&self, socket: Socket) {
        (**self).close(socket);
    }

    fn send_text(&self, connection: ConnectionId, text: &str) {
        (**self).send_text(connection, text);
    }
}

// ───────────────────────────────────────────────────────────────
// Reconnect timer port
// ───────────────────────────────────────────────────────────────

/// Single-shot timer whose expiry is delivered to the radio controller.
pub trait ReconnectTimer {
    /// Arm (or re-arm) the timer.  A previously armed expiry is discarded.
    fn arm(&mut self, after: Duration);

    /// Cancel a pending expiry.  No-op if not armed.
    fn disarm(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Storage port (domain ↔ NVS / flash)
// ───────────────────────────────────────────────────────────────

/// Persistent key-value storage for credentials and configuration.
///
/// Keys are namespaced per subsystem.  Writes are atomic: the NVS API
/// guarantees it on the device, the in-memory store trivially.
pub trait StoragePort {
    /// Read a value.  Returns the number of bytes written to `buf`.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Delete a key.  Returns `Ok(())` even if the key didn't exist.
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;

    fn exists(&self, namespace: &str, key: &str) -> bool;
}
