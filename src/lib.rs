//! Audio appliance firmware library.
//!
//! Holds the device control plane: message bus, connection table,
//! JSON-RPC dispatcher and radio-mode controller, plus the adapters that
//! bind them to ESP-IDF.  Everything outside `adapters` is plain Rust and
//! runs on the host; ESP-IDF code is guarded by
//! `#[cfg(target_os = "espidf")]` inside each module.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod bus;
pub mod config;
pub mod connection;
pub mod error;
pub mod rpc;
pub mod sync;
pub mod web;
pub mod wlan;

#[cfg(target_os = "espidf")]
mod esp_link_shims;
