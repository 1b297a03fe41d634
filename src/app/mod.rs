//! Application boundary.
//!
//! The control plane (`bus`, `connection`, `rpc`, `wlan`) talks to radio,
//! transport, timers and flash only through the **port traits** in
//! [`ports`], which keeps it fully testable on the host.

pub mod ports;
