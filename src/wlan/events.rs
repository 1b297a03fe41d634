//! Event codes of the radio controller.
//!
//! [`WlanEvent`] values are the public, stable contract other subsystems
//! (status LED, RPC notifications) subscribe to.  [`Internal`] values drive
//! the controller and are never meant to be consumed elsewhere.

use serde::Serialize;

/// Publicly observable radio changes.  Scalar only, no payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u32)]
pub enum WlanEvent {
    Connected = 1,
    Disconnected = 2,
    ApStarted = 3,
    ApStopped = 4,
    ApClientConnected = 5,
    ApClientDisconnected = 6,
    ScanStarted = 7,
    ScanStopped = 8,
}

impl WlanEvent {
    pub fn from_u32(v: u32) -> Option<Self> {
        Some(match v {
            1 => Self::Connected,
            2 => Self::Disconnected,
            3 => Self::ApStarted,
            4 => Self::ApStopped,
            5 => Self::ApClientConnected,
            6 => Self::ApClientDisconnected,
            7 => Self::ScanStarted,
            8 => Self::ScanStopped,
            _ => return None,
        })
    }
}

/// Control messages and driver notifications handled by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Internal {
    /// Toggle between Station and AccessPoint.
    ModeRequest = 1,
    StationStarted = 2,
    AccessPointStarted = 3,
    /// Associated and addressed.
    GotIp = 4,
    StationDisconnected = 5,
    ApClientAttached = 6,
    ApClientDetached = 7,
    /// Run a scan-and-connect cycle.
    RequestReconnect = 8,
    ReconnectTimer = 9,
}

impl Internal {
    pub fn from_u32(v: u32) -> Option<Self> {
        Some(match v {
            1 => Self::ModeRequest,
            2 => Self::StationStarted,
            3 => Self::AccessPointStarted,
            4 => Self::GotIp,
            5 => Self::StationDisconnected,
            6 => Self::ApClientAttached,
            7 => Self::ApClientDetached,
            8 => Self::RequestReconnect,
            9 => Self::ReconnectTimer,
            _ => return None,
        })
    }
}
