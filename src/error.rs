//! Unified error types for the audio firmware.
//!
//! Each subsystem owns a small `Copy` error enum; the top-level [`Error`]
//! wraps them so the startup sequence and the long-running tasks can
//! report failures uniformly.  Only the binary entry point and the HTTP
//! request handlers use `anyhow`.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The message bus rejected a registration or a send.
    Bus(BusError),
    /// The connection table could not complete an operation.
    Connection(ConnectionError),
    /// Persistent storage failed.
    Storage(StorageError),
    /// The radio driver reported a failure.
    Radio(RadioError),
    /// Peripheral or driver initialisation failed.
    Init(&'static str),
    /// Configuration is invalid.
    Config(&'static str),
}

impl Error {
    /// Whether the process should not continue after this error.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Bus(e) => e.is_fatal(),
            Self::Init(_) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bus(e) => write!(f, "bus: {e}"),
            Self::Connection(e) => write!(f, "connection: {e}"),
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::Radio(e) => write!(f, "radio: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl core::error::Error for Error {}

// ---------------------------------------------------------------------------
// Message bus errors
// ---------------------------------------------------------------------------

/// Failures of the publish/subscribe bus.
///
/// All three are configuration errors: a correctly sized firmware never
/// hits them.  They stay distinct values so the caller can decide whether
/// to restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusError {
    /// Every bit of the message-type mask has been handed out.
    TypesExhausted,
    /// The listener table is full.
    ListenersExhausted,
    /// A matching listener's queue had no room for the message.
    QueueFull { listener: usize },
}

impl BusError {
    pub const fn is_fatal(self) -> bool {
        true
    }
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TypesExhausted => write!(f, "message types exhausted"),
            Self::ListenersExhausted => write!(f, "listener table full"),
            Self::QueueFull { listener } => write!(f, "queue of listener {listener} full"),
        }
    }
}

impl From<BusError> for Error {
    fn from(e: BusError) -> Self {
        Self::Bus(e)
    }
}

// ---------------------------------------------------------------------------
// Connection table errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionError {
    /// All slots are occupied.
    TableFull,
    /// The table lock could not be acquired within the bounded wait.
    LockTimeout,
    /// No live row matches the socket or identifier.
    NotFound,
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TableFull => write!(f, "connection table full"),
            Self::LockTimeout => write!(f, "connection table busy"),
            Self::NotFound => write!(f, "connection not found"),
        }
    }
}

impl From<ConnectionError> for Error {
    fn from(e: ConnectionError) -> Self {
        Self::Connection(e)
    }
}

// ---------------------------------------------------------------------------
// Storage errors
// ---------------------------------------------------------------------------

/// Errors from [`StoragePort`](crate::app::ports::StoragePort) operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Requested key does not exist.
    NotFound,
    /// Storage partition is full.
    Full,
    /// Generic I/O error.
    IoError,
    /// The store lock could not be acquired within the bounded wait.
    Busy,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
            Self::Busy => write!(f, "storage busy"),
        }
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

// ---------------------------------------------------------------------------
// Radio errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioError {
    /// The driver refused to change role.
    RoleChange,
    /// A scan could not be started or its records fetched.
    ScanFailed,
    /// Station configuration or connect call failed.
    ConnectFailed,
    /// SSID or key does not fit the driver limits.
    InvalidCredentials,
}

impl fmt::Display for RadioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RoleChange => write!(f, "role change failed"),
            Self::ScanFailed => write!(f, "scan failed"),
            Self::ConnectFailed => write!(f, "connect failed"),
            Self::InvalidCredentials => write!(f, "invalid credentials"),
        }
    }
}

impl From<RadioError> for Error {
    fn from(e: RadioError) -> Self {
        Self::Radio(e)
    }
}

/// The scan-result gate is held by someone else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanError {
    Busy,
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Busy => write!(f, "scan results busy"),
        }
    }
}
