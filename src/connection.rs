//! Connection table: transport sockets to stable logical identities.
//!
//! The transport reports every accepted and closed socket here.  Each live
//! socket gets a [`ConnectionId`] that stays valid for the client's session
//! and is announced on the bus as a [`ConnectionEvent`].
//!
//! All operations take the table lock with a bounded wait.  When the lock
//! cannot be had in time the operation fails (or, for `count`, reports zero)
//! instead of parking the caller.

use core::time::Duration;
use std::sync::Arc;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::{Mutex, MutexGuard};
use log::{debug, error, info, warn};

use crate::bus::{MessageBus, MessageType};
use crate::config::MAX_CONNECTIONS;
use crate::error::{BusError, ConnectionError, Error};
use crate::sync::lock_within;

/// Transport-level socket descriptor.
pub type Socket = i32;

/// Logical connection identity.  Never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u32);

impl ConnectionId {
    /// Wrap a raw identifier; `0` means "no connection".
    pub const fn new(raw: u32) -> Option<Self> {
        if raw == 0 { None } else { Some(Self(raw)) }
    }

    pub const fn get(self) -> u32 {
        self.0
    }
}

impl core::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Which radio role accepted the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    AccessPointClient,
    StationClient,
}

/// Value published on the table's message type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ConnectionEvent {
    Connected = 1,
    Disconnected = 2,
}

impl ConnectionEvent {
    pub fn from_u32(v: u32) -> Option<Self> {
        match v {
            1 => Some(Self::Connected),
            2 => Some(Self::Disconnected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Row {
    id: ConnectionId,
    role: Role,
    socket: Socket,
}

struct Rows {
    slots: [Option<Row>; MAX_CONNECTIONS],
    next_id: u32,
}

impl Rows {
    fn live(&self) -> impl Iterator<Item = &Row> {
        self.slots.iter().flatten()
    }

    /// Next identifier, skipping zero and any id still held after a wrap.
    fn alloc_id(&mut self) -> ConnectionId {
        loop {
            let raw = self.next_id;
            self.next_id = self.next_id.wrapping_add(1);
            if let Some(id) = ConnectionId::new(raw) {
                if !self.live().any(|r| r.id == id) {
                    return id;
                }
            }
        }
    }
}

type Guard<'a> = MutexGuard<'a, CriticalSectionRawMutex, Rows>;

pub struct ConnectionTable {
    rows: Mutex<CriticalSectionRawMutex, Rows>,
    bus: Arc<MessageBus>,
    event_type: MessageType,
    lock_wait: Duration,
}

impl ConnectionTable {
    /// Create an empty table and register its event type on `bus`.
    pub fn new(bus: Arc<MessageBus>, lock_wait: Duration) -> Result<Self, BusError> {
        let event_type = bus.register_type()?;
        Ok(Self {
            rows: Mutex::new(Rows {
                slots: [None; MAX_CONNECTIONS],
                next_id: 1,
            }),
            bus,
            event_type,
            lock_wait,
        })
    }

    /// Message type carrying [`ConnectionEvent`] values.
    pub fn event_type(&self) -> MessageType {
        self.event_type
    }

    /// The row change is already committed; a bus failure is only logged.
    fn announce(&self, id: ConnectionId, event: ConnectionEvent) {
        if let Err(e) = self.bus.send_value(self.event_type, event as u32) {
            error!("con: announcing {:?} for {} failed: {}", event, id, e);
        }
    }

    fn lock(&self) -> Result<Guard<'_>, ConnectionError> {
        lock_within(&self.rows, self.lock_wait).ok_or(ConnectionError::LockTimeout)
    }

    /// Record a new socket and announce it.
    ///
    /// A socket that already has a live row keeps its identity and nothing
    /// is published.
    pub fn create(&self, role: Role, socket: Socket) -> Result<ConnectionId, Error> {
        let id = {
            let mut rows = self.lock().inspect_err(|_| {
                warn!("con: create({}) lock timeout", socket);
            })?;
            if let Some(existing) = rows.live().find(|r| r.socket == socket) {
                debug!("con: socket {} already {}", socket, existing.id);
                return Ok(existing.id);
            }
            let Some(free) = rows.slots.iter().position(Option::is_none) else {
                warn!("con: table full, rejecting socket {}", socket);
                return Err(ConnectionError::TableFull.into());
            };
            let id = rows.alloc_id();
            rows.slots[free] = Some(Row { id, role, socket });
            id
        };
        info!("con: {} opened on socket {} ({:?})", id, socket, role);
        self.announce(id, ConnectionEvent::Connected);
        Ok(id)
    }

    /// Forget a closed socket and announce it.
    pub fn delete(&self, socket: Socket) -> Result<ConnectionId, Error> {
        let id = {
            let mut rows = self.lock().inspect_err(|_| {
                warn!("con: delete({}) lock timeout", socket);
            })?;
            let slot = rows
                .slots
                .iter_mut()
                .find(|s| s.is_some_and(|r| r.socket == socket));
            match slot.and_then(Option::take) {
                Some(row) => row.id,
                None => {
                    warn!("con: delete of unknown socket {}", socket);
                    return Err(ConnectionError::NotFound.into());
                }
            }
        };
        info!("con: {} closed (socket {})", id, socket);
        self.announce(id, ConnectionEvent::Disconnected);
        Ok(id)
    }

    /// Number of live rows; zero if the lock could not be taken.
    pub fn count(&self) -> usize {
        match self.lock() {
            Ok(rows) => rows.live().count(),
            Err(_) => {
                warn!("con: count lock timeout");
                0
            }
        }
    }

    pub fn lookup_by_socket(&self, socket: Socket) -> Option<ConnectionId> {
        let rows = self.lock().ok()?;
        rows.live().find(|r| r.socket == socket).map(|r| r.id)
    }

    pub fn lookup_socket(&self, id: ConnectionId) -> Option<Socket> {
        let rows = self.lock().ok()?;
        rows.live().find(|r| r.id == id).map(|r| r.socket)
    }

    pub fn role_of(&self, id: ConnectionId) -> Option<Role> {
        let rows = self.lock().ok()?;
        rows.live().find(|r| r.id == id).map(|r| r.role)
    }

    /// Sockets of every live row accepted under `role`.
    pub fn sockets(&self, role: Role) -> heapless::Vec<Socket, MAX_CONNECTIONS> {
        let mut out = heapless::Vec::new();
        if let Ok(rows) = self.lock() {
            for r in rows.live().filter(|r| r.role == role) {
                // Capacity equals the slot count.
                let _ = out.push(r.socket);
            }
        }
        out
    }
}
