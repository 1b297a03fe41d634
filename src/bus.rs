//! In-process publish/subscribe message bus.
//!
//! Producers (radio driver callbacks, the transport, peripheral pollers)
//! publish typed messages; each consumer owns a [`Listener`] with its own
//! bounded queue and a subscription mask.
//!
//! ```text
//!  ┌──────────────┐  send_value    ┌────────────────┐   ┌────────────┐
//!  │ Radio driver │──────────────▶│                │──▶│ Listener 0 │ wlan task
//!  │ Transport    │  send_payload  │   MessageBus   │   └────────────┘
//!  │ Button       │──────────────▶│  (fan-out under│   ┌────────────┐
//!  └──────────────┘                │   one lock)    │──▶│ Listener 1 │ rpc task
//!                                  └────────────────┘   └────────────┘
//! ```
//!
//! The bus is a context object: construct it once at startup and share it
//! with `Arc`.  A single `send_*` call delivers to every matching listener
//! atomically with respect to other sends.  Payloads are reference counted,
//! so fanning one payload out to several listeners never releases it more
//! than once; it is dropped together with its last delivered copy.

use core::any::Any;
use core::fmt;
use core::ops::BitOr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, TrySendError};
use log::{debug, error};

use crate::config::{LISTENER_DEPTH, MAX_LISTENERS, MAX_MESSAGE_TYPES};
use crate::error::BusError;

type Queue = Channel<CriticalSectionRawMutex, Message, LISTENER_DEPTH>;

// ---------------------------------------------------------------------------
// Message types and masks
// ---------------------------------------------------------------------------

/// A registered message type: exactly one bit of the mask word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageType(u32);

impl MessageType {
    pub const fn bits(self) -> u32 {
        self.0
    }
}

/// A subscription filter: the union of one or more message types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MessageMask(u32);

impl MessageMask {
    pub const EMPTY: Self = Self(0);

    pub const fn contains(self, kind: MessageType) -> bool {
        self.0 & kind.0 != 0
    }

    pub const fn bits(self) -> u32 {
        self.0
    }
}

impl From<MessageType> for MessageMask {
    fn from(kind: MessageType) -> Self {
        Self(kind.0)
    }
}

impl BitOr for MessageType {
    type Output = MessageMask;

    fn bitor(self, rhs: Self) -> MessageMask {
        MessageMask(self.0 | rhs.0)
    }
}

impl BitOr<MessageType> for MessageMask {
    type Output = MessageMask;

    fn bitor(self, rhs: MessageType) -> MessageMask {
        MessageMask(self.0 | rhs.0)
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// The two payload kinds a message can carry.
#[derive(Clone)]
pub enum Body {
    /// A plain 32-bit discriminant; owns no resources.
    Value(u32),
    /// An owned payload shared by every delivered copy.
    Payload(Arc<dyn Any + Send + Sync>),
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Self::Payload(_) => f.write_str("Payload(..)"),
        }
    }
}

/// One delivered message.
#[derive(Debug, Clone)]
pub struct Message {
    kind: MessageType,
    body: Body,
}

impl Message {
    pub fn kind(&self) -> MessageType {
        self.kind
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    /// The scalar value, if this is a value message.
    pub fn value(&self) -> Option<u32> {
        match self.body {
            Body::Value(v) => Some(v),
            Body::Payload(_) => None,
        }
    }

    /// Borrow the payload as `T`, if this is a payload message of that type.
    pub fn payload<T: Any + Send + Sync>(&self) -> Option<&T> {
        match &self.body {
            Body::Payload(p) => p.downcast_ref::<T>(),
            Body::Value(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Listener
// ---------------------------------------------------------------------------

/// A consumer registration: subscription mask plus its private queue.
///
/// Single consumer: only the owning task should call [`receive`](Self::receive).
pub struct Listener {
    index: usize,
    mask: MessageMask,
    queue: Arc<Queue>,
}

impl Listener {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn mask(&self) -> MessageMask {
        self.mask
    }

    /// Block the calling thread until a message arrives.
    pub fn receive(&self) -> Message {
        futures_lite::future::block_on(self.queue.receive())
    }

    /// Take the next message if one is queued.
    pub fn try_receive(&self) -> Option<Message> {
        self.queue.try_receive().ok()
    }

    /// Messages currently queued.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

// ---------------------------------------------------------------------------
// MessageBus
// ---------------------------------------------------------------------------

/// What a send does when a matching listener queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Reject the whole send with [`BusError::QueueFull`]; nothing is delivered.
    #[default]
    FailFast,
    /// Block the sender until the queue drains.  A listener that publishes
    /// from its own receive loop can deadlock under this policy.
    Block,
}

struct Registration {
    mask: MessageMask,
    queue: Arc<Queue>,
}

struct BusState {
    registered_types: usize,
    listeners: heapless::Vec<Registration, MAX_LISTENERS>,
}

/// The process-wide publish/subscribe bus.
pub struct MessageBus {
    state: Mutex<BusState>,
    policy: OverflowPolicy,
}

impl MessageBus {
    pub fn new() -> Self {
        Self::with_policy(OverflowPolicy::default())
    }

    pub fn with_policy(policy: OverflowPolicy) -> Self {
        Self {
            state: Mutex::new(BusState {
                registered_types: 0,
                listeners: heapless::Vec::new(),
            }),
            policy,
        }
    }

    fn lock(&self) -> MutexGuard<'_, BusState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocate the next unused message type bit.
    pub fn register_type(&self) -> Result<MessageType, BusError> {
        let mut state = self.lock();
        if state.registered_types >= MAX_MESSAGE_TYPES {
            error!("bus: all {} message types in use", MAX_MESSAGE_TYPES);
            return Err(BusError::TypesExhausted);
        }
        let kind = MessageType(1 << state.registered_types);
        state.registered_types += 1;
        debug!("bus: registered type 0x{:08x}", kind.0);
        Ok(kind)
    }

    /// Register a consumer for every message type in `mask`.
    pub fn listen(&self, mask: impl Into<MessageMask>) -> Result<Listener, BusError> {
        let mask = mask.into();
        let mut state = self.lock();
        let queue = Arc::new(Queue::new());
        let index = state.listeners.len();
        if state
            .listeners
            .push(Registration {
                mask,
                queue: Arc::clone(&queue),
            })
            .is_err()
        {
            error!("bus: listener table full ({})", MAX_LISTENERS);
            return Err(BusError::ListenersExhausted);
        }
        debug!("bus: listener {} mask 0x{:08x}", index, mask.0);
        Ok(Listener { index, mask, queue })
    }

    /// Publish a scalar message.  Returns the number of listeners reached.
    pub fn send_value(&self, kind: MessageType, value: u32) -> Result<usize, BusError> {
        self.publish(Message {
            kind,
            body: Body::Value(value),
        })
    }

    /// Publish an owned payload.  Returns the number of listeners reached.
    pub fn send_payload<T: Any + Send + Sync>(
        &self,
        kind: MessageType,
        payload: T,
    ) -> Result<usize, BusError> {
        self.publish(Message {
            kind,
            body: Body::Payload(Arc::new(payload)),
        })
    }

    fn publish(&self, msg: Message) -> Result<usize, BusError> {
        let state = self.lock();
        let targets = || {
            state
                .listeners
                .iter()
                .enumerate()
                .filter(|(_, r)| r.mask.contains(msg.kind))
        };

        if self.policy == OverflowPolicy::FailFast {
            // Only senders enqueue, and they hold the lock, so space seen
            // here is still there below.
            if let Some((listener, _)) = targets().find(|(_, r)| r.queue.is_full()) {
                error!(
                    "bus: queue of listener {} full, dropping type 0x{:08x}",
                    listener, msg.kind.0
                );
                return Err(BusError::QueueFull { listener });
            }
        }

        let mut delivered = 0;
        for (listener, r) in targets() {
            match r.queue.try_send(msg.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(m)) => match self.policy {
                    OverflowPolicy::Block => futures_lite::future::block_on(r.queue.send(m)),
                    OverflowPolicy::FailFast => return Err(BusError::QueueFull { listener }),
                },
            }
            delivered += 1;
        }
        Ok(delivered)
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}
