//! RPC task: WebSocket text frames in, JSON-RPC responses out.
//!
//! The transport publishes every received text frame as a [`WsFrame`]
//! payload.  This service owns the only listener on that type, runs each
//! frame through the [`RpcEngine`] and sends the response back to the
//! originating connection.

use log::{debug, warn};

use crate::app::ports::Transport;
use crate::bus::{Listener, Message, MessageBus, MessageType};
use crate::connection::ConnectionId;
use crate::error::BusError;

use super::engine::RpcEngine;

/// One received WebSocket text frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WsFrame {
    pub connection: ConnectionId,
    pub text: String,
}

pub struct RpcService<T> {
    engine: RpcEngine,
    transport: T,
    listener: Listener,
}

impl<T: Transport> RpcService<T> {
    pub fn new(
        bus: &MessageBus,
        frame_type: MessageType,
        engine: RpcEngine,
        transport: T,
    ) -> Result<Self, BusError> {
        Ok(Self {
            engine,
            transport,
            listener: bus.listen(frame_type)?,
        })
    }

    /// Answer one frame.  Returns `false` for messages that carry no frame.
    pub fn handle_message(&self, msg: &Message) -> bool {
        let Some(frame) = msg.payload::<WsFrame>() else {
            warn!("rpc: unexpected message {:?}", msg.body());
            return false;
        };
        debug!("rpc: {} bytes from {}", frame.text.len(), frame.connection);
        let response = self.engine.handle(frame.text.as_bytes());
        self.transport.send_text(frame.connection, &response);
        true
    }

    /// Answer every frame already queued.
    pub fn poll(&self) -> usize {
        std::iter::from_fn(|| self.listener.try_receive())
            .filter(|msg| self.handle_message(msg))
            .count()
    }

    pub fn run(self) -> ! {
        loop {
            let msg = self.listener.receive();
            self.handle_message(&msg);
        }
    }
}
