//! JSON-RPC 2.0 control surface.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                       RPC Stack                           │
//! │                                                           │
//! │  ┌───────────┐ WsFrame ┌───────────┐   ┌───────────────┐  │
//! │  │ Transport │────────▶│  Service  │──▶│    Engine     │  │
//! │  │ (ws recv) │  (bus)  │ (rpc task)│   │  (protocol +  │  │
//! │  └───────────┘         └───────────┘   │  method table)│  │
//! │       ▲                      │         └───────────────┘  │
//! │       └──────send_text───────┘                            │
//! └───────────────────────────────────────────────────────────┘
//! ```

pub mod engine;
pub mod methods;
pub mod protocol;
pub mod service;

pub use engine::{MethodDescriptor, RpcEngine};
pub use service::{RpcService, WsFrame};
