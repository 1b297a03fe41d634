//! RPC engine: routes validated JSON-RPC requests to registered methods.
//!
//! The engine is transport-decoupled and stateless across requests.  Callers
//! feed one text frame to [`RpcEngine::handle`] and get back the serialized
//! response, which is always a well-formed JSON-RPC object even for garbage
//! input.
//!
//! Each request passes through:
//!
//! 1. **Parse** the bytes as JSON (`-32700` on failure, `id: null`).
//! 2. **Validate** the request shape (`-32600`).
//! 3. **Route** by method name (`-32601`).
//! 4. **Check params** presence and shape against the descriptor (`-32602`).
//! 5. **Invoke** the handler; an application error code becomes an error
//!    response with the registered message.

use log::{debug, warn};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::protocol::{
    self, INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST, MAX_REQUEST_LEN, METHOD_NOT_FOUND,
    PARSE_ERROR, reserved_message,
};

type Handler = Box<dyn Fn(Option<&Value>) -> Result<Value, i32> + Send + Sync>;

/// One entry of the method table.
pub struct MethodDescriptor {
    name: &'static str,
    expects_params: bool,
    handler: Handler,
}

impl MethodDescriptor {
    /// A method that must be called without `params`.
    pub fn without_params<R, F>(name: &'static str, f: F) -> Self
    where
        R: Serialize,
        F: Fn() -> Result<R, i32> + Send + Sync + 'static,
    {
        Self {
            name,
            expects_params: false,
            handler: Box::new(move |_| encode(f()?)),
        }
    }

    /// A method whose `params` must deserialize into `P`.
    pub fn with_params<P, R, F>(name: &'static str, f: F) -> Self
    where
        P: DeserializeOwned,
        R: Serialize,
        F: Fn(P) -> Result<R, i32> + Send + Sync + 'static,
    {
        Self {
            name,
            expects_params: true,
            handler: Box::new(move |params| {
                let raw = params.cloned().ok_or(INVALID_PARAMS)?;
                let parsed = serde_json::from_value::<P>(raw).map_err(|_| INVALID_PARAMS)?;
                encode(f(parsed)?)
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn expects_params(&self) -> bool {
        self.expects_params
    }
}

fn encode<R: Serialize>(result: R) -> Result<Value, i32> {
    serde_json::to_value(result).map_err(|_| INTERNAL_ERROR)
}

/// Method table plus application error registry.
#[derive(Default)]
pub struct RpcEngine {
    methods: Vec<MethodDescriptor>,
    errors: Vec<(i32, &'static str)>,
}

impl RpcEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a method.  A later registration under the same name replaces the
    /// earlier one.
    pub fn register(&mut self, method: MethodDescriptor) -> &mut Self {
        if let Some(slot) = self.methods.iter_mut().find(|m| m.name == method.name) {
            warn!("rpc: method {} registered twice", method.name);
            *slot = method;
        } else {
            self.methods.push(method);
        }
        self
    }

    /// Attach a message to an application error code.
    pub fn register_error(&mut self, code: i32, message: &'static str) -> &mut Self {
        match self.errors.iter_mut().find(|(c, _)| *c == code) {
            Some(entry) => entry.1 = message,
            None => self.errors.push((code, message)),
        }
        self
    }

    pub fn method_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.methods.iter().map(|m| m.name)
    }

    /// Human-readable text for `code`.  Unregistered codes have an empty
    /// message.
    pub fn error_message(&self, code: i32) -> &'static str {
        reserved_message(code)
            .or_else(|| {
                self.errors
                    .iter()
                    .find(|(c, _)| *c == code)
                    .map(|(_, m)| *m)
            })
            .unwrap_or("")
    }

    /// Process one request frame and return the response text.
    pub fn handle(&self, input: &[u8]) -> String {
        if input.len() > MAX_REQUEST_LEN {
            debug!("rpc: oversized request ({} bytes)", input.len());
            return protocol::failure(INVALID_REQUEST, self.error_message(INVALID_REQUEST), None);
        }
        let Some(doc) = protocol::parse(input) else {
            debug!("rpc: parse error ({} bytes)", input.len());
            return protocol::failure(PARSE_ERROR, self.error_message(PARSE_ERROR), None);
        };
        let req = match protocol::validate(&doc) {
            Ok(req) => req,
            Err(rej) => {
                debug!("rpc: invalid request");
                return protocol::failure(rej.code, self.error_message(rej.code), rej.id);
            }
        };

        let Some(method) = self.methods.iter().find(|m| m.name == req.method) else {
            debug!("rpc: unknown method {}", req.method);
            return protocol::failure(
                METHOD_NOT_FOUND,
                self.error_message(METHOD_NOT_FOUND),
                Some(req.id),
            );
        };
        if method.expects_params != req.params.is_some() {
            return protocol::failure(
                INVALID_PARAMS,
                self.error_message(INVALID_PARAMS),
                Some(req.id),
            );
        }

        match (method.handler)(req.params) {
            Ok(result) => protocol::success(&result, req.id),
            Err(code) => {
                debug!("rpc: {} failed with {}", req.method, code);
                protocol::failure(code, self.error_message(code), Some(req.id))
            }
        }
    }
}
