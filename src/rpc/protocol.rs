//! JSON-RPC 2.0 wire format: request validation and response encoding.
//!
//! Responses are emitted in compact form with a fixed field order
//! (`jsonrpc`, then `result` or `error`, then `id`) so the same request
//! always produces byte-identical output.

use serde::Serialize;
use serde_json::{Number, Value};

pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

/// Longest request frame the engine will look at.
pub const MAX_REQUEST_LEN: usize = 8 * 1024;

const VERSION: &str = "2.0";

/// Message text of the protocol-reserved codes.
pub fn reserved_message(code: i32) -> Option<&'static str> {
    match code {
        PARSE_ERROR => Some("parse error"),
        INVALID_REQUEST => Some("invalid request"),
        METHOD_NOT_FOUND => Some("method not found"),
        INVALID_PARAMS => Some("invalid params"),
        INTERNAL_ERROR => Some("internal error"),
        _ => None,
    }
}

/// A structurally valid request borrowed from its parsed document.
#[derive(Debug, PartialEq)]
pub struct Request<'a> {
    pub method: &'a str,
    pub params: Option<&'a Value>,
    pub id: &'a Number,
}

/// Why a document is not a valid request.
#[derive(Debug, PartialEq)]
pub struct Rejection<'a> {
    pub code: i32,
    /// The request id, when one could be recovered.
    pub id: Option<&'a Number>,
}

/// Parse the raw frame.  `None` means the bytes are not JSON at all.
pub fn parse(input: &[u8]) -> Option<Value> {
    serde_json::from_slice(input).ok()
}

/// Check the request shape of a parsed document.
pub fn validate(doc: &Value) -> Result<Request<'_>, Rejection<'_>> {
    let Some(obj) = doc.as_object() else {
        return Err(Rejection {
            code: INVALID_REQUEST,
            id: None,
        });
    };
    let id = match obj.get("id") {
        Some(Value::Number(n)) => Some(n),
        _ => None,
    };
    let invalid = Rejection {
        code: INVALID_REQUEST,
        id,
    };

    if obj.get("jsonrpc").and_then(Value::as_str) != Some(VERSION) {
        return Err(invalid);
    }
    let Some(method) = obj.get("method").and_then(Value::as_str) else {
        return Err(invalid);
    };
    let params = match obj.get("params") {
        None => None,
        Some(p @ (Value::Array(_) | Value::Object(_))) => Some(p),
        Some(_) => return Err(invalid),
    };
    let Some(id) = id else {
        return Err(invalid);
    };
    Ok(Request { method, params, id })
}

#[derive(Serialize)]
struct Success<'a> {
    jsonrpc: &'static str,
    result: &'a Value,
    id: &'a Number,
}

#[derive(Serialize)]
struct ErrorObject<'a> {
    code: i32,
    message: &'a str,
}

#[derive(Serialize)]
struct Failure<'a> {
    jsonrpc: &'static str,
    error: ErrorObject<'a>,
    id: Option<&'a Number>,
}

const FALLBACK: &str =
    r#"{"jsonrpc":"2.0","error":{"code":-32603,"message":"internal error"},"id":null}"#;

pub fn success(result: &Value, id: &Number) -> String {
    serde_json::to_string(&Success {
        jsonrpc: VERSION,
        result,
        id,
    })
    .unwrap_or_else(|_| FALLBACK.into())
}

pub fn failure(code: i32, message: &str, id: Option<&Number>) -> String {
    serde_json::to_string(&Failure {
        jsonrpc: VERSION,
        error: ErrorObject { code, message },
        id,
    })
    .unwrap_or_else(|_| FALLBACK.into())
}
