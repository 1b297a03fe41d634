//! Fuzz target: `RpcEngine::handle`
//!
//! Feeds arbitrary bytes to the JSON-RPC engine and asserts that every
//! input produces one well-formed response object.
//!
//! cargo fuzz run fuzz_rpc_request

#![no_main]

use audio_firmware::rpc::{MethodDescriptor, RpcEngine};
use libfuzzer_sys::fuzz_target;
use serde_json::Value;

// Links the std critical-section implementation the bus mutexes need.
use critical_section as _;

fuzz_target!(|data: &[u8]| {
    let mut engine = RpcEngine::new();
    engine.register(MethodDescriptor::without_params("ping", || Ok(true)));
    engine.register(MethodDescriptor::with_params("echo", |v: Vec<u32>| Ok(v)));

    let out = engine.handle(data);
    let doc: Value = serde_json::from_str(&out).expect("response is JSON");
    assert_eq!(doc["jsonrpc"], "2.0");
    assert!(doc.get("id").is_some());
    assert!(doc.get("result").is_some() ^ doc.get("error").is_some());
});
