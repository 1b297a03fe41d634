//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against the recording mocks in `mock_hw`.  All tests run on the host.

#![cfg(not(target_os = "espidf"))]

mod connection_tests;
mod mock_hw;
mod radio_flow_tests;
mod rpc_tests;
