//! Fuzz target: `web::resolve`
//!
//! Any accepted request path must stay under the web root.
//!
//! cargo fuzz run fuzz_web_path

#![no_main]

use audio_firmware::web::{DEFAULT_FILE, MAX_PATH_LEN, resolve};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(uri) = core::str::from_utf8(data) else {
        return;
    };
    if let Ok(path) = resolve(uri) {
        assert!(path.starts_with('/'));
        assert!(path.len() <= MAX_PATH_LEN.max(DEFAULT_FILE.len()));
        assert!(!path.split('/').any(|seg| seg == ".."));
    }
});
