//! Fuzz target for the TOML configuration parsers.
//!
//! Run with: cargo +nightly fuzz run fuzz_config_parser
//!
//! Feeds arbitrary text to both the daemon config and the workspace policy
//! file parsers, including validation.

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = burrow_config::AppConfig::parse(s);
        if let Ok(policy) = burrow_config::WritePolicyConfig::parse(s) {
            let _ = policy.build_policy();
        }
    }
});
