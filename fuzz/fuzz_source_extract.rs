//! Fuzz target for symbol and import extraction.
//!
//! Run with: cargo +nightly fuzz run fuzz_source_extract
//!
//! Extraction must never panic on malformed source, whatever the language.

#![no_main]

use burrow_core::Language;
use burrow_core::context::{extract_deps, extract_symbols};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some((&selector, rest)) = data.split_first() else {
        return;
    };
    let Ok(source) = std::str::from_utf8(rest) else {
        return;
    };
    let language = match selector % 3 {
        0 => Language::Python,
        1 => Language::JavaScript,
        _ => Language::TypeScript,
    };

    for symbol in extract_symbols("fuzz", source, &language) {
        assert!(symbol.line >= 1);
    }
    let _ = extract_deps(source, &language);
});
