//! Fuzz target for write policy authorization.
//!
//! Run with: cargo +nightly fuzz run fuzz_write_policy
//!
//! Splits the input into a prefix rule and a candidate path. A prefix that
//! is both allowed and denied must never authorize anything.

#![no_main]

use std::path::Path;

use burrow_config::{WriteOperation, WritePolicy};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };
    let Some((prefix, path)) = s.split_once('\n') else {
        return;
    };

    let open = WritePolicy::new([prefix], Vec::<String>::new(), false);
    let _ = open.authorize(Path::new(path), WriteOperation::Write);

    let conflicted = WritePolicy::new([prefix], [prefix], false);
    assert!(
        !conflicted
            .authorize(Path::new(path), WriteOperation::Delete)
            .is_allowed(),
        "deny prefix {prefix:?} did not win for {path:?}"
    );
});
