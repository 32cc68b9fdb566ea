//! Build metadata embedded by `build.rs`, reported through `health()`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Output of `git describe --always --dirty`, or `unknown` outside a checkout.
pub const GIT_REVISION: &str = env!("BURROW_GIT_REVISION");

/// Unix seconds; `SOURCE_DATE_EPOCH` when set.
pub const BUILT_AT: &str = env!("BURROW_BUILT_AT");

pub const BUILD_PROFILE: &str = env!("BURROW_BUILD_PROFILE");

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Everything a caller needs to tell two daemon builds apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildInfo {
    pub version: String,
    pub git_revision: String,
    pub profile: String,
    pub built_at: u64,
    /// tree-sitter ABI the Python grammar was loaded against.
    pub grammar_abi: usize,
}

impl BuildInfo {
    pub fn current() -> Self {
        Self {
            version: VERSION.to_string(),
            git_revision: GIT_REVISION.to_string(),
            profile: BUILD_PROFILE.to_string(),
            built_at: BUILT_AT.parse().unwrap_or(0),
            grammar_abi: tree_sitter::LANGUAGE_VERSION,
        }
    }
}

/// `0.1.0 (abc1234def, debug)`
impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {})", self.version, self.git_revision, self.profile)
    }
}
