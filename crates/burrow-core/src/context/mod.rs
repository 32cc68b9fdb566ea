//! Code intelligence: symbol and dependency extraction plus the index store.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────┐
//! │                  Index Store                   │
//! │   ArcSwap<IndexSnapshot> · generation counter  │
//! │                                                │
//! │  ┌──────────────────┐   ┌───────────────────┐  │
//! │  │ Symbol Extractor │   │ Dependency        │  │
//! │  │                  │   │ Extractor         │  │
//! │  │ ·Python (parsed) │   │ ·Python imports   │  │
//! │  │ ·JS/TS (pattern) │   │ ·JS/TS from/req   │  │
//! │  └──────────────────┘   └───────────────────┘  │
//! └────────────────────────────────────────────────┘
//!                       ▲
//!                File Enumerator
//! ```

pub mod deps;
pub mod indexer;
pub mod store;

pub use deps::{DependencyEdge, DependencyGraph, extract_deps};
pub use indexer::{Symbol, SymbolKind, SymbolQuery, SymbolTable, extract_symbols};
pub use store::{IndexScope, IndexSnapshot, IndexStore, workspace_scope};
