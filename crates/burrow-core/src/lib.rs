#![deny(unsafe_code)]

//! burrow core: sandboxed workspace indexing and search.
//!
//! Exposes a code repository's filesystem to automated callers for reading,
//! writing, symbol discovery, dependency mapping and text search, without
//! ever letting a caller leave the workspace root or bypass the write
//! policy. All access goes through the [`Service`] façade; the daemon serves
//! it over a Unix socket.
//!
//! ## Architecture
//!
//! ```text
//!                 ┌───────────────────────────┐
//!   IPC / CLI ───▶│       Service façade      │
//!                 └─────┬──────────┬──────────┘
//!                       │          │
//!          ┌────────────▼──┐   ┌───▼──────────────────┐
//!          │ Path Sandbox  │   │ WorkerPool (bounded) │
//!          │ Write Policy  │   └───┬──────────┬───────┘
//!          └───────────────┘       │          │
//!                        ┌─────────▼───┐ ┌────▼─────────────┐
//!                        │ Enumerator  │ │ Index Store      │
//!                        │ Search      │ │ symbols · deps   │
//!                        └─────────────┘ └──────────────────┘
//! ```

/// Build metadata (version, git revision, profile).
pub mod build_info;
/// Symbol and dependency extraction plus the index store.
pub mod context;
/// Daemon runtime: service plus IPC server until shutdown.
pub mod daemon;
/// Error taxonomy shared by every component.
pub mod error;
/// File reads, writes and deletes on sandboxed paths.
pub mod files;
/// Unix-socket HTTP transport and its wire types.
pub mod ipc;
/// Extension-based language classification.
pub mod lang;
/// Bounded blocking worker pool and time budgets.
pub mod pool;
/// Workspace path containment.
pub mod sandbox;
/// Literal and regex content search.
pub mod search;
/// The operation façade.
pub mod service;
/// Bounded, exclusion-aware file enumeration.
pub mod walker;

pub use daemon::Daemon;
pub use error::{ErrorKind, ServiceError, WorkspaceError};
pub use lang::Language;
pub use sandbox::{ResolvedPath, Sandbox};
pub use service::{Service, StartupError};
