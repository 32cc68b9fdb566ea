//! Daemon IPC: Unix domain socket transport for the workspace service.
//!
//! The daemon exposes an HTTP/JSON API over a Unix socket, one route per
//! workspace operation. Authentication and rate limiting are expected to
//! sit in front of this transport.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐         Unix socket        ┌──────────────┐
//! │   CLI    │───────────────────────────▶│  IPC Server  │
//! │  agents  │  HTTP/1.1 + JSON           │  (axum)      │
//! └──────────┘                            └──────┬───────┘
//!                                                │
//!                                         ┌──────▼───────┐
//!                                         │   Service    │
//!                                         │   façade     │
//!                                         └──────────────┘
//! ```

pub mod client;
pub mod server;
pub mod types;

pub use client::{IpcClient, IpcClientError};
pub use server::{ApiError, IpcState, socket_path_from_config, status_for};
pub use types::*;
