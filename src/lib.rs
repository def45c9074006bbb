//! # wirekv
//!
//! A minimal binary request/response protocol on a reliable byte stream:
//! - Length-delimited frames with magic validation and request ids
//! - Stateful framer reassembling frames from arbitrarily-chunked reads
//! - Pipelining client correlating out-of-order replies by request id
//! - TCP server dispatching decoded frames to handlers over a shared store
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────┐  encode   ┌─────────────────────────┐
//! │    Client    │──────────▶│        TCP bytes        │
//! │ (correlation │◀──────────│  (arbitrary chunking)   │
//! │    table)    │  decode   └───────────┬─────────────┘
//! └──────────────┘                       │
//!                              ┌─────────▼─────────┐
//!                              │  Per-connection   │
//!                              │      Framer       │
//!                              └─────────┬─────────┘
//!                                        │
//!                              ┌─────────▼─────────┐
//!                              │ Handler dispatch  │
//!                              │ (GET/SET/DELETE/  │
//!                              │      PING)        │
//!                              └─────────┬─────────┘
//!                                        │
//!                              ┌─────────▼─────────┐
//!                              │   Shared Store    │
//!                              │  (RwLock HashMap) │
//!                              └───────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;

pub mod client;
pub mod network;
pub mod protocol;
pub mod store;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use client::{Client, PendingReply};
pub use config::Config;
pub use error::{Result, WireError};
pub use network::{Server, ShutdownHandle};
pub use store::{MemoryStore, Store};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of wirekv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
