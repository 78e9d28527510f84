//! # tracker-core — centralized peer-to-peer file index and session tracker
//!
//! A library implementing the three tightly coupled subsystems of a
//! centralized file-sharing tracker, plus the per-peer transfer protocol
//! each participant runs to serve files on request.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │  rpc              — tracker RPC surface + line protocol│
//! ├─────────────────────────────────────────────────────┤
//! │  session_manager  — login/resume/disconnect/heartbeat │
//! │  file_index       — register/search/host-lookup       │
//! ├─────────────────────────────────────────────────────┤
//! │  peers            — in-memory active peer table        │
//! │  persistence      — relational store gateway            │
//! │  reaper           — stale-session eviction task          │
//! ├─────────────────────────────────────────────────────┤
//! │  transfer         — peer listener/sender/downloader      │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Crate layout
//!
//! - [`config`] — typed, serde-derived startup configuration.
//! - [`error`] — [`TrackerError`] enum and [`Result`] alias shared crate-wide.
//! - [`auth`] — Argon2 password verifier hashing.
//! - [`token`] — session token generation.
//! - [`peers`] — [`peers::ActivePeerTable`], the bounded in-memory session registry.
//! - [`persistence`] — [`persistence::PersistenceGateway`] over the relational store.
//! - [`session_manager`] — [`session_manager::SessionManager`]: login, resume, disconnect, heartbeat.
//! - [`file_index`] — [`file_index::FileIndex`]: register, deregister, list, search, host-lookup.
//! - [`reaper`] — background stale-session eviction.
//! - [`transfer`] — the peer-to-peer file transfer wire protocol.
//! - [`rpc`] — [`rpc::Tracker`], the RPC service surface and its demonstration transport.

pub mod auth;
pub mod config;
pub mod error;
pub mod file_index;
pub mod peers;
pub mod persistence;
pub mod reaper;
pub mod rpc;
pub mod session_manager;
pub mod token;
pub mod transfer;

pub use config::Config;
pub use error::{Result, TrackerError};
pub use file_index::FileIndex;
pub use peers::ActivePeerTable;
pub use persistence::PersistenceGateway;
pub use rpc::Tracker;
pub use session_manager::SessionManager;
