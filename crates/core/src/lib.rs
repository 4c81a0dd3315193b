//! `team-chat-core`: a file-backed, multi-writer team messaging control plane.
//!
//! Persistence is the filesystem alone — no database, no network server, no
//! daemon — yet many processes may read and write the same team concurrently.
//! Durability comes from append-only JSONL logs (inboxes, events, dead
//! letter); derived indexes and task snapshots are rebuildable at any time
//! via [`service::rehydrate`].

pub mod config;
pub mod derive;
pub mod diagnostics;
pub mod error;
pub mod identifier;
pub mod io;
pub mod logging;
pub mod paths;
pub mod schema;
pub mod service;
pub mod store;
pub mod time;

pub use error::{EngineError, Result};
pub use paths::{data_root_from_env, TeamPaths, DATA_ROOT_ENV};
pub use service::MessagingService;
pub use store::TeamStore;
