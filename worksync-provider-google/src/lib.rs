//! Google Calendar provider for worksync.
//!
//! Pushes a user's schedulable items into their Google Calendar and keeps
//! the remote copy reconciled: create missing events, update stale ones,
//! skip current ones, and delete events whose local item is gone. Events
//! written by this crate are tagged with a private `appSource` marker so
//! the engine never touches events created by other means.

pub mod api;
pub mod config;
pub mod convert;
pub mod reader;
pub mod retry;
pub mod store;
pub mod sync;
pub mod token;
pub mod types;
pub mod writer;

pub use api::GoogleApi;
pub use config::Config;
pub use store::FileConnectionStore;
pub use sync::SyncEngine;

/// Private marker identifying events created by this system.
pub const APP_SOURCE: &str = "worksync";
