//! Core types for the worksync calendar sync engine.
//!
//! This crate provides the provider-neutral types shared by the sync engine
//! and its callers:
//! - `SchedulableItem` and related types for local tasks/assignments
//! - `CalendarConnection` and the `ConnectionStore` persistence seam
//! - `SyncStats` for reconciliation outcomes
//! - `SyncError` for the engine's error taxonomy

pub mod connection;
pub mod error;
pub mod item;
pub mod stats;

pub use connection::{CalendarConnection, ConnectionStore};
pub use error::{SyncError, SyncResult};
pub use item::{ItemKind, Priority, SchedulableItem};
pub use stats::SyncStats;
