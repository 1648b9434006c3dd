//! Database module for gracewatch.
//!
//! Provides the append-only check log backed by SQLite.

mod models;
mod store;

pub use models::*;
pub use store::*;
