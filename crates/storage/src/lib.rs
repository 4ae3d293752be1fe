//! Alert Storage Layer
//!
//! SQLite persistence for issued alerts and their delivery outcomes, plus
//! the window queries the dashboard surface is built on.

mod store;

pub use store::{AlertRow, AlertStore, ChannelKind, NewAlert};

use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Corrupt row: {0}")]
    InvalidRow(String),
    #[error("Alert {0} not found")]
    NotFound(i64),
}
