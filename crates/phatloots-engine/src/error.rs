//! Storage errors.

use phatloots_loot::TableError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("refusing to store loot table: {0}")]
    InvalidTable(#[from] TableError),

    #[error("storage backend error: {0}")]
    Backend(String),
}
