//! Loot table configuration errors.

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum TableError {
    #[error("loot table name is empty")]
    EmptyName,

    #[error("invalid loot table name '{name}'")]
    InvalidName { name: String },

    #[error("table '{table}': entry {index} has probability {value}, expected 0.0..=1.0")]
    InvalidProbability {
        table: String,
        index: usize,
        value: f64,
    },

    #[error("table '{table}': item '{item}' has amount range {min}..={max}")]
    InvalidAmount {
        table: String,
        item: String,
        min: u32,
        max: u32,
    },

    #[error("table '{table}': roll range {min}..={max}, expected at most {limit}", limit = crate::MAX_ROLLS)]
    InvalidRolls { table: String, min: u32, max: u32 },

    #[error("table '{table}': break_and_respawn requires a global table")]
    ConflictingFlags { table: String },

    #[error("invalid loot table JSON: {0}")]
    Parse(String),
}
