//! Loot table definitions and the roll engine.
//!
//! A [`LootTable`] is loaded from JSON, validated once, and then rolled with
//! [`roll`] as many times as needed. Rolling never fails: a table that can't
//! produce anything yields an empty bundle.

pub mod error;
pub mod loader;
pub mod loot_table;
pub mod roll;

pub use error::TableError;
pub use loader::{load_tables, parse_table};
pub use loot_table::{
    table_key, Amount, ChanceEntry, ItemDrop, LootEntry, LootGroup, LootTable, ResetDelay,
    Rolls, WeightedEntry, MAX_ROLLS,
};
pub use roll::roll;
