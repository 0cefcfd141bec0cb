//! Loot table loader: scans a directory of `<name>.json` files.

use std::path::Path;

use tracing::{info, warn};

use crate::error::TableError;
use crate::loot_table::LootTable;

/// Parse and validate a single table document.
pub fn parse_table(json: &str) -> Result<LootTable, TableError> {
    let table: LootTable =
        serde_json::from_str(json).map_err(|e| TableError::Parse(e.to_string()))?;
    table.validate()?;
    Ok(table)
}

/// Load every valid table in `dir`.
///
/// Unreadable or invalid files are logged and skipped so that one broken
/// table never keeps the others from loading. A missing directory yields no
/// tables.
pub fn load_tables(dir: &Path) -> Vec<LootTable> {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(_) => return Vec::new(),
    };

    let mut tables = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let contents = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => {
                warn!("Failed to read {}: {e}", path.display());
                continue;
            }
        };
        match parse_table(&contents) {
            Ok(table) => tables.push(table),
            Err(e) => warn!("Excluding loot table {}: {e}", path.display()),
        }
    }

    // Directory order is platform dependent.
    tables.sort_by_key(|t| t.key());

    if !tables.is_empty() {
        info!("Loaded {} loot table(s) from {}", tables.len(), dir.display());
    }
    tables
}
