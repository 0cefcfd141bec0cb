//! JSON file storage for loot tables, container links and container state.
//!
//! Layout under the configured directory:
//! - `loot_tables/<name>.json`: one file per table
//! - `links/<location>.json`: linked table names of one container
//! - `chests/<location>.json`: roll history and respawn time of one container
//!
//! `<location>` is the world name with unsafe bytes percent-encoded, then
//! `@x,y,z`, so a single interaction rewrites a single file.

use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use phatloots_api::BlockLocation;
use phatloots_engine::{ChestEntry, ChestState, LinkEntry, LootStorage, Snapshot, StorageError};
use phatloots_loot::{load_tables, table_key, LootTable};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

const TABLES_DIR: &str = "loot_tables";
const LINKS_DIR: &str = "links";
const CHESTS_DIR: &str = "chests";

pub struct JsonStorage {
    root: PathBuf,
}

impl JsonStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn tables_dir(&self) -> PathBuf {
        self.root.join(TABLES_DIR)
    }

    fn table_path(&self, table: &LootTable) -> PathBuf {
        self.tables_dir().join(format!("{}.json", table.name()))
    }

    /// Stems of every `.json` file in the tables directory.
    fn table_stems(&self) -> Result<Vec<(String, PathBuf)>, StorageError> {
        let entries = match fs::read_dir(self.tables_dir()) {
            Ok(e) => e,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut stems = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                stems.push((stem.to_string(), path.clone()));
            }
        }
        stems.sort();
        Ok(stems)
    }
}

impl LootStorage for JsonStorage {
    fn load(&self) -> Result<Snapshot, StorageError> {
        let mut links: Vec<LinkEntry> = load_rows(&self.root.join(LINKS_DIR));
        links.sort_by(|a, b| a.location.cmp(&b.location));
        let mut chests: Vec<ChestEntry> = load_rows(&self.root.join(CHESTS_DIR));
        chests.sort_by(|a, b| a.location.cmp(&b.location));
        Ok(Snapshot {
            tables: load_tables(&self.tables_dir()),
            links,
            chests,
        })
    }

    fn stored_tables(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.table_stems()?.into_iter().map(|(stem, _)| stem).collect())
    }

    /// Invalid tables are refused, so a name can never leave the directory.
    fn save_table(&self, table: &LootTable) -> Result<(), StorageError> {
        table.validate()?;
        fs::create_dir_all(self.tables_dir())?;
        let json = serde_json::to_string_pretty(table)?;
        fs::write(self.table_path(table), json)?;
        Ok(())
    }

    /// Removes every file whose name matches the table key, ignoring case.
    fn delete_table(&self, name: &str) -> Result<(), StorageError> {
        let key = table_key(name);
        for (stem, path) in self.table_stems()? {
            if table_key(&stem) == key {
                fs::remove_file(&path)?;
                debug!("Deleted {}", path.display());
            }
        }
        Ok(())
    }

    fn save_links(&self, links: &[LinkEntry]) -> Result<(), StorageError> {
        let dir = self.root.join(LINKS_DIR);
        clear_rows(&dir)?;
        for entry in links {
            write_row(&dir, &entry.location, entry)?;
        }
        Ok(())
    }

    fn save_chests(&self, chests: &[ChestEntry]) -> Result<(), StorageError> {
        let dir = self.root.join(CHESTS_DIR);
        clear_rows(&dir)?;
        for entry in chests {
            write_row(&dir, &entry.location, entry)?;
        }
        Ok(())
    }

    fn save_link(&self, location: &BlockLocation, tables: &[String]) -> Result<(), StorageError> {
        let dir = self.root.join(LINKS_DIR);
        if tables.is_empty() {
            return remove_row(&dir, location);
        }
        let entry = LinkEntry {
            location: location.clone(),
            tables: tables.to_vec(),
        };
        write_row(&dir, location, &entry)
    }

    fn save_chest(
        &self,
        location: &BlockLocation,
        state: Option<&ChestState>,
    ) -> Result<(), StorageError> {
        let dir = self.root.join(CHESTS_DIR);
        let Some(state) = state else {
            return remove_row(&dir, location);
        };
        let entry = ChestEntry {
            location: location.clone(),
            state: state.clone(),
        };
        write_row(&dir, location, &entry)
    }
}

/// File stem of a per-location row.
fn location_stem(location: &BlockLocation) -> String {
    let mut stem = String::with_capacity(location.world.len() + 16);
    for byte in location.world.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-' {
            stem.push(char::from(byte));
        } else {
            let _ = write!(stem, "%{byte:02X}");
        }
    }
    let _ = write!(stem, "@{},{},{}", location.x, location.y, location.z);
    stem
}

fn row_path(dir: &Path, location: &BlockLocation) -> PathBuf {
    dir.join(format!("{}.json", location_stem(location)))
}

fn write_row<T: Serialize>(
    dir: &Path,
    location: &BlockLocation,
    row: &T,
) -> Result<(), StorageError> {
    fs::create_dir_all(dir)?;
    let json = serde_json::to_string_pretty(row)?;
    fs::write(row_path(dir, location), json)?;
    Ok(())
}

fn remove_row(dir: &Path, location: &BlockLocation) -> Result<(), StorageError> {
    match fs::remove_file(row_path(dir, location)) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn clear_rows(dir: &Path) -> Result<(), StorageError> {
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Load every row file in `dir`. Unreadable or malformed files are skipped.
fn load_rows<T: DeserializeOwned>(dir: &Path) -> Vec<T> {
    let entries = match fs::read_dir(dir) {
        Ok(e) => e,
        Err(_) => return Vec::new(),
    };
    let mut rows = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<T>(&contents) {
                Ok(row) => rows.push(row),
                Err(e) => warn!("Failed to parse {}: {e}", path.display()),
            },
            Err(e) => warn!("Failed to read {}: {e}", path.display()),
        }
    }
    info!("Loaded {} entries from {}", rows.len(), dir.display());
    rows
}
