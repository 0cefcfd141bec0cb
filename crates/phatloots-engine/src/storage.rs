//! Persistence interface. The engine never does I/O itself; a host supplies
//! a [`LootStorage`] and decides when to call it.

use std::sync::Mutex;

use phatloots_api::BlockLocation;
use phatloots_loot::{table_key, LootTable};
use serde::{Deserialize, Serialize};

use crate::chest_state::ChestState;
use crate::error::StorageError;
use crate::link::LinkEntry;

/// One persisted container state row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChestEntry {
    pub location: BlockLocation,
    pub state: ChestState,
}

/// Everything the engine persists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub tables: Vec<LootTable>,
    #[serde(default)]
    pub links: Vec<LinkEntry>,
    #[serde(default)]
    pub chests: Vec<ChestEntry>,
}

/// Stores tables by name and links and chest states by location.
///
/// The whole-set methods replace everything of their kind. The per-location
/// methods touch a single row and are what hosts should call after each
/// interaction.
pub trait LootStorage {
    /// Read all persisted data.
    fn load(&self) -> Result<Snapshot, StorageError>;

    /// Names of every stored table.
    fn stored_tables(&self) -> Result<Vec<String>, StorageError>;

    fn save_table(&self, table: &LootTable) -> Result<(), StorageError>;

    fn delete_table(&self, name: &str) -> Result<(), StorageError>;

    fn save_links(&self, links: &[LinkEntry]) -> Result<(), StorageError>;

    fn save_chests(&self, chests: &[ChestEntry]) -> Result<(), StorageError>;

    /// Store the tables linked at one location. An empty list deletes the row.
    fn save_link(&self, location: &BlockLocation, tables: &[String]) -> Result<(), StorageError>;

    /// Store one container's state, or delete it with `None`.
    fn save_chest(
        &self,
        location: &BlockLocation,
        state: Option<&ChestState>,
    ) -> Result<(), StorageError>;

    /// Write everything: every table, all links, all chest states. Stored
    /// tables missing from the snapshot are deleted.
    ///
    /// This rewrites the whole data set and should not run on every change.
    fn save_all(&self, snapshot: &Snapshot) -> Result<(), StorageError> {
        for name in self.stored_tables()? {
            let key = table_key(&name);
            if !snapshot.tables.iter().any(|t| t.key() == key) {
                self.delete_table(&name)?;
            }
        }
        for table in &snapshot.tables {
            self.save_table(table)?;
        }
        self.save_links(&snapshot.links)?;
        self.save_chests(&snapshot.chests)
    }
}

/// In-memory storage, for tests and embedding hosts without a disk.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    data: Mutex<Snapshot>,
}

impl MemoryStorage {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            data: Mutex::new(snapshot),
        }
    }

    /// Copy of the stored data.
    pub fn contents(&self) -> Result<Snapshot, StorageError> {
        self.load()
    }

    fn with<T>(&self, f: impl FnOnce(&mut Snapshot) -> T) -> Result<T, StorageError> {
        let mut data = self
            .data
            .lock()
            .map_err(|_| StorageError::Backend("memory storage lock poisoned".into()))?;
        Ok(f(&mut data))
    }
}

impl LootStorage for MemoryStorage {
    fn load(&self) -> Result<Snapshot, StorageError> {
        self.with(|data| data.clone())
    }

    fn stored_tables(&self) -> Result<Vec<String>, StorageError> {
        self.with(|data| data.tables.iter().map(|t| t.name().to_string()).collect())
    }

    fn save_table(&self, table: &LootTable) -> Result<(), StorageError> {
        table.validate()?;
        self.with(|data| {
            let key = table.key();
            match data.tables.iter_mut().find(|t| t.key() == key) {
                Some(existing) => *existing = table.clone(),
                None => data.tables.push(table.clone()),
            }
        })
    }

    fn delete_table(&self, name: &str) -> Result<(), StorageError> {
        let key = table_key(name);
        self.with(|data| data.tables.retain(|t| t.key() != key))
    }

    fn save_links(&self, links: &[LinkEntry]) -> Result<(), StorageError> {
        self.with(|data| data.links = links.to_vec())
    }

    fn save_chests(&self, chests: &[ChestEntry]) -> Result<(), StorageError> {
        self.with(|data| data.chests = chests.to_vec())
    }

    fn save_link(&self, location: &BlockLocation, tables: &[String]) -> Result<(), StorageError> {
        self.with(|data| {
            let row = data.links.iter().position(|l| &l.location == location);
            match (row, tables.is_empty()) {
                (Some(i), true) => {
                    data.links.remove(i);
                }
                (Some(i), false) => data.links[i].tables = tables.to_vec(),
                (None, true) => {}
                (None, false) => data.links.push(LinkEntry {
                    location: location.clone(),
                    tables: tables.to_vec(),
                }),
            }
        })
    }

    fn save_chest(
        &self,
        location: &BlockLocation,
        state: Option<&ChestState>,
    ) -> Result<(), StorageError> {
        self.with(|data| {
            let row = data.chests.iter().position(|c| &c.location == location);
            match (row, state) {
                (Some(i), None) => {
                    data.chests.remove(i);
                }
                (Some(i), Some(state)) => data.chests[i].state = state.clone(),
                (None, None) => {}
                (None, Some(state)) => data.chests.push(ChestEntry {
                    location: location.clone(),
                    state: state.clone(),
                }),
            }
        })
    }
}
