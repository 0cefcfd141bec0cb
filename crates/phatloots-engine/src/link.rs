//! Location → loot table links.

use std::collections::HashMap;

use phatloots_api::BlockLocation;
use phatloots_loot::table_key;
use serde::{Deserialize, Serialize};

/// One persisted link row: a location and its tables in link order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkEntry {
    pub location: BlockLocation,
    pub tables: Vec<String>,
}

/// Maps container locations to the tables linked to them.
///
/// Table names are stored as case-insensitive keys. Each location keeps its
/// tables in the order they were linked; that order is the roll order.
#[derive(Debug, Clone, Default)]
pub struct LinkRegistry {
    links: HashMap<BlockLocation, Vec<String>>,
}

impl LinkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table keys linked to `location`, empty if unlinked.
    pub fn resolve(&self, location: &BlockLocation) -> &[String] {
        self.links.get(location).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_linked(&self, location: &BlockLocation) -> bool {
        self.links.contains_key(location)
    }

    /// Link a table. Returns false if the pair was already linked.
    pub fn link(&mut self, location: &BlockLocation, table: &str) -> bool {
        let key = table_key(table);
        let tables = self.links.entry(location.clone()).or_default();
        if tables.contains(&key) {
            return false;
        }
        tables.push(key);
        true
    }

    /// Remove one link. Removing the last table deletes the location.
    pub fn unlink(&mut self, location: &BlockLocation, table: &str) -> bool {
        let key = table_key(table);
        let Some(tables) = self.links.get_mut(location) else {
            return false;
        };
        let before = tables.len();
        tables.retain(|t| *t != key);
        let removed = tables.len() != before;
        if tables.is_empty() {
            self.links.remove(location);
        }
        removed
    }

    /// Remove every link at `location`, returning the removed table keys.
    pub fn unlink_all(&mut self, location: &BlockLocation) -> Vec<String> {
        self.links.remove(location).unwrap_or_default()
    }

    /// Remove `table` from every location. Returns the locations touched.
    pub fn unlink_table(&mut self, table: &str) -> Vec<BlockLocation> {
        let touched = self.locations_linked_to(table);
        for location in &touched {
            self.unlink(location, table);
        }
        touched
    }

    /// Locations `table` is linked to, sorted.
    pub fn locations_linked_to(&self, table: &str) -> Vec<BlockLocation> {
        let key = table_key(table);
        let mut found: Vec<BlockLocation> = self
            .links
            .iter()
            .filter(|(_, tables)| tables.contains(&key))
            .map(|(loc, _)| loc.clone())
            .collect();
        found.sort();
        found
    }

    /// Every linked location, sorted.
    pub fn locations(&self) -> Vec<&BlockLocation> {
        let mut locations: Vec<&BlockLocation> = self.links.keys().collect();
        locations.sort();
        locations
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn clear(&mut self) {
        self.links.clear();
    }

    /// Persistable rows, sorted by location.
    pub fn to_entries(&self) -> Vec<LinkEntry> {
        self.locations()
            .into_iter()
            .map(|location| LinkEntry {
                location: location.clone(),
                tables: self.resolve(location).to_vec(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(x: i32) -> BlockLocation {
        BlockLocation::new("world", x, 64, 0)
    }

    #[test]
    fn resolve_unlinked_is_empty() {
        let links = LinkRegistry::new();
        assert!(links.resolve(&loc(0)).is_empty());
        assert!(!links.is_linked(&loc(0)));
    }

    #[test]
    fn link_preserves_order_and_is_idempotent() {
        let mut links = LinkRegistry::new();
        assert!(links.link(&loc(0), "Gold"));
        assert!(links.link(&loc(0), "Iron"));
        assert!(!links.link(&loc(0), "GOLD"));
        assert_eq!(links.resolve(&loc(0)), ["gold", "iron"]);
    }

    #[test]
    fn unlink_last_removes_location() {
        let mut links = LinkRegistry::new();
        links.link(&loc(0), "Gold");
        links.link(&loc(0), "Iron");
        assert!(links.unlink(&loc(0), "gold"));
        assert!(links.is_linked(&loc(0)));
        assert!(!links.unlink(&loc(0), "gold"));
        assert!(links.unlink(&loc(0), "Iron"));
        assert!(!links.is_linked(&loc(0)));
        assert!(links.is_empty());
    }

    #[test]
    fn unlink_all_returns_tables() {
        let mut links = LinkRegistry::new();
        links.link(&loc(1), "A");
        links.link(&loc(1), "B");
        assert_eq!(links.unlink_all(&loc(1)), vec!["a", "b"]);
        assert!(links.unlink_all(&loc(1)).is_empty());
    }

    #[test]
    fn unlink_table_everywhere() {
        let mut links = LinkRegistry::new();
        links.link(&loc(1), "Gold");
        links.link(&loc(2), "Gold");
        links.link(&loc(2), "Iron");
        links.link(&loc(3), "Iron");
        assert_eq!(links.locations_linked_to("gold"), vec![loc(1), loc(2)]);
        assert_eq!(links.unlink_table("Gold"), vec![loc(1), loc(2)]);
        assert!(!links.is_linked(&loc(1)));
        assert_eq!(links.resolve(&loc(2)), ["iron"]);
        assert_eq!(links.len(), 2);
    }

    #[test]
    fn entries_are_sorted() {
        let mut links = LinkRegistry::new();
        links.link(&loc(5), "B");
        links.link(&loc(-2), "A");
        let entries = links.to_entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].location, loc(-2));
        assert_eq!(entries[1].tables, vec!["b".to_string()]);
    }
}
