//! Shared types and host interfaces for the PhatLoots engine.
//!
//! This crate defines the values that cross crate boundaries (locations,
//! actors, item stacks, loot bundles) and the traits a host integration
//! implements so the engine can touch the world without depending on it.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ─── Types ───────────────────────────────────────────────────────────────────

/// A block coordinate in a named world.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockLocation {
    pub world: String,
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockLocation {
    pub fn new(world: impl Into<String>, x: i32, y: i32, z: i32) -> Self {
        Self {
            world: world.into(),
            x,
            y,
            z,
        }
    }
}

impl fmt::Display for BlockLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{},{},{}", self.world, self.x, self.y, self.z)
    }
}

/// The player (or other actor) opening a container.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LootActor {
    pub name: String,
    pub uuid: String,
}

impl LootActor {
    pub fn new(name: impl Into<String>, uuid: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uuid: uuid.into(),
        }
    }
}

/// Item metadata: display data plus a hidden key/value store.
///
/// `tags` is never shown to players and survives serialization, which is what
/// the structured link encoding relies on. `lore` is the visible description.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lore: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

/// A concrete stack of items.
///
/// `count == 0` means the stack is empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    /// Namespaced item identifier, e.g. `minecraft:gold_ingot`.
    pub id: String,
    pub count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<ItemMeta>,
}

impl ItemStack {
    /// Create a plain stack with no metadata.
    pub fn new(id: impl Into<String>, count: u32) -> Self {
        Self {
            id: id.into(),
            count,
            meta: None,
        }
    }

    /// Whether this stack holds nothing.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Metadata, created empty on first access.
    pub fn meta_mut(&mut self) -> &mut ItemMeta {
        self.meta.get_or_insert_with(ItemMeta::default)
    }
}

/// The item stacks produced by one roll, in roll order.
///
/// Identical item types are not merged; stacking is up to whoever places the
/// bundle into an inventory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LootBundle {
    items: Vec<ItemStack>,
}

impl LootBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: ItemStack) {
        if !item.is_empty() {
            self.items.push(item);
        }
    }

    /// Append another bundle's items after this one's.
    pub fn merge(&mut self, other: LootBundle) {
        self.items.extend(other.items);
    }

    pub fn items(&self) -> &[ItemStack] {
        &self.items
    }

    pub fn into_items(self) -> Vec<ItemStack> {
        self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Sum of all stack counts.
    pub fn total_count(&self) -> u64 {
        self.items.iter().map(|i| u64::from(i.count)).sum()
    }
}

impl IntoIterator for LootBundle {
    type Item = ItemStack;
    type IntoIter = std::vec::IntoIter<ItemStack>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

/// Result of notifying an observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventResult {
    /// Continue normal handling.
    Continue,
    /// The observer cancelled the event.
    Cancelled,
}

/// Emitted when an actor loots a container that stays intact.
#[derive(Debug, Clone, Copy)]
pub struct ChestOpenEvent<'a> {
    pub location: &'a BlockLocation,
    pub actor: &'a LootActor,
}

// ─── Host interfaces ─────────────────────────────────────────────────────────

/// Access to the physical containers in the world.
pub trait WorldAccess {
    /// Whether the block at `location` is a container that may carry links.
    fn is_linkable_container(&self, location: &BlockLocation) -> bool;

    /// Whether a container currently exists at `location`.
    fn container_exists(&self, location: &BlockLocation) -> bool;

    /// Remove the container block (break-and-respawn).
    fn destroy_container(&mut self, location: &BlockLocation);

    /// Put a previously destroyed container back.
    fn restore_container(&mut self, location: &BlockLocation);

    /// Whether `actor` currently has a container view open.
    fn has_container_view(&self, actor: &LootActor) -> bool;

    /// Close whatever container view `actor` has open.
    fn close_container_view(&mut self, actor: &LootActor);
}

/// Region permission check, consulted once per interaction.
pub trait RegionGate {
    fn is_lootable_by(&self, location: &BlockLocation, actor: &LootActor) -> bool;
}

/// A gate that allows everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenRegions;

impl RegionGate for OpenRegions {
    fn is_lootable_by(&self, _location: &BlockLocation, _actor: &LootActor) -> bool {
        true
    }
}

impl<F> RegionGate for F
where
    F: Fn(&BlockLocation, &LootActor) -> bool,
{
    fn is_lootable_by(&self, location: &BlockLocation, actor: &LootActor) -> bool {
        self(location, actor)
    }
}

/// Synchronous observer of container openings. Returning `Cancelled` makes the
/// engine close the actor's container view.
pub trait ChestObserver {
    fn on_chest_open(&mut self, event: &ChestOpenEvent<'_>) -> EventResult;
}

/// No observers registered.
impl ChestObserver for () {
    fn on_chest_open(&mut self, _event: &ChestOpenEvent<'_>) -> EventResult {
        EventResult::Continue
    }
}

/// Every observer sees the event; any single cancellation cancels it.
impl ChestObserver for Vec<Box<dyn ChestObserver + Send>> {
    fn on_chest_open(&mut self, event: &ChestOpenEvent<'_>) -> EventResult {
        let mut result = EventResult::Continue;
        for observer in self.iter_mut() {
            if observer.on_chest_open(event) == EventResult::Cancelled {
                result = EventResult::Cancelled;
            }
        }
        result
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
