//! The PhatLoots repository: tables, links, container state and respawns,
//! owned together and mutated through `&mut self`.
//!
//! A host owns exactly one repository per world region and drives it from a
//! single task, which serialises every roll and break decision for a
//! container. Nothing here blocks or touches storage unless asked to.

use std::collections::HashMap;

use phatloots_api::{
    BlockLocation, ChestObserver, ChestOpenEvent, EventResult, ItemStack, LootActor, LootBundle,
    RegionGate, WorldAccess,
};
use phatloots_loot::{roll, table_key, LootTable, ResetDelay, TableError};
use rand::Rng;
use tracing::{debug, info, warn};

use crate::chest_state::{ChestState, Cooldown};
use crate::error::StorageError;
use crate::link::LinkRegistry;
use crate::link_codec::{LinkCodec, LinkEncoding};
use crate::respawn::RespawnScheduler;
use crate::storage::{ChestEntry, LootStorage, Snapshot};

/// The host collaborators consulted during one interaction.
pub struct LootContext<'a> {
    pub world: &'a mut dyn WorldAccess,
    pub gate: &'a dyn RegionGate,
    pub observer: &'a mut dyn ChestObserver,
}

/// What happened to the container after a successful loot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Container stays. `cancelled` is set when an observer cancelled the
    /// open notification and the actor's view was closed.
    Intact { cancelled: bool },
    /// Container destroyed; it respawns at `respawn_at`.
    Broken { respawn_at: u64 },
    /// Container destroyed for good and its links removed.
    Destroyed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LootOutcome {
    /// No loot table is linked to the location.
    NotLinked,
    /// The region gate refused the actor. Nothing was changed.
    Denied,
    /// The container is broken and waiting to respawn. Nothing was changed.
    NotEligible { respawn_at: u64 },
    /// The container was looted. `bundles` holds one entry per table that
    /// was rolled, in link order; tables still cooling down are absent.
    Looted {
        bundles: Vec<(String, LootBundle)>,
        disposition: Disposition,
    },
}

impl LootOutcome {
    pub fn looted(&self) -> bool {
        matches!(self, LootOutcome::Looted { .. })
    }

    /// All rolled items, in roll order.
    pub fn items(&self) -> Vec<ItemStack> {
        match self {
            LootOutcome::Looted { bundles, .. } => bundles
                .iter()
                .flat_map(|(_, b)| b.items().iter().cloned())
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Result of linking a table to a location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkResult {
    Linked,
    AlreadyLinked,
    UnknownTable,
    NotAContainer,
}

#[derive(Debug, Default)]
pub struct PhatLoots {
    tables: HashMap<String, LootTable>,
    links: LinkRegistry,
    chests: HashMap<BlockLocation, ChestState>,
    respawns: RespawnScheduler,
    codec: LinkCodec,
}

impl PhatLoots {
    pub fn new(codec: LinkCodec) -> Self {
        Self {
            codec,
            ..Self::default()
        }
    }

    /// Build a repository from storage.
    pub fn load(codec: LinkCodec, storage: &dyn LootStorage) -> Result<Self, StorageError> {
        let mut loots = Self::new(codec);
        loots.reload(storage)?;
        Ok(loots)
    }

    // ─── Persistence ─────────────────────────────────────────────────────────

    /// Discard all in-memory data and re-read it from storage.
    pub fn reload(&mut self, storage: &dyn LootStorage) -> Result<(), StorageError> {
        let snapshot = storage.load()?;
        self.apply_snapshot(snapshot);
        Ok(())
    }

    /// Replace all in-memory data with `snapshot`.
    ///
    /// Invalid tables are logged and left out. Broken containers are put back
    /// on the respawn queue; overdue ones fire on the next tick.
    pub fn apply_snapshot(&mut self, snapshot: Snapshot) {
        self.clear();

        for table in snapshot.tables {
            if let Err(e) = table.validate() {
                warn!("Excluding loot table '{}': {e}", table.name());
                continue;
            }
            if let Some(previous) = self.tables.insert(table.key(), table) {
                warn!("Duplicate loot table '{}', keeping the last one", previous.name());
            }
        }

        for entry in snapshot.links {
            for name in &entry.tables {
                if self.tables.contains_key(&table_key(name)) {
                    self.links.link(&entry.location, name);
                } else {
                    warn!("Dropping link {} -> unknown table '{name}'", entry.location);
                }
            }
        }

        for ChestEntry { location, state } in snapshot.chests {
            if let Some(due) = state.respawn_at() {
                self.respawns.schedule(&location, due);
            }
            if !state.is_fresh() {
                self.chests.insert(location, state);
            }
        }

        info!(
            "Loaded {} loot table(s), {} linked container(s), {} pending respawn(s)",
            self.tables.len(),
            self.links.len(),
            self.respawns.len()
        );
    }

    /// Everything `save_all` writes, in a stable order.
    pub fn snapshot(&self) -> Snapshot {
        let mut chests: Vec<ChestEntry> = self
            .chests
            .iter()
            .map(|(location, state)| ChestEntry {
                location: location.clone(),
                state: state.clone(),
            })
            .collect();
        chests.sort_by(|a, b| a.location.cmp(&b.location));

        Snapshot {
            tables: self.tables().into_iter().cloned().collect(),
            links: self.links.to_entries(),
            chests,
        }
    }

    /// Write every table, link and chest state. Expensive; see
    /// [`LootStorage::save_all`].
    pub fn save_all(&self, storage: &dyn LootStorage) -> Result<(), StorageError> {
        storage.save_all(&self.snapshot())?;
        info!("Saved all loot data");
        Ok(())
    }

    /// Write the link row and container state of one location. Rows for an
    /// unlinked location or a fresh container are deleted.
    pub fn save_location(
        &self,
        storage: &dyn LootStorage,
        location: &BlockLocation,
    ) -> Result<(), StorageError> {
        storage.save_link(location, self.links.resolve(location))?;
        storage.save_chest(location, self.chests.get(location))
    }

    fn clear(&mut self) {
        self.tables.clear();
        self.links.clear();
        self.chests.clear();
        self.respawns.clear();
    }

    // ─── Tables ──────────────────────────────────────────────────────────────

    /// Look up a table by name, ignoring case.
    pub fn table(&self, name: &str) -> Option<&LootTable> {
        self.tables.get(&table_key(name))
    }

    /// All tables, sorted by key.
    pub fn tables(&self) -> Vec<&LootTable> {
        let mut tables: Vec<&LootTable> = self.tables.values().collect();
        tables.sort_by_key(|t| t.key());
        tables
    }

    /// Add or replace a table. Invalid tables are rejected.
    pub fn add_table(&mut self, table: LootTable) -> Result<Option<LootTable>, TableError> {
        table.validate()?;
        info!("Registered loot table '{}'", table.name());
        Ok(self.tables.insert(table.key(), table))
    }

    /// Remove a table and every link to it.
    pub fn remove_table(&mut self, name: &str) -> Option<LootTable> {
        self.take_table(name).map(|(table, _)| table)
    }

    /// Remove a table, delete it from storage and save every location that
    /// was linked to it.
    pub fn delete_table(
        &mut self,
        name: &str,
        storage: &dyn LootStorage,
    ) -> Result<Option<LootTable>, StorageError> {
        let Some((table, touched)) = self.take_table(name) else {
            return Ok(None);
        };
        storage.delete_table(table.name())?;
        for location in &touched {
            self.save_location(storage, location)?;
        }
        Ok(Some(table))
    }

    fn take_table(&mut self, name: &str) -> Option<(LootTable, Vec<BlockLocation>)> {
        let key = table_key(name);
        let table = self.tables.remove(&key)?;
        let touched = self.links.unlink_table(&key);
        for location in &touched {
            if let Some(state) = self.chests.get_mut(location) {
                state.forget_table(&key);
            }
            self.prune_state(location);
        }
        info!("Removed loot table '{}'", table.name());
        Some((table, touched))
    }

    /// Roll a table outside of any container. Unknown names roll nothing.
    pub fn roll_for_loot<R: Rng + ?Sized>(&self, name: &str, rng: &mut R) -> LootBundle {
        match self.table(name) {
            Some(table) => roll(table, rng),
            None => LootBundle::new(),
        }
    }

    // ─── Container links ─────────────────────────────────────────────────────

    /// Tables linked to `location`, in link order.
    pub fn linked_tables(&self, location: &BlockLocation) -> Vec<&LootTable> {
        self.links
            .resolve(location)
            .iter()
            .filter_map(|key| self.tables.get(key))
            .collect()
    }

    pub fn is_linked(&self, location: &BlockLocation) -> bool {
        self.links.is_linked(location)
    }

    pub fn link_location(
        &mut self,
        world: &dyn WorldAccess,
        location: &BlockLocation,
        name: &str,
    ) -> LinkResult {
        if !self.tables.contains_key(&table_key(name)) {
            return LinkResult::UnknownTable;
        }
        if !world.is_linkable_container(location) {
            return LinkResult::NotAContainer;
        }
        if self.links.link(location, name) {
            info!("Linked {location} to '{name}'");
            LinkResult::Linked
        } else {
            LinkResult::AlreadyLinked
        }
    }

    pub fn unlink_location(&mut self, location: &BlockLocation, name: &str) -> bool {
        let removed = self.links.unlink(location, name);
        if removed {
            if let Some(state) = self.chests.get_mut(location) {
                state.forget_table(&table_key(name));
            }
            self.prune_state(location);
            info!("Unlinked {location} from '{name}'");
        }
        removed
    }

    pub fn unlink_all(&mut self, location: &BlockLocation) -> Vec<String> {
        let removed = self.links.unlink_all(location);
        self.prune_state(location);
        removed
    }

    /// Every linked location, sorted.
    pub fn linked_locations(&self) -> Vec<&BlockLocation> {
        self.links.locations()
    }

    pub fn locations_linked_to(&self, name: &str) -> Vec<BlockLocation> {
        self.links.locations_linked_to(name)
    }

    /// Container states with roll history or a pending respawn.
    pub fn chests(&self) -> impl Iterator<Item = (&BlockLocation, &ChestState)> {
        self.chests.iter()
    }

    pub fn chest(&self, location: &BlockLocation) -> Option<&ChestState> {
        self.chests.get(location)
    }

    /// Drop state of an unlinked container unless it still has to respawn.
    fn prune_state(&mut self, location: &BlockLocation) {
        if self.links.is_linked(location) {
            return;
        }
        if self.chests.get(location).is_some_and(|s| !s.is_broken()) {
            self.chests.remove(location);
        }
    }

    // ─── Item links ──────────────────────────────────────────────────────────

    pub fn codec(&self) -> &LinkCodec {
        &self.codec
    }

    /// Link an item with the configured encoding. Unknown tables are refused.
    pub fn link_item(&self, item: &mut ItemStack, name: &str) -> bool {
        self.link_item_with(item, name, self.codec.config().encoding)
    }

    pub fn link_item_with(&self, item: &mut ItemStack, name: &str, mode: LinkEncoding) -> bool {
        let Some(table) = self.table(name) else {
            return false;
        };
        self.codec.encode(item, table.name(), mode);
        true
    }

    /// The table an item is linked to, if it still exists.
    pub fn item_table(&self, item: &ItemStack) -> Option<&LootTable> {
        self.table(&self.codec.decode(item)?)
    }

    // ─── Looting ─────────────────────────────────────────────────────────────

    /// How long until `actor` may loot `name` at `location` again.
    pub fn time_remaining(
        &self,
        location: &BlockLocation,
        name: &str,
        actor: &LootActor,
        now: u64,
    ) -> Cooldown {
        match (self.table(name), self.chests.get(location)) {
            (Some(table), Some(state)) => state.cooldown(table, actor, now),
            _ => Cooldown::Ready,
        }
    }

    /// Let `actor` loot the container at `location`.
    ///
    /// Each linked table the actor is eligible for is rolled and its cooldown
    /// recorded. With `auto_spill` only global break-and-respawn tables are
    /// considered. The container breaks only when every considered table was
    /// rolled and breaks containers; it then stays broken for the longest
    /// reset delay among them.
    ///
    /// A container that is gone from the world without a pending respawn
    /// loses its links and reports [`LootOutcome::NotLinked`].
    pub fn loot<R: Rng + ?Sized>(
        &mut self,
        ctx: &mut LootContext<'_>,
        location: &BlockLocation,
        actor: &LootActor,
        auto_spill: bool,
        now: u64,
        rng: &mut R,
    ) -> LootOutcome {
        let linked: Vec<&LootTable> = self
            .links
            .resolve(location)
            .iter()
            .filter_map(|key| self.tables.get(key))
            .collect();
        if linked.is_empty() {
            return LootOutcome::NotLinked;
        }

        if !ctx.gate.is_lootable_by(location, actor) {
            debug!("{} may not loot {location}", actor.name);
            return LootOutcome::Denied;
        }

        if let Some(respawn_at) = self.chests.get(location).and_then(ChestState::respawn_at) {
            return LootOutcome::NotEligible { respawn_at };
        }

        if !ctx.world.container_exists(location) {
            info!("Container at {location} is gone, dropping its links");
            self.links.unlink_all(location);
            self.chests.remove(location);
            return LootOutcome::NotLinked;
        }

        let state = self.chests.entry(location.clone()).or_default();
        let mut bundles = Vec::new();
        let mut considered = 0usize;
        let mut break_all = true;
        let mut delay: Option<ResetDelay> = None;

        for table in linked {
            if auto_spill && !table.breaks_container() {
                continue;
            }
            considered += 1;
            if !state.is_eligible(table, actor, now) {
                break_all = false;
                continue;
            }
            let bundle = roll(table, rng);
            state.record_roll(table, actor, now);
            debug!(
                "{} rolled '{}' at {location}: {} stack(s)",
                actor.name,
                table.name(),
                bundle.len()
            );
            bundles.push((table.name().to_string(), bundle));
            if table.breaks_container() {
                delay = delay.max(Some(table.reset_delay));
            } else {
                break_all = false;
            }
        }

        let disposition = match delay {
            Some(ResetDelay::Seconds(secs)) if considered > 0 && break_all => {
                let due = state.break_until(now.saturating_add(secs));
                let respawn_at = self.respawns.schedule(location, due);
                ctx.world.destroy_container(location);
                info!("{} broke {location}, respawning at {respawn_at}", actor.name);
                Disposition::Broken { respawn_at }
            }
            Some(ResetDelay::Never) if considered > 0 && break_all => {
                self.chests.remove(location);
                self.respawns.cancel(location);
                self.links.unlink_all(location);
                ctx.world.destroy_container(location);
                info!("{} broke {location} for good", actor.name);
                Disposition::Destroyed
            }
            _ => {
                if state.is_fresh() {
                    self.chests.remove(location);
                }
                Disposition::Intact {
                    cancelled: notify_open(ctx, location, actor),
                }
            }
        };

        LootOutcome::Looted {
            bundles,
            disposition,
        }
    }

    /// Roll the table an item is linked to, e.g. when a loot bag is opened.
    /// No container state is involved.
    pub fn open_item<R: Rng + ?Sized>(&self, item: &ItemStack, rng: &mut R) -> Option<LootBundle> {
        self.item_table(item).map(|table| roll(table, rng))
    }

    // ─── Respawns ────────────────────────────────────────────────────────────

    /// Restore every container due by `now`. Restored containers start fresh;
    /// one still standing in the world is only reset.
    pub fn tick(&mut self, now: u64, world: &mut dyn WorldAccess) -> Vec<BlockLocation> {
        let ready = self.respawns.tick(now);
        for location in &ready {
            self.chests.remove(location);
            if !world.container_exists(location) {
                world.restore_container(location);
            }
            info!("Respawned {location}");
        }
        ready
    }

    pub fn pending_respawns(&self) -> Vec<(BlockLocation, u64)> {
        self.respawns.pending()
    }
}

/// Emit the "opened" notification. Returns true if it was cancelled.
fn notify_open(ctx: &mut LootContext<'_>, location: &BlockLocation, actor: &LootActor) -> bool {
    if !ctx.world.has_container_view(actor) {
        return false;
    }
    let event = ChestOpenEvent { location, actor };
    if ctx.observer.on_chest_open(&event) == EventResult::Cancelled {
        ctx.world.close_container_view(actor);
        true
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use phatloots_api::OpenRegions;
    use phatloots_loot::{Amount, ChanceEntry, ItemDrop, LootEntry};
    use rand::rngs::mock::StepRng;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::storage::MemoryStorage;

    // ─── Mocks ───────────────────────────────────────────────────────────────

    #[derive(Default)]
    struct MockWorld {
        destroyed: Vec<BlockLocation>,
        restored: Vec<BlockLocation>,
        viewing: HashSet<String>,
        closed: Vec<String>,
        not_containers: HashSet<BlockLocation>,
    }

    impl WorldAccess for MockWorld {
        fn is_linkable_container(&self, location: &BlockLocation) -> bool {
            !self.not_containers.contains(location)
        }

        fn container_exists(&self, location: &BlockLocation) -> bool {
            self.destroyed.iter().filter(|l| *l == location).count()
                <= self.restored.iter().filter(|l| *l == location).count()
        }

        fn destroy_container(&mut self, location: &BlockLocation) {
            self.destroyed.push(location.clone());
        }

        fn restore_container(&mut self, location: &BlockLocation) {
            self.restored.push(location.clone());
        }

        fn has_container_view(&self, actor: &LootActor) -> bool {
            self.viewing.contains(&actor.uuid)
        }

        fn close_container_view(&mut self, actor: &LootActor) {
            self.closed.push(actor.uuid.clone());
        }
    }

    #[derive(Default)]
    struct CountingObserver {
        opened: usize,
        cancel: bool,
    }

    impl ChestObserver for CountingObserver {
        fn on_chest_open(&mut self, _event: &ChestOpenEvent<'_>) -> EventResult {
            self.opened += 1;
            if self.cancel {
                EventResult::Cancelled
            } else {
                EventResult::Continue
            }
        }
    }

    // ─── Helpers ─────────────────────────────────────────────────────────────

    fn table(name: &str, global: bool, breaks: bool, delay: ResetDelay) -> LootTable {
        let mut t = LootTable::new(name);
        t.global = global;
        t.break_and_respawn = breaks;
        t.reset_delay = delay;
        t.entries.push(LootEntry::Item(ChanceEntry {
            drop: ItemDrop::new("minecraft:gold_ingot", Amount::Fixed(1)),
            probability: 1.0,
        }));
        t
    }

    fn chest() -> BlockLocation {
        BlockLocation::new("world", 10, 64, -3)
    }

    fn alice() -> LootActor {
        LootActor::new("Alice", "uuid-alice")
    }

    fn bob() -> LootActor {
        LootActor::new("Bob", "uuid-bob")
    }

    fn rng() -> StepRng {
        StepRng::new(0, 0)
    }

    fn loot_at(
        loots: &mut PhatLoots,
        world: &mut MockWorld,
        actor: &LootActor,
        now: u64,
    ) -> LootOutcome {
        let mut observer = ();
        let mut ctx = LootContext {
            world,
            gate: &OpenRegions,
            observer: &mut observer,
        };
        loots.loot(&mut ctx, &chest(), actor, false, now, &mut rng())
    }

    fn linked(tables: Vec<LootTable>) -> (PhatLoots, MockWorld) {
        let mut loots = PhatLoots::default();
        let world = MockWorld::default();
        for t in tables {
            let name = t.name().to_string();
            loots.add_table(t).unwrap();
            assert_eq!(
                loots.link_location(&world, &chest(), &name),
                LinkResult::Linked
            );
        }
        (loots, world)
    }

    // ─── Tables ──────────────────────────────────────────────────────────────

    #[test]
    fn add_table_rejects_invalid() {
        let mut loots = PhatLoots::default();
        let bad = table("Bad", false, true, ResetDelay::Seconds(0));
        assert_eq!(
            loots.add_table(bad),
            Err(TableError::ConflictingFlags { table: "Bad".into() })
        );
        assert!(loots.tables().is_empty());
    }

    #[test]
    fn tables_are_case_insensitive() {
        let mut loots = PhatLoots::default();
        loots
            .add_table(table("Gold", true, false, ResetDelay::Seconds(0)))
            .unwrap();
        assert!(loots.table("GOLD").is_some());
        let replaced = loots
            .add_table(table("gold", false, false, ResetDelay::Seconds(5)))
            .unwrap();
        assert_eq!(replaced.map(|t| t.name().to_string()), Some("Gold".into()));
        assert_eq!(loots.tables().len(), 1);
    }

    #[test]
    fn roll_for_unknown_table_is_empty() {
        let loots = PhatLoots::default();
        assert!(loots.roll_for_loot("missing", &mut rng()).is_empty());
    }

    #[test]
    fn remove_table_unlinks_everywhere() {
        let (mut loots, world) = linked(vec![table("Gold", true, false, ResetDelay::Seconds(0))]);
        let other = BlockLocation::new("world", 0, 0, 0);
        loots.link_location(&world, &other, "gold");
        assert_eq!(loots.locations_linked_to("Gold").len(), 2);

        assert!(loots.remove_table("GOLD").is_some());
        assert!(!loots.is_linked(&chest()));
        assert!(!loots.is_linked(&other));
        assert!(loots.remove_table("gold").is_none());
    }

    #[test]
    fn deleted_table_stays_gone_after_save_and_reload() {
        let (mut loots, mut world) = linked(vec![
            table("Gold", true, false, ResetDelay::Seconds(60)),
            table("Iron", true, false, ResetDelay::Seconds(60)),
        ]);
        loot_at(&mut loots, &mut world, &alice(), 0);
        let storage = MemoryStorage::default();
        loots.save_all(&storage).unwrap();

        let removed = loots.delete_table("GOLD", &storage).unwrap();
        assert_eq!(removed.map(|t| t.name().to_string()), Some("Gold".into()));
        assert!(loots.delete_table("gold", &storage).unwrap().is_none());

        let stored = storage.contents().unwrap();
        assert_eq!(stored.links[0].tables, vec!["iron"]);
        assert!(!stored.chests[0].state.is_fresh());

        loots.save_all(&storage).unwrap();
        loots.reload(&storage).unwrap();
        assert!(loots.table("Gold").is_none());
        assert!(loots.table("Iron").is_some());
        assert_eq!(loots.locations_linked_to("Iron"), vec![chest()]);
    }

    #[test]
    fn save_all_forgets_tables_removed_in_memory() {
        let (mut loots, _world) =
            linked(vec![table("Gold", true, false, ResetDelay::Seconds(0))]);
        let storage = MemoryStorage::default();
        loots.save_all(&storage).unwrap();

        loots.remove_table("gold");
        loots.save_all(&storage).unwrap();
        loots.reload(&storage).unwrap();
        assert!(loots.tables().is_empty());
        assert!(!loots.is_linked(&chest()));
    }

    // ─── Links ───────────────────────────────────────────────────────────────

    #[test]
    fn link_location_results() {
        let mut loots = PhatLoots::default();
        let mut world = MockWorld::default();
        let stone = BlockLocation::new("world", 1, 1, 1);
        world.not_containers.insert(stone.clone());
        loots
            .add_table(table("Gold", true, false, ResetDelay::Seconds(0)))
            .unwrap();

        assert_eq!(loots.link_location(&world, &chest(), "Nope"), LinkResult::UnknownTable);
        assert_eq!(loots.link_location(&world, &stone, "Gold"), LinkResult::NotAContainer);
        assert_eq!(loots.link_location(&world, &chest(), "Gold"), LinkResult::Linked);
        assert_eq!(loots.link_location(&world, &chest(), "gold"), LinkResult::AlreadyLinked);
        assert_eq!(loots.linked_tables(&chest()).len(), 1);
    }

    #[test]
    fn unlink_last_table_drops_history() {
        let (mut loots, mut world) =
            linked(vec![table("Gold", true, false, ResetDelay::Seconds(60))]);
        loot_at(&mut loots, &mut world, &alice(), 0);
        assert!(loots.chest(&chest()).is_some());

        assert!(loots.unlink_location(&chest(), "Gold"));
        assert!(loots.chest(&chest()).is_none());
        assert!(!loots.unlink_location(&chest(), "Gold"));
    }

    // ─── Looting ─────────────────────────────────────────────────────────────

    #[test]
    fn unlinked_location_is_not_linked() {
        let mut loots = PhatLoots::default();
        let mut world = MockWorld::default();
        assert_eq!(loot_at(&mut loots, &mut world, &alice(), 0), LootOutcome::NotLinked);
    }

    #[test]
    fn region_gate_denies_without_side_effects() {
        let (mut loots, mut world) =
            linked(vec![table("Gold", true, true, ResetDelay::Seconds(60))]);
        let deny = |_: &BlockLocation, _: &LootActor| false;
        let mut observer = ();
        let mut ctx = LootContext {
            world: &mut world,
            gate: &deny,
            observer: &mut observer,
        };
        let outcome = loots.loot(&mut ctx, &chest(), &alice(), false, 0, &mut rng());
        assert_eq!(outcome, LootOutcome::Denied);
        assert!(loots.chest(&chest()).is_none());
        assert!(world.destroyed.is_empty());
    }

    #[test]
    fn break_and_respawn_cycle() {
        let (mut loots, mut world) =
            linked(vec![table("Gold", true, true, ResetDelay::Seconds(60))]);

        let first = loot_at(&mut loots, &mut world, &alice(), 100);
        assert_eq!(first.items().len(), 1);
        assert!(matches!(
            first,
            LootOutcome::Looted {
                disposition: Disposition::Broken { respawn_at: 160 },
                ..
            }
        ));
        assert_eq!(world.destroyed, vec![chest()]);
        assert_eq!(loots.pending_respawns(), vec![(chest(), 160)]);

        assert_eq!(
            loot_at(&mut loots, &mut world, &bob(), 120),
            LootOutcome::NotEligible { respawn_at: 160 }
        );

        assert!(loots.tick(159, &mut world).is_empty());
        assert_eq!(loots.tick(161, &mut world), vec![chest()]);
        assert_eq!(world.restored, vec![chest()]);
        assert!(loots.chest(&chest()).is_none());

        let again = loot_at(&mut loots, &mut world, &alice(), 162);
        assert_eq!(again.items().len(), 1);
    }

    #[test]
    fn longest_delay_wins() {
        let (mut loots, mut world) = linked(vec![
            table("A", true, true, ResetDelay::Seconds(10)),
            table("B", true, true, ResetDelay::Seconds(30)),
            table("C", true, true, ResetDelay::Seconds(5)),
        ]);
        let outcome = loot_at(&mut loots, &mut world, &alice(), 0);
        let LootOutcome::Looted { bundles, disposition } = outcome else {
            panic!("expected loot");
        };
        let names: Vec<&str> = bundles.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
        assert_eq!(disposition, Disposition::Broken { respawn_at: 30 });

        assert!(loots.tick(29, &mut world).is_empty());
        assert_eq!(loots.tick(30, &mut world), vec![chest()]);
    }

    #[test]
    fn non_breaking_table_keeps_container() {
        let (mut loots, mut world) = linked(vec![
            table("Breaks", true, true, ResetDelay::Seconds(10)),
            table("Stays", true, false, ResetDelay::Seconds(10)),
        ]);
        let outcome = loot_at(&mut loots, &mut world, &alice(), 0);
        assert!(matches!(
            outcome,
            LootOutcome::Looted {
                disposition: Disposition::Intact { cancelled: false },
                ..
            }
        ));
        assert!(world.destroyed.is_empty());
        assert!(loots.pending_respawns().is_empty());
    }

    #[test]
    fn cooldown_table_prevents_break() {
        let fast = table("Fast", true, true, ResetDelay::Seconds(0));
        let slow = table("Slow", true, true, ResetDelay::Seconds(1000));
        let mut state = ChestState::new();
        state.record_roll(&slow, &alice(), 0);

        let mut loots = PhatLoots::default();
        loots.apply_snapshot(Snapshot {
            tables: vec![fast, slow],
            links: vec![crate::link::LinkEntry {
                location: chest(),
                tables: vec!["fast".into(), "slow".into()],
            }],
            chests: vec![ChestEntry {
                location: chest(),
                state,
            }],
        });
        let mut world = MockWorld::default();

        let outcome = loot_at(&mut loots, &mut world, &bob(), 1);
        let LootOutcome::Looted { bundles, disposition } = outcome else {
            panic!("expected loot");
        };
        assert_eq!(bundles.len(), 1);
        assert_eq!(bundles[0].0, "Fast");
        assert_eq!(disposition, Disposition::Intact { cancelled: false });
        assert!(world.destroyed.is_empty());
    }

    #[test]
    fn missing_container_loses_its_links() {
        let (mut loots, mut world) =
            linked(vec![table("Gold", true, false, ResetDelay::Seconds(60))]);
        loot_at(&mut loots, &mut world, &alice(), 0);
        world.destroyed.push(chest());

        assert_eq!(loot_at(&mut loots, &mut world, &bob(), 100), LootOutcome::NotLinked);
        assert!(!loots.is_linked(&chest()));
        assert!(loots.chest(&chest()).is_none());
    }

    #[test]
    fn respawn_of_standing_container_only_resets_state() {
        let gold = table("Gold", true, true, ResetDelay::Seconds(60));
        let mut state = ChestState::new();
        state.break_until(60);

        let mut loots = PhatLoots::default();
        loots.apply_snapshot(Snapshot {
            tables: vec![gold],
            links: vec![crate::link::LinkEntry {
                location: chest(),
                tables: vec!["gold".into()],
            }],
            chests: vec![ChestEntry {
                location: chest(),
                state,
            }],
        });
        let mut world = MockWorld::default();

        assert_eq!(loots.tick(60, &mut world), vec![chest()]);
        assert!(world.restored.is_empty());
        assert!(loots.chest(&chest()).is_none());
        assert_eq!(loot_at(&mut loots, &mut world, &alice(), 61).items().len(), 1);
    }

    #[test]
    fn every_table_cooling_down_yields_nothing() {
        let (mut loots, mut world) =
            linked(vec![table("Gold", true, false, ResetDelay::Seconds(60))]);
        loot_at(&mut loots, &mut world, &alice(), 0);
        let outcome = loot_at(&mut loots, &mut world, &bob(), 30);
        assert!(outcome.looted());
        assert!(outcome.items().is_empty());
        assert_eq!(
            loots.time_remaining(&chest(), "gold", &bob(), 30),
            Cooldown::Until(60)
        );
    }

    #[test]
    fn per_player_tables_are_independent() {
        let (mut loots, mut world) =
            linked(vec![table("Daily", false, false, ResetDelay::Seconds(86_400))]);
        assert_eq!(loot_at(&mut loots, &mut world, &alice(), 0).items().len(), 1);
        assert!(loot_at(&mut loots, &mut world, &alice(), 10).items().is_empty());
        assert_eq!(loot_at(&mut loots, &mut world, &bob(), 10).items().len(), 1);
        assert_eq!(loot_at(&mut loots, &mut world, &alice(), 86_400).items().len(), 1);
    }

    #[test]
    fn never_delay_destroys_for_good() {
        let (mut loots, mut world) = linked(vec![table("Once", true, true, ResetDelay::Never)]);
        let outcome = loot_at(&mut loots, &mut world, &alice(), 0);
        assert!(matches!(
            outcome,
            LootOutcome::Looted {
                disposition: Disposition::Destroyed,
                ..
            }
        ));
        assert!(!loots.is_linked(&chest()));
        assert!(loots.chest(&chest()).is_none());
        assert!(loots.pending_respawns().is_empty());
        assert_eq!(world.destroyed, vec![chest()]);
    }

    #[test]
    fn auto_spill_only_rolls_breaking_tables() {
        let (mut loots, mut world) = linked(vec![
            table("Stays", true, false, ResetDelay::Seconds(0)),
            table("Breaks", true, true, ResetDelay::Seconds(10)),
        ]);
        let mut observer = ();
        let mut ctx = LootContext {
            world: &mut world,
            gate: &OpenRegions,
            observer: &mut observer,
        };
        let outcome = loots.loot(&mut ctx, &chest(), &alice(), true, 0, &mut rng());
        let LootOutcome::Looted { bundles, disposition } = outcome else {
            panic!("expected loot");
        };
        assert_eq!(bundles.len(), 1);
        assert_eq!(bundles[0].0, "Breaks");
        assert_eq!(disposition, Disposition::Broken { respawn_at: 10 });
    }

    #[test]
    fn open_event_only_with_view() {
        let (mut loots, mut world) =
            linked(vec![table("Gold", false, false, ResetDelay::Seconds(0))]);
        let mut observer = CountingObserver {
            cancel: true,
            ..Default::default()
        };

        let mut ctx = LootContext {
            world: &mut world,
            gate: &OpenRegions,
            observer: &mut observer,
        };
        loots.loot(&mut ctx, &chest(), &alice(), false, 0, &mut rng());
        assert_eq!(observer.opened, 0);

        world.viewing.insert(alice().uuid);
        let mut ctx = LootContext {
            world: &mut world,
            gate: &OpenRegions,
            observer: &mut observer,
        };
        let outcome = loots.loot(&mut ctx, &chest(), &alice(), false, 1, &mut rng());
        assert!(matches!(
            outcome,
            LootOutcome::Looted {
                disposition: Disposition::Intact { cancelled: true },
                ..
            }
        ));
        assert_eq!(observer.opened, 1);
        assert_eq!(world.closed, vec!["uuid-alice"]);
    }

    // ─── Items ───────────────────────────────────────────────────────────────

    #[test]
    fn item_links_resolve_to_tables() {
        let mut loots = PhatLoots::default();
        loots
            .add_table(table("Bag", false, false, ResetDelay::Seconds(0)))
            .unwrap();
        let mut item = ItemStack::new("minecraft:bundle", 1);
        assert!(!loots.link_item(&mut item, "missing"));
        assert!(loots.link_item_with(&mut item, "bag", LinkEncoding::TextLine));
        assert_eq!(loots.item_table(&item).map(LootTable::name), Some("Bag"));

        let bundle = loots.open_item(&item, &mut StdRng::seed_from_u64(7));
        assert_eq!(bundle.map(|b| b.len()), Some(1));
        assert!(loots.open_item(&ItemStack::new("minecraft:stone", 1), &mut rng()).is_none());
    }

    // ─── Persistence ─────────────────────────────────────────────────────────

    #[test]
    fn reload_restores_state_and_respawns() {
        let (mut loots, mut world) =
            linked(vec![table("Gold", true, true, ResetDelay::Seconds(60))]);
        loot_at(&mut loots, &mut world, &alice(), 0);
        let storage = MemoryStorage::default();
        loots.save_all(&storage).unwrap();

        let mut reloaded = PhatLoots::load(LinkCodec::default(), &storage).unwrap();
        assert_eq!(reloaded.snapshot(), loots.snapshot());
        assert_eq!(reloaded.pending_respawns(), vec![(chest(), 60)]);
        assert_eq!(reloaded.tick(60, &mut world), vec![chest()]);
    }

    #[test]
    fn save_location_writes_only_that_location() {
        let mut loots = PhatLoots::default();
        let mut world = MockWorld::default();
        loots
            .add_table(table("Gold", true, false, ResetDelay::Seconds(60)))
            .unwrap();
        let locations: Vec<BlockLocation> =
            (0..1000).map(|x| BlockLocation::new("world", x, 64, 0)).collect();
        for location in &locations {
            loots.link_location(&world, location, "Gold");
            let mut observer = ();
            let mut ctx = LootContext {
                world: &mut world,
                gate: &OpenRegions,
                observer: &mut observer,
            };
            loots.loot(&mut ctx, location, &alice(), false, 0, &mut rng());
        }

        let storage = MemoryStorage::default();
        loots.save_location(&storage, &locations[7]).unwrap();
        let stored = storage.contents().unwrap();
        assert_eq!(stored.links.len(), 1);
        assert_eq!(stored.chests.len(), 1);
        assert_eq!(stored.chests[0].location, locations[7]);
        assert_eq!(stored.links[0].tables, vec!["gold"]);

        loots.unlink_location(&locations[7], "Gold");
        loots.save_location(&storage, &locations[7]).unwrap();
        let stored = storage.contents().unwrap();
        assert!(stored.links.is_empty());
        assert!(stored.chests.is_empty());
    }

    #[test]
    fn save_location_tracks_break_and_respawn() {
        let (mut loots, mut world) =
            linked(vec![table("Gold", true, true, ResetDelay::Seconds(60))]);
        let storage = MemoryStorage::default();

        loot_at(&mut loots, &mut world, &alice(), 0);
        loots.save_location(&storage, &chest()).unwrap();
        assert_eq!(storage.contents().unwrap().chests[0].state.respawn_at(), Some(60));

        for location in loots.tick(60, &mut world) {
            loots.save_location(&storage, &location).unwrap();
        }
        let stored = storage.contents().unwrap();
        assert!(stored.chests.is_empty());
        assert_eq!(stored.links.len(), 1);
    }

    #[test]
    fn reload_drops_invalid_tables_and_dangling_links() {
        let storage = MemoryStorage::new(Snapshot {
            tables: vec![
                table("Good", true, false, ResetDelay::Seconds(0)),
                table("Bad", false, true, ResetDelay::Seconds(0)),
            ],
            links: vec![crate::link::LinkEntry {
                location: chest(),
                tables: vec!["good".into(), "bad".into(), "ghost".into()],
            }],
            chests: Vec::new(),
        });
        let loots = PhatLoots::load(LinkCodec::default(), &storage).unwrap();
        assert_eq!(loots.tables().len(), 1);
        let linked = loots.linked_tables(&chest());
        let names: Vec<&str> = linked.iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["Good"]);
    }

    #[test]
    fn reload_discards_unsaved_changes() {
        let storage = MemoryStorage::default();
        let mut loots = PhatLoots::default();
        loots
            .add_table(table("Temp", true, false, ResetDelay::Seconds(0)))
            .unwrap();
        loots.reload(&storage).unwrap();
        assert!(loots.tables().is_empty());
    }
}
