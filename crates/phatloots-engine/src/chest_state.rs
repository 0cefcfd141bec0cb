//! Per-container loot state: who rolled which table when, and whether the
//! container is broken and waiting to respawn.

use std::collections::BTreeMap;

use phatloots_api::LootActor;
use phatloots_loot::LootTable;
use serde::{Deserialize, Serialize};

/// Last roll of one table at one container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum RollRecord {
    Global { at: u64 },
    PerActor { at: BTreeMap<String, u64> },
}

/// When a table becomes lootable again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cooldown {
    Ready,
    Until(u64),
    Forever,
}

impl Cooldown {
    /// Seconds left at `now`. `None` for a one-time table already looted.
    pub fn seconds_left(&self, now: u64) -> Option<u64> {
        match self {
            Cooldown::Ready => Some(0),
            Cooldown::Until(at) => Some(at.saturating_sub(now)),
            Cooldown::Forever => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChestState {
    /// Respawn time while broken.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    broken_until: Option<u64>,
    /// Keyed by table key.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    rolls: BTreeMap<String, RollRecord>,
}

impl ChestState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_broken(&self) -> bool {
        self.broken_until.is_some()
    }

    pub fn respawn_at(&self) -> Option<u64> {
        self.broken_until
    }

    /// No roll history and not broken.
    pub fn is_fresh(&self) -> bool {
        self.broken_until.is_none() && self.rolls.is_empty()
    }

    /// When `actor` last rolled `table` here.
    ///
    /// A record whose scope no longer matches the table's `global` flag is
    /// ignored.
    pub fn last_roll(&self, table: &LootTable, actor: &LootActor) -> Option<u64> {
        match (self.rolls.get(&table.key())?, table.global) {
            (RollRecord::Global { at }, true) => Some(*at),
            (RollRecord::PerActor { at }, false) => at.get(&actor.uuid).copied(),
            _ => None,
        }
    }

    pub fn is_eligible(&self, table: &LootTable, actor: &LootActor, now: u64) -> bool {
        self.cooldown(table, actor, now) == Cooldown::Ready
    }

    pub fn cooldown(&self, table: &LootTable, actor: &LootActor, now: u64) -> Cooldown {
        if let Some(due) = self.broken_until {
            return Cooldown::Until(due);
        }
        let Some(last) = self.last_roll(table, actor) else {
            return Cooldown::Ready;
        };
        if table.reset_delay.has_elapsed(last, now) {
            return Cooldown::Ready;
        }
        match table.reset_delay.expires_at(last) {
            Some(at) => Cooldown::Until(at),
            None => Cooldown::Forever,
        }
    }

    /// Record a roll. Empty bundles count: the cooldown is consumed either way.
    pub fn record_roll(&mut self, table: &LootTable, actor: &LootActor, now: u64) {
        let key = table.key();
        if table.global {
            self.rolls.insert(key, RollRecord::Global { at: now });
            return;
        }
        let record = self
            .rolls
            .entry(key)
            .or_insert_with(|| RollRecord::PerActor { at: BTreeMap::new() });
        match record {
            RollRecord::PerActor { at } => {
                at.insert(actor.uuid.clone(), now);
            }
            RollRecord::Global { .. } => {
                *record = RollRecord::PerActor {
                    at: BTreeMap::from([(actor.uuid.clone(), now)]),
                };
            }
        }
    }

    /// Mark broken until `due`, keeping the later time if already broken.
    /// Roll history is dropped. Returns the effective respawn time.
    pub fn break_until(&mut self, due: u64) -> u64 {
        let due = self.broken_until.map_or(due, |current| current.max(due));
        self.broken_until = Some(due);
        self.rolls.clear();
        due
    }

    /// Forget roll history for one table.
    pub fn forget_table(&mut self, table_key: &str) {
        self.rolls.remove(table_key);
    }
}
