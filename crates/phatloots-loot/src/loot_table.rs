//! Loot table definition (one JSON document per table).

use phatloots_api::ItemStack;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::TableError;

/// Upper bound on how many times one roll may evaluate a table.
pub const MAX_ROLLS: u32 = 1024;

/// Registry key for a table name. Table names are unique ignoring case.
pub fn table_key(name: &str) -> String {
    name.to_lowercase()
}

/// A named loot table plus the reuse policy of containers linked to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LootTable {
    name: String,
    /// Evaluated in order on every roll.
    #[serde(default)]
    pub entries: Vec<LootEntry>,
    /// How many times the entry set is evaluated per roll.
    #[serde(default)]
    pub rolls: Rolls,
    /// Cooldown is shared by all actors instead of tracked per actor.
    #[serde(default)]
    pub global: bool,
    /// Destroy the container on loot and restore it after the reset delay.
    #[serde(default)]
    pub break_and_respawn: bool,
    #[serde(default)]
    pub reset_delay: ResetDelay,
}

impl LootTable {
    /// An empty per-actor table with no cooldown.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
            rolls: Rolls::default(),
            global: false,
            break_and_respawn: false,
            reset_delay: ResetDelay::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Case-insensitive registry key.
    pub fn key(&self) -> String {
        table_key(&self.name)
    }

    /// Whether looting this table may destroy its container.
    pub fn breaks_container(&self) -> bool {
        self.global && self.break_and_respawn
    }

    /// Check the table for configuration mistakes.
    ///
    /// Zero weights and empty entry lists are not errors; such tables simply
    /// roll nothing.
    pub fn validate(&self) -> Result<(), TableError> {
        if self.name.trim().is_empty() {
            return Err(TableError::EmptyName);
        }
        if !is_valid_name(&self.name) {
            return Err(TableError::InvalidName {
                name: self.name.clone(),
            });
        }
        if self.break_and_respawn && !self.global {
            return Err(TableError::ConflictingFlags {
                table: self.name.clone(),
            });
        }
        let (min, max) = self.rolls.bounds();
        if min > max || max > MAX_ROLLS {
            return Err(TableError::InvalidRolls {
                table: self.name.clone(),
                min,
                max,
            });
        }

        for (index, entry) in self.entries.iter().enumerate() {
            match entry {
                LootEntry::Item(e) => {
                    if !(0.0..=1.0).contains(&e.probability) {
                        return Err(TableError::InvalidProbability {
                            table: self.name.clone(),
                            index,
                            value: e.probability,
                        });
                    }
                    self.check_amount(&e.drop)?;
                }
                LootEntry::Group(g) => {
                    for w in &g.entries {
                        self.check_amount(&w.drop)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn check_amount(&self, drop: &ItemDrop) -> Result<(), TableError> {
        let (min, max) = drop.amount.bounds();
        if min > max {
            return Err(TableError::InvalidAmount {
                table: self.name.clone(),
                item: drop.id.clone(),
                min,
                max,
            });
        }
        Ok(())
    }
}

/// Table names double as file names, so path separators, reserved
/// characters and leading dots are refused.
fn is_valid_name(name: &str) -> bool {
    !name.starts_with('.')
        && !name.chars().any(|c| {
            c.is_control() || matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|')
        })
}

/// One element of a table's ordered entry set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LootEntry {
    /// Dropped independently with its own probability.
    Item(ChanceEntry),
    /// Exactly one member is picked by weight.
    Group(LootGroup),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChanceEntry {
    #[serde(flatten)]
    pub drop: ItemDrop,
    /// Chance in `0.0..=1.0`.
    #[serde(default = "certain")]
    pub probability: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LootGroup {
    pub name: String,
    #[serde(default)]
    pub entries: Vec<WeightedEntry>,
}

impl LootGroup {
    pub fn total_weight(&self) -> u64 {
        self.entries.iter().map(|e| u64::from(e.weight)).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedEntry {
    #[serde(flatten)]
    pub drop: ItemDrop,
    #[serde(default = "default_weight")]
    pub weight: u32,
}

/// The item an entry produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemDrop {
    pub id: String,
    #[serde(default)]
    pub amount: Amount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl ItemDrop {
    pub fn new(id: impl Into<String>, amount: Amount) -> Self {
        Self {
            id: id.into(),
            amount,
            display_name: None,
        }
    }

    /// Build a concrete stack, drawing the amount from `rng`.
    pub fn to_stack<R: Rng + ?Sized>(&self, rng: &mut R) -> ItemStack {
        let mut stack = ItemStack::new(self.id.clone(), self.amount.sample(rng));
        if let Some(name) = &self.display_name {
            stack.meta_mut().display_name = Some(name.clone());
        }
        stack
    }
}

/// Item amount, fixed or a uniform inclusive range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Amount {
    Fixed(u32),
    Range { min: u32, max: u32 },
}

impl Default for Amount {
    fn default() -> Self {
        Amount::Fixed(1)
    }
}

impl Amount {
    pub fn bounds(&self) -> (u32, u32) {
        match *self {
            Amount::Fixed(n) => (n, n),
            Amount::Range { min, max } => (min, max),
        }
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> u32 {
        sample_inclusive(self.bounds(), rng)
    }
}

/// Number of times the entry set is evaluated, fixed or a random range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Rolls {
    Fixed(u32),
    Range { min: u32, max: u32 },
}

impl Default for Rolls {
    fn default() -> Self {
        Rolls::Fixed(1)
    }
}

impl Rolls {
    pub fn bounds(&self) -> (u32, u32) {
        match *self {
            Rolls::Fixed(n) => (n, n),
            Rolls::Range { min, max } => (min, max),
        }
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> u32 {
        sample_inclusive(self.bounds(), rng)
    }
}

/// Uniform pick in `lo..=hi`. A fixed value consumes no randomness and a
/// reversed range is read as its sorted form.
fn sample_inclusive<R: Rng + ?Sized>((a, b): (u32, u32), rng: &mut R) -> u32 {
    let (lo, hi) = (a.min(b), a.max(b));
    if lo == hi {
        lo
    } else {
        rng.gen_range(lo..=hi)
    }
}

/// How long a looted table stays on cooldown, in seconds.
///
/// `Seconds(0)` allows an immediate reroll; `Never` makes the table one-time.
/// The derived ordering places `Never` above every finite delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetDelay {
    Seconds(u64),
    Never,
}

impl Default for ResetDelay {
    fn default() -> Self {
        ResetDelay::Seconds(0)
    }
}

impl ResetDelay {
    /// Whether a roll made at `last` has cooled down by `now`.
    pub fn has_elapsed(&self, last: u64, now: u64) -> bool {
        match *self {
            ResetDelay::Seconds(secs) => now.saturating_sub(last) >= secs,
            ResetDelay::Never => false,
        }
    }

    /// Absolute time the cooldown ends, `None` if it never does.
    pub fn expires_at(&self, last: u64) -> Option<u64> {
        match *self {
            ResetDelay::Seconds(secs) => Some(last.saturating_add(secs)),
            ResetDelay::Never => None,
        }
    }
}

fn certain() -> f64 {
    1.0
}

fn default_weight() -> u32 {
    1
}
