//! Roll engine: turns a table definition and an RNG into a loot bundle.
//!
//! Rolling is a pure function of the table and the RNG state. Nothing is
//! remembered between calls, so a seeded or mocked RNG gives exact output.

use phatloots_api::LootBundle;
use rand::Rng;

use crate::loot_table::{LootEntry, LootTable, WeightedEntry};

/// Roll `table` once, evaluating its entry set `rolls` times.
pub fn roll<R: Rng + ?Sized>(table: &LootTable, rng: &mut R) -> LootBundle {
    let mut bundle = LootBundle::new();
    let n = table.rolls.sample(rng);
    for _ in 0..n {
        bundle.merge(roll_entries(&table.entries, rng));
    }
    bundle
}

/// Evaluate every entry once, in order.
fn roll_entries<R: Rng + ?Sized>(entries: &[LootEntry], rng: &mut R) -> LootBundle {
    let mut bundle = LootBundle::new();
    for entry in entries {
        match entry {
            LootEntry::Item(e) => {
                if chance(e.probability, rng) {
                    bundle.push(e.drop.to_stack(rng));
                }
            }
            LootEntry::Group(g) => {
                if let Some(picked) = pick_weighted(&g.entries, rng) {
                    bundle.push(picked.drop.to_stack(rng));
                }
            }
        }
    }
    bundle
}

/// Certain and impossible outcomes consume no randomness.
fn chance<R: Rng + ?Sized>(probability: f64, rng: &mut R) -> bool {
    if probability >= 1.0 {
        true
    } else if probability > 0.0 {
        rng.gen::<f64>() < probability
    } else {
        // Zero, negative, and NaN.
        false
    }
}

/// Select one entry using weighted random selection.
fn pick_weighted<'a, R: Rng + ?Sized>(
    entries: &'a [WeightedEntry],
    rng: &mut R,
) -> Option<&'a WeightedEntry> {
    let total: u64 = entries.iter().map(|e| u64::from(e.weight)).sum();
    if total == 0 {
        return None;
    }

    let mut roll = rng.gen_range(0..total);
    for entry in entries {
        let weight = u64::from(entry.weight);
        if roll < weight {
            return Some(entry);
        }
        roll -= weight;
    }

    None
}
