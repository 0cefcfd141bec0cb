//! Respawn queue for broken containers.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use phatloots_api::BlockLocation;

/// A queued respawn. Ordered by due time first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct PendingRespawn {
    due: u64,
    location: BlockLocation,
}

/// Time-ordered queue of pending respawns, at most one per location.
///
/// Rescheduling a location keeps the later due time. Superseded heap entries
/// stay in the heap and are skipped when they surface.
#[derive(Debug, Default)]
pub struct RespawnScheduler {
    queue: BinaryHeap<Reverse<PendingRespawn>>,
    due: HashMap<BlockLocation, u64>,
}

impl RespawnScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `location` to respawn at `due`. Returns the effective due
    /// time, which is the later of `due` and any existing entry.
    pub fn schedule(&mut self, location: &BlockLocation, due: u64) -> u64 {
        if let Some(&current) = self.due.get(location) {
            if current >= due {
                return current;
            }
        }
        self.due.insert(location.clone(), due);
        self.queue.push(Reverse(PendingRespawn {
            due,
            location: location.clone(),
        }));
        due
    }

    /// Drop the pending respawn for `location`.
    pub fn cancel(&mut self, location: &BlockLocation) -> Option<u64> {
        self.due.remove(location)
    }

    pub fn due_at(&self, location: &BlockLocation) -> Option<u64> {
        self.due.get(location).copied()
    }

    /// Remove and return every location due at or before `now`, in
    /// non-decreasing due order.
    pub fn tick(&mut self, now: u64) -> Vec<BlockLocation> {
        let mut ready = Vec::new();
        while let Some(Reverse(next)) = self.queue.peek() {
            if next.due > now {
                break;
            }
            let Some(Reverse(entry)) = self.queue.pop() else {
                break;
            };
            if self.due.get(&entry.location) == Some(&entry.due) {
                self.due.remove(&entry.location);
                ready.push(entry.location);
            }
        }
        ready
    }

    /// Pending respawns sorted by due time.
    pub fn pending(&self) -> Vec<(BlockLocation, u64)> {
        let mut pending: Vec<(BlockLocation, u64)> =
            self.due.iter().map(|(l, d)| (l.clone(), *d)).collect();
        pending.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        pending
    }

    /// Number of pending respawns.
    pub fn len(&self) -> usize {
        self.due.len()
    }

    pub fn is_empty(&self) -> bool {
        self.due.is_empty()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
        self.due.clear();
    }
}
