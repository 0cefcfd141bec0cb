//! Headless host: no block data, only the container presence and open
//! container views the engine needs to track.

use std::collections::HashSet;

use phatloots_api::{
    BlockLocation, ChestObserver, ChestOpenEvent, EventResult, LootActor, WorldAccess,
};
use tracing::{debug, info};

/// Every location is a container until the engine destroys it.
#[derive(Debug, Default)]
pub struct HeadlessWorld {
    destroyed: HashSet<BlockLocation>,
    /// Actor ids with a container view open.
    viewers: HashSet<String>,
}

impl HeadlessWorld {
    /// Start with these containers already broken, e.g. after a restart.
    pub fn with_destroyed(locations: impl IntoIterator<Item = BlockLocation>) -> Self {
        Self {
            destroyed: locations.into_iter().collect(),
            viewers: HashSet::new(),
        }
    }

    /// Open a container view for `actor`, as a client does when looting.
    pub fn open_view(&mut self, actor: &LootActor) {
        self.viewers.insert(actor.uuid.clone());
    }

    pub fn destroyed_count(&self) -> usize {
        self.destroyed.len()
    }
}

impl WorldAccess for HeadlessWorld {
    fn is_linkable_container(&self, location: &BlockLocation) -> bool {
        !self.destroyed.contains(location)
    }

    fn container_exists(&self, location: &BlockLocation) -> bool {
        !self.destroyed.contains(location)
    }

    fn destroy_container(&mut self, location: &BlockLocation) {
        debug!("Destroying container at {location}");
        self.destroyed.insert(location.clone());
    }

    fn restore_container(&mut self, location: &BlockLocation) {
        debug!("Restoring container at {location}");
        self.destroyed.remove(location);
    }

    fn has_container_view(&self, actor: &LootActor) -> bool {
        self.viewers.contains(&actor.uuid)
    }

    fn close_container_view(&mut self, actor: &LootActor) {
        if self.viewers.remove(&actor.uuid) {
            debug!("Closed container view of {}", actor.name);
        }
    }
}

/// Logs every container opening and never cancels.
#[derive(Debug, Default)]
pub struct LoggingObserver {
    /// Openings seen since start.
    pub opened: u64,
}

impl ChestObserver for LoggingObserver {
    fn on_chest_open(&mut self, event: &ChestOpenEvent<'_>) -> EventResult {
        self.opened += 1;
        info!(
            "{} opened {} ({} opening(s) so far)",
            event.actor.name, event.location, self.opened
        );
        EventResult::Continue
    }
}
