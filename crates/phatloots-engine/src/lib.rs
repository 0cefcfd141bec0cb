//! Container looting engine: links, cooldowns, break-and-respawn.
//!
//! [`PhatLoots`] owns every loot table, container link and container state.
//! Hosts drive it with [`PhatLoots::loot`] when a player interacts with a
//! container and [`PhatLoots::tick`] on a timer to restore broken ones.

pub mod chest_state;
pub mod error;
pub mod link;
pub mod link_codec;
pub mod repository;
pub mod respawn;
pub mod storage;

pub use chest_state::{ChestState, Cooldown, RollRecord};
pub use error::StorageError;
pub use link::{LinkEntry, LinkRegistry};
pub use link_codec::{LinkCodec, LinkConfig, LinkEncoding};
pub use repository::{Disposition, LinkResult, LootContext, LootOutcome, PhatLoots};
pub use respawn::RespawnScheduler;
pub use storage::{ChestEntry, LootStorage, MemoryStorage, Snapshot};
