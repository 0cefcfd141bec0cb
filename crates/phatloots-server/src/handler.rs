//! Owns the loot engine and everything it mutates. Driven by one task, so
//! every roll and break decision happens in order.

use phatloots_api::{BlockLocation, OpenRegions, WorldAccess};
use phatloots_engine::{
    Disposition, LinkResult, LootContext, LootOutcome, LootStorage, PhatLoots,
};
use rand::rngs::StdRng;
use tracing::{info, warn};

use crate::console::{self, CommandResult};
use crate::world::{HeadlessWorld, LoggingObserver};

pub struct LootHandler<S: LootStorage> {
    loots: PhatLoots,
    storage: S,
    world: HeadlessWorld,
    observer: LoggingObserver,
    rng: StdRng,
}

impl<S: LootStorage> LootHandler<S> {
    pub fn new(loots: PhatLoots, storage: S, rng: StdRng) -> Self {
        let world = HeadlessWorld::with_destroyed(
            loots.pending_respawns().into_iter().map(|(location, _)| location),
        );
        if world.destroyed_count() > 0 {
            info!("{} container(s) awaiting respawn", world.destroyed_count());
        }
        Self {
            loots,
            storage,
            world,
            observer: LoggingObserver::default(),
            rng,
        }
    }

    /// Restore containers due by `now`.
    pub fn respawn_tick(&mut self, now: u64) -> usize {
        let restored = self.loots.tick(now, &mut self.world);
        for location in &restored {
            self.save_location(location);
        }
        restored.len()
    }

    /// Write everything to storage. Called on `save` and at shutdown.
    pub fn save_all(&self) {
        if let Err(e) = self.loots.save_all(&self.storage) {
            warn!("Failed to save loot data: {e}");
        }
    }

    fn save_location(&self, location: &BlockLocation) {
        if let Err(e) = self.loots.save_location(&self.storage, location) {
            warn!("Failed to save {location}: {e}");
        }
    }

    pub fn handle_console_command(&mut self, line: &str, now: u64) -> CommandResult {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some((&name, args)) = parts.split_first() else {
            return CommandResult::err("Empty command");
        };
        let result = match name.to_lowercase().as_str() {
            "help" => console::help(),
            "list" => self.cmd_list(),
            "info" => self.cmd_info(args),
            "roll" => self.cmd_roll(args),
            "remove" => self.cmd_remove(args),
            "link" => self.cmd_link(args),
            "unlink" => self.cmd_unlink(args),
            "loot" => self.cmd_loot(args, now),
            "links" => self.cmd_links(),
            "reload" => self.cmd_reload(),
            "save" => {
                self.save_all();
                CommandResult::ok("Saved all loot data")
            }
            "stop" => CommandResult::stop(),
            other => CommandResult::err(format!(
                "Unknown command: {other}. Type help for a list of commands."
            )),
        };
        for message in &result.messages {
            info!("{message}");
        }
        result
    }

    // ─── Commands ────────────────────────────────────────────────────────────

    fn cmd_list(&self) -> CommandResult {
        let tables = self.loots.tables();
        if tables.is_empty() {
            return CommandResult::ok("No loot tables loaded");
        }
        let names: Vec<&str> = tables.iter().map(|t| t.name()).collect();
        CommandResult::ok(format!(
            "{} loot table(s): {}",
            names.len(),
            names.join(", ")
        ))
    }

    fn cmd_info(&self, args: &[&str]) -> CommandResult {
        let [name] = args else {
            return console::usage("info");
        };
        let Some(table) = self.loots.table(name) else {
            return CommandResult::err(format!("Unknown loot table: {name}"));
        };
        let (min, max) = table.rolls.bounds();
        CommandResult::lines(vec![
            format!("Loot table {}", table.name()),
            format!("  entries: {}", table.entries.len()),
            format!("  rolls: {min}..={max}"),
            format!("  global: {}", table.global),
            format!("  break and respawn: {}", table.break_and_respawn),
            format!("  reset delay: {}", console::describe_delay(table.reset_delay)),
            format!(
                "  linked containers: {}",
                self.loots.locations_linked_to(name).len()
            ),
        ])
    }

    fn cmd_roll(&mut self, args: &[&str]) -> CommandResult {
        let [name] = args else {
            return console::usage("roll");
        };
        if self.loots.table(name).is_none() {
            return CommandResult::err(format!("Unknown loot table: {name}"));
        }
        let bundle = self.loots.roll_for_loot(name, &mut self.rng);
        CommandResult::ok(format!(
            "Rolled {name}: {}",
            console::describe_items(bundle.items())
        ))
    }

    fn cmd_remove(&mut self, args: &[&str]) -> CommandResult {
        let [name] = args else {
            return console::usage("remove");
        };
        match self.loots.delete_table(name, &self.storage) {
            Ok(Some(table)) => CommandResult::ok(format!("Removed loot table {}", table.name())),
            Ok(None) => CommandResult::err(format!("Unknown loot table: {name}")),
            Err(e) => CommandResult::err(format!("Failed to remove {name}: {e}")),
        }
    }

    fn cmd_link(&mut self, args: &[&str]) -> CommandResult {
        let (Some(location), [_, _, _, _, name]) = (console::parse_location(args), args) else {
            return console::usage("link");
        };
        match self.loots.link_location(&self.world, &location, name) {
            LinkResult::Linked => {
                self.save_location(&location);
                CommandResult::ok(format!("Linked {location} to {name}"))
            }
            LinkResult::AlreadyLinked => {
                CommandResult::err(format!("{location} is already linked to {name}"))
            }
            LinkResult::UnknownTable => CommandResult::err(format!("Unknown loot table: {name}")),
            LinkResult::NotAContainer => {
                CommandResult::err(format!("{location} is not a container"))
            }
        }
    }

    fn cmd_unlink(&mut self, args: &[&str]) -> CommandResult {
        let Some(location) = console::parse_location(args) else {
            return console::usage("unlink");
        };
        let result = match &args[4..] {
            [] => {
                let removed = self.loots.unlink_all(&location);
                if removed.is_empty() {
                    return CommandResult::err(format!("{location} is not linked"));
                }
                CommandResult::ok(format!("Unlinked {location} from {}", removed.join(", ")))
            }
            [name] => {
                if !self.loots.unlink_location(&location, name) {
                    return CommandResult::err(format!("{location} is not linked to {name}"));
                }
                CommandResult::ok(format!("Unlinked {location} from {name}"))
            }
            _ => return console::usage("unlink"),
        };
        self.save_location(&location);
        result
    }

    fn cmd_loot(&mut self, args: &[&str], now: u64) -> CommandResult {
        let Some(location) = console::parse_location(args) else {
            return console::usage("loot");
        };
        let (player, auto_spill) = match &args[4..] {
            [player] => (*player, false),
            [player, "spill"] => (*player, true),
            _ => return console::usage("loot"),
        };
        let actor = console::console_actor(player);
        let was_linked = self.loots.is_linked(&location);

        self.world.open_view(&actor);
        let mut ctx = LootContext {
            world: &mut self.world,
            gate: &OpenRegions,
            observer: &mut self.observer,
        };
        let outcome = self
            .loots
            .loot(&mut ctx, &location, &actor, auto_spill, now, &mut self.rng);
        self.world.close_container_view(&actor);

        match outcome {
            LootOutcome::NotLinked => {
                if was_linked {
                    self.save_location(&location);
                }
                CommandResult::err(format!("{location} is not linked"))
            }
            LootOutcome::Denied => CommandResult::err(format!("{player} may not loot {location}")),
            LootOutcome::NotEligible { respawn_at } => CommandResult::err(format!(
                "{location} is broken, respawns in {}s",
                respawn_at.saturating_sub(now)
            )),
            LootOutcome::Looted {
                bundles,
                disposition,
            } => {
                self.save_location(&location);
                let mut lines = vec![format!("{player} looted {location}")];
                if bundles.is_empty() {
                    lines.push("  nothing to loot yet".into());
                }
                for (table, bundle) in &bundles {
                    lines.push(format!(
                        "  {table}: {}",
                        console::describe_items(bundle.items())
                    ));
                }
                match disposition {
                    Disposition::Intact { .. } => {}
                    Disposition::Broken { respawn_at } => lines.push(format!(
                        "  container broke, respawns in {}s",
                        respawn_at.saturating_sub(now)
                    )),
                    Disposition::Destroyed => lines.push("  container broke for good".into()),
                }
                CommandResult::lines(lines)
            }
        }
    }

    fn cmd_links(&self) -> CommandResult {
        let locations = self.loots.linked_locations();
        if locations.is_empty() {
            return CommandResult::ok("No linked containers");
        }
        let mut lines = vec![format!("{} linked container(s):", locations.len())];
        for location in locations {
            let names: Vec<&str> = self
                .loots
                .linked_tables(location)
                .into_iter()
                .map(|t| t.name())
                .collect();
            lines.push(format!("  {location}: {}", names.join(", ")));
        }
        CommandResult::lines(lines)
    }

    fn cmd_reload(&mut self) -> CommandResult {
        match self.loots.reload(&self.storage) {
            Ok(()) => {
                self.world = HeadlessWorld::with_destroyed(
                    self.loots
                        .pending_respawns()
                        .into_iter()
                        .map(|(location, _)| location),
                );
                CommandResult::ok(format!(
                    "Reloaded {} loot table(s)",
                    self.loots.tables().len()
                ))
            }
            Err(e) => CommandResult::err(format!("Reload failed: {e}")),
        }
    }
}
