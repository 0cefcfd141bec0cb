//! Console command parsing and results.

use phatloots_api::{BlockLocation, ItemStack, LootActor};
use phatloots_loot::ResetDelay;

/// Result returned by a console command.
#[derive(Debug)]
pub struct CommandResult {
    /// Whether the command executed successfully.
    pub success: bool,
    /// Lines to print back to the console.
    pub messages: Vec<String>,
    /// If true, the server should shut down.
    pub should_stop: bool,
}

impl CommandResult {
    /// Create a successful result with a single message.
    pub fn ok(message: impl Into<String>) -> Self {
        Self::lines(vec![message.into()])
    }

    /// Create a successful result with several lines.
    pub fn lines(messages: Vec<String>) -> Self {
        Self {
            success: true,
            messages,
            should_stop: false,
        }
    }

    /// Create a failed result with a single message.
    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            messages: vec![message.into()],
            should_stop: false,
        }
    }

    pub fn stop() -> Self {
        Self {
            success: true,
            messages: vec!["Stopping...".to_string()],
            should_stop: true,
        }
    }
}

/// Name, usage and description of every console command.
pub const COMMANDS: &[(&str, &str, &str)] = &[
    ("help", "help", "List available commands"),
    ("list", "list", "List loot tables"),
    ("info", "info <table>", "Show a loot table"),
    ("roll", "roll <table>", "Roll a loot table once"),
    ("remove", "remove <table>", "Delete a loot table and its links"),
    (
        "link",
        "link <world> <x> <y> <z> <table>",
        "Link a container to a loot table",
    ),
    (
        "unlink",
        "unlink <world> <x> <y> <z> [table]",
        "Unlink one or all tables from a container",
    ),
    (
        "loot",
        "loot <world> <x> <y> <z> <player> [spill]",
        "Loot a container as a player",
    ),
    ("links", "links", "List linked containers"),
    ("reload", "reload", "Reload all data from disk"),
    ("save", "save", "Save all data to disk"),
    ("stop", "stop", "Save and stop"),
];

pub fn usage(name: &str) -> CommandResult {
    let usage = COMMANDS
        .iter()
        .find(|(n, _, _)| *n == name)
        .map(|(_, u, _)| *u)
        .unwrap_or(name);
    CommandResult::err(format!("Usage: {usage}"))
}

pub fn help() -> CommandResult {
    let mut lines = vec!["Available commands:".to_string()];
    for (_, usage, description) in COMMANDS {
        lines.push(format!("  {usage} - {description}"));
    }
    CommandResult::lines(lines)
}

/// Parse `<world> <x> <y> <z>` from the start of `args`.
pub fn parse_location(args: &[&str]) -> Option<BlockLocation> {
    let [world, x, y, z, ..] = args else {
        return None;
    };
    Some(BlockLocation::new(
        *world,
        x.parse().ok()?,
        y.parse().ok()?,
        z.parse().ok()?,
    ))
}

/// Console-driven players are identified by their lowercased name.
pub fn console_actor(name: &str) -> LootActor {
    LootActor::new(name, format!("console:{}", name.to_lowercase()))
}

pub fn describe_delay(delay: ResetDelay) -> String {
    match delay {
        ResetDelay::Seconds(0) => "none".into(),
        ResetDelay::Seconds(secs) => format!("{secs}s"),
        ResetDelay::Never => "never".into(),
    }
}

pub fn describe_items<'a>(items: impl IntoIterator<Item = &'a ItemStack>) -> String {
    let parts: Vec<String> = items
        .into_iter()
        .map(|item| format!("{}x {}", item.count, item.id))
        .collect();
    if parts.is_empty() {
        "nothing".into()
    } else {
        parts.join(", ")
    }
}
