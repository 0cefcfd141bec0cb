//! Item links: storing a loot table name on an item.
//!
//! Two encodings exist side by side. `Structured` writes a hidden metadata
//! tag; `TextLine` appends a marked line to the visible lore. Decoding looks
//! for either, so old text-line items keep working after a switch to tags.

use phatloots_api::ItemStack;
use serde::{Deserialize, Serialize};

pub const DEFAULT_TAG_KEY: &str = "phatloots:link";
pub const DEFAULT_LOOT_BAG_KEY: &str = "Loot Bag: ";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkEncoding {
    #[default]
    Structured,
    TextLine,
}

/// The `[links]` configuration section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Encoding used for new links.
    #[serde(default)]
    pub encoding: LinkEncoding,
    /// Text-line markers. The first is written; all are recognised.
    #[serde(default = "default_loot_bag_keys")]
    pub loot_bag_keys: Vec<String>,
    /// Metadata key of the structured encoding.
    #[serde(default = "default_tag_key")]
    pub tag_key: String,
}

fn default_loot_bag_keys() -> Vec<String> {
    vec![DEFAULT_LOOT_BAG_KEY.into()]
}

fn default_tag_key() -> String {
    DEFAULT_TAG_KEY.into()
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            encoding: LinkEncoding::default(),
            loot_bag_keys: default_loot_bag_keys(),
            tag_key: default_tag_key(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LinkCodec {
    config: LinkConfig,
}

impl LinkCodec {
    pub fn new(config: LinkConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Link with the configured default encoding.
    pub fn link(&self, item: &mut ItemStack, table: &str) {
        self.encode(item, table, self.config.encoding);
    }

    pub fn encode(&self, item: &mut ItemStack, table: &str, mode: LinkEncoding) {
        let meta = item.meta_mut();
        match mode {
            LinkEncoding::Structured => {
                meta.tags.insert(self.config.tag_key.clone(), table.to_string());
            }
            LinkEncoding::TextLine => {
                meta.lore.push(format!("{}{table}", self.marker()));
            }
        }
    }

    /// The linked table name, if any. Items without metadata have no link.
    pub fn decode(&self, item: &ItemStack) -> Option<String> {
        let meta = item.meta.as_ref()?;
        if let Some(name) = meta.tags.get(&self.config.tag_key) {
            return Some(name.clone());
        }
        meta.lore.iter().find_map(|line| {
            self.config
                .loot_bag_keys
                .iter()
                .filter(|key| !key.is_empty())
                .find_map(|key| line.strip_prefix(key.as_str()))
                .filter(|name| !name.is_empty())
                .map(str::to_string)
        })
    }

    /// Which encoding an item's link uses.
    pub fn encoding_of(&self, item: &ItemStack) -> Option<LinkEncoding> {
        let meta = item.meta.as_ref()?;
        if meta.tags.contains_key(&self.config.tag_key) {
            Some(LinkEncoding::Structured)
        } else if self.decode(item).is_some() {
            Some(LinkEncoding::TextLine)
        } else {
            None
        }
    }

    /// Strip both encodings, leaving unrelated lore lines alone.
    pub fn unlink(&self, item: &mut ItemStack) -> bool {
        let Some(meta) = item.meta.as_mut() else {
            return false;
        };
        let mut removed = meta.tags.remove(&self.config.tag_key).is_some();
        let keys = &self.config.loot_bag_keys;
        let before = meta.lore.len();
        meta.lore.retain(|line| {
            !keys
                .iter()
                .any(|key| !key.is_empty() && line.starts_with(key.as_str()))
        });
        removed |= meta.lore.len() != before;
        removed
    }

    fn marker(&self) -> &str {
        self.config
            .loot_bag_keys
            .first()
            .map(String::as_str)
            .unwrap_or(DEFAULT_LOOT_BAG_KEY)
    }
}
