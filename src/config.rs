//! Configuration loading and management

use anyhow::{bail, Context, Result};

use crate::hotkey::{parse_combination, Key, Modifier};

/// Environment variable holding the hotkey combination
pub const HOTKEY_VAR: &str = "HOTKEY_RELAY_HOTKEY";

/// Environment variable toggling JSON notifications on stdout
pub const JSON_VAR: &str = "HOTKEY_RELAY_JSON";

const DEFAULT_HOTKEY: &str = "ctrl+shift+KeyS";

/// Daemon configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Combination to bind, e.g. `ctrl+shift+KeyS`
    pub hotkey: String,

    /// Write one JSON notification per event to stdout
    pub emit_json: bool,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let hotkey = lookup(HOTKEY_VAR)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_HOTKEY.to_string());

        let emit_json = match lookup(JSON_VAR) {
            None => true,
            Some(value) => parse_flag(&value).with_context(|| format!("invalid {}", JSON_VAR))?,
        };

        Ok(Self { hotkey, emit_json })
    }

    /// Parse the configured combination
    pub fn combination(&self) -> Result<(Vec<Modifier>, Key)> {
        parse_combination(&self.hotkey)
            .with_context(|| format!("invalid {} value {:?}", HOTKEY_VAR, self.hotkey))
    }
}

fn parse_flag(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("expected a boolean, got {:?}", other),
    }
}
