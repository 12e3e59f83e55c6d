use std::env;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::rules::{RuleError, RuleSpec};

/// Grace period between posting a notice and checking acknowledgements.
pub const DEFAULT_GRACE_PERIOD_SECONDS: u64 = 24 * 60 * 60;

pub const DEFAULT_API_BASE_URL: &str = "https://discord.com/api/v10";

#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub guild_id: u64,
    pub rules_path: String,
    pub grace_period_seconds: u64,
    pub api_base_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let bot_token = env::var("DISCORD_TOKEN").map_err(|_| "DISCORD_TOKEN is required")?;

        let guild_id = env::var("GUILD_ID")
            .map_err(|_| "GUILD_ID is required")?
            .parse::<u64>()
            .map_err(|_| "GUILD_ID must be a valid id")?;

        let rules_path = env::var("RULES_FILE").map_err(|_| "RULES_FILE is required")?;

        let grace_period_seconds = match env::var("GRACE_PERIOD_SECONDS") {
            Ok(raw) => raw
                .parse::<u64>()
                .map_err(|_| "GRACE_PERIOD_SECONDS must be a valid number")?,
            Err(_) => DEFAULT_GRACE_PERIOD_SECONDS,
        };

        let api_base_url =
            env::var("DISCORD_API_URL").unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_string());

        Ok(Self {
            bot_token,
            guild_id,
            rules_path,
            grace_period_seconds,
            api_base_url,
        })
    }
}

/// Errors loading or validating the rule file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read rule file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse rule file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Rule(#[from] RuleError),
}

/// On-disk rule file: the ordered rule list plus the reply-message pool
/// used by the reactive acknowledgement feature.
#[derive(Debug, Deserialize)]
pub struct RuleFile {
    pub rules: Vec<RuleSpec>,
    #[serde(default)]
    pub reply_messages: Vec<String>,
}

pub fn load_rule_file(path: &Path) -> Result<RuleFile, ConfigError> {
    parse_rule_file(&fs::read_to_string(path)?)
}

pub fn parse_rule_file(contents: &str) -> Result<RuleFile, ConfigError> {
    Ok(serde_json::from_str(contents)?)
}
