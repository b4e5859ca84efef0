use std::env;
use std::str::FromStr;

use indexer_types::DEFAULT_INTENTS;
use thiserror::Error;

/// The only error permitted to abort the process before any network or
/// store connection opens (§6, §7).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
}

pub type Result<T, E = ConfigError> = core::result::Result<T, E>;

const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";
const DEFAULT_GATEWAY_URL: &str = "wss://gateway.discord.gg/?v=10&encoding=json";
const DEFAULT_MONGODB_URI: &str = "mongodb://localhost:27017";
const DEFAULT_MONGODB_DB: &str = "discord_index";
const DEFAULT_BACKFILL_PAGE_SIZE: u32 = 100;
const DEFAULT_BACKFILL_WORKERS: usize = 2;
const DEFAULT_BACKFILL_REQUEST_DELAY_MS: u64 = 500;
const MIN_BACKFILL_PAGE_SIZE: u32 = 1;
const MAX_BACKFILL_PAGE_SIZE: u32 = 100;

/// The §6 configuration table, read once at startup (§4.F step 1).
#[derive(Debug, Clone)]
pub struct Config {
    pub discord_bot_token: String,
    pub discord_api_base: String,
    pub discord_gateway_url: String,
    pub discord_guild_ids: Vec<String>,
    pub discord_intents: u64,
    pub mongodb_uri: String,
    pub mongodb_db: String,
    pub backfill_page_size: u32,
    pub backfill_workers: usize,
    pub backfill_request_delay_ms: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let discord_bot_token = require("DISCORD_BOT_TOKEN")?;
        let discord_api_base = optional("DISCORD_API_BASE", DEFAULT_API_BASE);
        let discord_gateway_url = optional("DISCORD_GATEWAY_URL", DEFAULT_GATEWAY_URL);
        let discord_guild_ids = parse_guild_ids(&optional("DISCORD_GUILD_IDS", ""));
        let discord_intents = parse_env("DISCORD_INTENTS", DEFAULT_INTENTS)?;
        let mongodb_uri = optional("MONGODB_URI", DEFAULT_MONGODB_URI);
        let mongodb_db = optional("MONGODB_DB", DEFAULT_MONGODB_DB);
        let backfill_page_size = parse_env("INDEXER_BACKFILL_PAGE_SIZE", DEFAULT_BACKFILL_PAGE_SIZE)?
            .clamp(MIN_BACKFILL_PAGE_SIZE, MAX_BACKFILL_PAGE_SIZE);
        let backfill_workers = parse_env("INDEXER_BACKFILL_WORKERS", DEFAULT_BACKFILL_WORKERS)?;
        let backfill_request_delay_ms =
            parse_env("INDEXER_BACKFILL_REQUEST_DELAY_MS", DEFAULT_BACKFILL_REQUEST_DELAY_MS)?;

        Ok(Self {
            discord_bot_token,
            discord_api_base,
            discord_gateway_url,
            discord_guild_ids,
            discord_intents,
            mongodb_uri,
            mongodb_db,
            backfill_page_size,
            backfill_workers,
            backfill_request_delay_ms,
        })
    }
}

fn require(name: &'static str) -> Result<String> {
    env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn optional(name: &'static str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T: FromStr>(name: &'static str, default: T) -> Result<T> {
    match env::var(name) {
        Err(_) => Ok(default),
        Ok(raw) => raw
            .parse()
            .map_err(|_| ConfigError::Invalid { var: name, value: raw }),
    }
}

fn parse_guild_ids(csv: &str) -> Vec<String> {
    csv.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_csv_guild_ids_trimming_whitespace() {
        assert_eq!(
            parse_guild_ids(" 1, 2 ,3"),
            vec!["1".to_string(), "2".to_string(), "3".to_string()]
        );
    }

    #[test]
    fn empty_csv_yields_empty_list() {
        assert!(parse_guild_ids("").is_empty());
        assert!(parse_guild_ids("   ").is_empty());
    }
}
