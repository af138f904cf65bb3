use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,

    // Stat provider
    pub balldontlie_api_key: Option<String>,
    pub balldontlie_base_url: String,
    pub balldontlie_rate_limit: usize, // requests per minute

    // Mention scraping
    pub mentions_base_url: String,
    pub mentions_subreddits: Vec<String>,

    // Research pipeline
    pub cache_ttl_secs: u64,       // 300 (5 minutes)
    pub fetch_timeout_secs: u64,   // 5
    pub recent_games: usize,       // 5
    pub season: Option<i32>,       // None = derived from today
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        let config = Self {
            host: var_or("HOST", "0.0.0.0"),
            port: var_or("PORT", "3000")
                .parse()
                .context("PORT must be a valid port number")?,

            balldontlie_api_key: env::var("BALLDONTLIE_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            balldontlie_base_url: var_or("BALLDONTLIE_BASE_URL", balldontlie_client::BASE_URL),
            balldontlie_rate_limit: var_or("BALLDONTLIE_RATE_LIMIT", "30")
                .parse()
                .context("BALLDONTLIE_RATE_LIMIT must be a positive integer")?,

            mentions_base_url: var_or("MENTIONS_BASE_URL", "https://www.reddit.com"),
            mentions_subreddits: parse_list(&var_or(
                "MENTIONS_SUBREDDITS",
                "nba,fantasybball,sportsbook",
            )),

            cache_ttl_secs: var_or("RESEARCH_CACHE_TTL_SECS", "300")
                .parse()
                .context("RESEARCH_CACHE_TTL_SECS must be a whole number of seconds")?,
            fetch_timeout_secs: var_or("RESEARCH_FETCH_TIMEOUT_SECS", "5")
                .parse()
                .context("RESEARCH_FETCH_TIMEOUT_SECS must be a whole number of seconds")?,
            recent_games: var_or("RESEARCH_RECENT_GAMES", "5")
                .parse()
                .context("RESEARCH_RECENT_GAMES must be a positive integer")?,
            season: env::var("NBA_SEASON")
                .ok()
                .map(|s| s.parse())
                .transpose()
                .context("NBA_SEASON must be a year such as 2024")?,
        };

        Ok(config)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Split a comma-separated env value, dropping blanks.
fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}
