//! Mention scraping from Reddit search.
//!
//! Each configured subreddit is searched for the player's name and the
//! matching post titles (plus a slice of their self-text) become mentions.

use async_trait::async_trait;
use futures_util::future::join_all;
use research_core::{Mention, MentionSource, ResearchError};
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://www.reddit.com";
const USER_AGENT: &str = "courtside-research/0.1";
const MAX_SELFTEXT_CHARS: usize = 280;

#[derive(Debug, Clone)]
pub struct ScraperConfig {
    pub base_url: String,
    pub subreddits: Vec<String>,
    /// Posts requested per subreddit
    pub limit: u32,
    pub timeout: Duration,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            subreddits: vec![
                "nba".to_string(),
                "fantasybball".to_string(),
                "sportsbook".to_string(),
            ],
            limit: 25,
            timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Child>,
}

#[derive(Debug, Deserialize)]
struct Child {
    data: Post,
}

#[derive(Debug, Deserialize)]
struct Post {
    title: String,
    #[serde(default)]
    selftext: String,
    #[serde(default)]
    subreddit: Option<String>,
    #[serde(default)]
    permalink: Option<String>,
}

#[derive(Clone)]
pub struct RedditMentionSource {
    client: reqwest::Client,
    config: ScraperConfig,
}

impl RedditMentionSource {
    pub fn new(config: ScraperConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self { client, config }
    }

    pub fn config(&self) -> &ScraperConfig {
        &self.config
    }

    async fn search_subreddit(
        &self,
        subreddit: &str,
        player_name: &str,
    ) -> Result<Vec<Post>, ResearchError> {
        let url = format!(
            "{}/r/{}/search.json",
            self.config.base_url.trim_end_matches('/'),
            subreddit
        );

        let response = self
            .client
            .get(&url)
            .query(&[
                ("q", player_name.to_string()),
                ("restrict_sr", "1".to_string()),
                ("sort", "new".to_string()),
                ("t", "week".to_string()),
                ("limit", self.config.limit.to_string()),
            ])
            .send()
            .await
            .map_err(|e| ResearchError::ScrapeFailed(format!("r/{}: {}", subreddit, e)))?;

        if !response.status().is_success() {
            return Err(ResearchError::ScrapeFailed(format!(
                "r/{} returned {}",
                subreddit,
                response.status()
            )));
        }

        let listing: Listing = response
            .json()
            .await
            .map_err(|e| ResearchError::ScrapeFailed(format!("r/{}: {}", subreddit, e)))?;

        Ok(listing.data.children.into_iter().map(|c| c.data).collect())
    }
}

/// Reddit search is fuzzy; keep only posts that actually name the player.
/// A post counts if it contains the full name or the last name.
fn mentions_player(post: &Post, player_name: &str) -> bool {
    let haystack = format!("{} {}", post.title, post.selftext).to_lowercase();
    let full = player_name.trim().to_lowercase();
    if full.is_empty() {
        return false;
    }
    if haystack.contains(&full) {
        return true;
    }
    match full.split_whitespace().last() {
        Some(last) if last.len() > 2 => haystack.contains(last),
        _ => false,
    }
}

fn post_to_mention(post: &Post, fallback_subreddit: &str) -> Mention {
    let snippet: String = post.selftext.chars().take(MAX_SELFTEXT_CHARS).collect();
    let text = if snippet.trim().is_empty() {
        post.title.clone()
    } else {
        format!("{} {}", post.title, snippet.trim())
    };
    let source = format!(
        "r/{}",
        post.subreddit.as_deref().unwrap_or(fallback_subreddit)
    );
    Mention::with_source(text, source)
}

#[async_trait]
impl MentionSource for RedditMentionSource {
    async fn scrape_mentions(&self, player_name: &str) -> Result<Vec<Mention>, ResearchError> {
        if self.config.subreddits.is_empty() {
            return Ok(Vec::new());
        }

        let searches = self
            .config
            .subreddits
            .iter()
            .map(|sub| self.search_subreddit(sub, player_name));
        let results = join_all(searches).await;

        let mut mentions = Vec::new();
        let mut seen = HashSet::new();
        let mut failures = Vec::new();

        for (subreddit, result) in self.config.subreddits.iter().zip(results) {
            match result {
                Ok(posts) => {
                    for post in posts.iter().filter(|p| mentions_player(p, player_name)) {
                        let key = post.permalink.clone().unwrap_or_else(|| post.title.clone());
                        if seen.insert(key) {
                            mentions.push(post_to_mention(post, subreddit));
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!("Mention search failed: {}", e);
                    failures.push(e.to_string());
                }
            }
        }

        // Partial results are still useful; only a clean sweep of failures is an error.
        if failures.len() == self.config.subreddits.len() {
            return Err(ResearchError::ScrapeFailed(failures.join("; ")));
        }

        tracing::info!(
            "Scraped {} mentions of {} from {} subreddits",
            mentions.len(),
            player_name,
            self.config.subreddits.len() - failures.len()
        );
        Ok(mentions)
    }
}
