use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use research_core::{current_season, PropType, ResearchError, StatContext, StatContextSource};
use serde::de::DeserializeOwned;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

pub mod models;
pub use models::{GameRef, GameStat, Player, SeasonAverages, Team};

use models::ListResponse;

pub const BASE_URL: &str = "https://api.balldontlie.io";

const DEFAULT_RATE_LIMIT: usize = 30;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(2);
const MAX_ATTEMPTS: u32 = 3;
const STATS_PAGE_SIZE: u32 = 100;
/// Upper bound on box-score pages fetched per lookup
const MAX_STAT_PAGES: usize = 5;

/// Sliding-window rate limiter: at most `max_requests` per `window` duration.
#[derive(Clone)]
struct RateLimiter {
    timestamps: Arc<Mutex<VecDeque<Instant>>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            timestamps: Arc::new(Mutex::new(VecDeque::new())),
            max_requests: max_requests.max(1),
            window,
        }
    }

    async fn acquire(&self) {
        loop {
            let mut ts = self.timestamps.lock().await;
            let now = Instant::now();

            while let Some(&front) = ts.front() {
                if now.duration_since(front) >= self.window {
                    ts.pop_front();
                } else {
                    break;
                }
            }

            if ts.len() < self.max_requests {
                ts.push_back(now);
                return;
            }

            // Wait until the oldest request falls out of the window
            let sleep_dur = match ts.front() {
                Some(&oldest) => (oldest + self.window).saturating_duration_since(now),
                None => Duration::ZERO,
            } + Duration::from_millis(50);
            drop(ts);
            tracing::debug!(
                "Rate limiter: waiting {:.1}s for BallDontLie slot",
                sleep_dur.as_secs_f64()
            );
            tokio::time::sleep(sleep_dur).await;
        }
    }
}

/// Settings for turning raw API data into a [`StatContext`]
#[derive(Debug, Clone)]
pub struct StatContextSettings {
    /// Fixed season to query; `None` derives it from today's date
    pub season: Option<i32>,
    /// Number of most recent played games averaged into recent form
    pub recent_games: usize,
}

impl Default for StatContextSettings {
    fn default() -> Self {
        Self {
            season: None,
            recent_games: 5,
        }
    }
}

#[derive(Clone)]
pub struct BallDontLieClient {
    api_key: String,
    base_url: String,
    client: Client,
    rate_limiter: RateLimiter,
    retry_backoff: Duration,
    settings: StatContextSettings,
}

impl BallDontLieClient {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, BASE_URL)
    }

    pub fn with_base_url(api_key: String, base_url: impl Into<String>) -> Self {
        // Free tier allows 5 req/min; paid tiers go far higher.
        let rate_limit: usize = std::env::var("BALLDONTLIE_RATE_LIMIT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_RATE_LIMIT);

        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            rate_limiter: RateLimiter::new(rate_limit, Duration::from_secs(60)),
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            settings: StatContextSettings::default(),
        }
    }

    pub fn with_rate_limit(mut self, max_requests_per_minute: usize) -> Self {
        self.rate_limiter = RateLimiter::new(max_requests_per_minute, Duration::from_secs(60));
        self
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub fn with_settings(mut self, settings: StatContextSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Send a request with rate limiting and automatic 429 retry.
    async fn send_request(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, ResearchError> {
        let request = builder
            .header("Authorization", &self.api_key)
            .build()
            .map_err(|e| ResearchError::UpstreamUnavailable(e.to_string()))?;

        for attempt in 1..=MAX_ATTEMPTS {
            self.rate_limiter.acquire().await;
            let req_clone = request.try_clone().ok_or_else(|| {
                ResearchError::UpstreamUnavailable("Cannot clone request".to_string())
            })?;
            let response = self.client.execute(req_clone).await.map_err(map_transport_error)?;

            if response.status() != StatusCode::TOO_MANY_REQUESTS {
                return Ok(response);
            }

            tracing::warn!(
                "BallDontLie 429 rate limited, waiting {:?} before retry {}/{}",
                self.retry_backoff,
                attempt,
                MAX_ATTEMPTS
            );
            if attempt < MAX_ATTEMPTS {
                tokio::time::sleep(self.retry_backoff).await;
            }
        }

        Err(ResearchError::UpstreamUnavailable(format!(
            "Rate limited by BallDontLie after {} attempts",
            MAX_ATTEMPTS
        )))
    }

    async fn get_page<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<ListResponse<T>, ResearchError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.send_request(self.client.get(&url).query(query)).await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_status_error(status, &body));
        }

        response
            .json()
            .await
            .map_err(|e| ResearchError::UpstreamUnavailable(e.to_string()))
    }

    async fn get_list<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, ResearchError> {
        Ok(self.get_page(path, query).await?.data)
    }

    /// Search players by (partial) name
    pub async fn search_players(&self, name: &str) -> Result<Vec<Player>, ResearchError> {
        self.get_list("/v1/players", &[("search", name.to_string())])
            .await
    }

    /// Get per-game season averages for one player. `None` when the player
    /// has not logged a game that season.
    pub async fn get_season_averages(
        &self,
        player_id: u64,
        season: i32,
    ) -> Result<Option<SeasonAverages>, ResearchError> {
        let averages: Vec<SeasonAverages> = self
            .get_list(
                "/v1/season_averages",
                &[("season", season.to_string()), ("player_id", player_id.to_string())],
            )
            .await?;
        Ok(averages.into_iter().next())
    }

    /// Get a player's most recent box scores in a season, newest first.
    /// Follows the pagination cursor so late-season games are never cut off.
    pub async fn get_recent_stats(
        &self,
        player_id: u64,
        season: i32,
        limit: usize,
    ) -> Result<Vec<GameStat>, ResearchError> {
        let mut stats: Vec<GameStat> = Vec::new();
        let mut cursor: Option<u64> = None;

        for _ in 0..MAX_STAT_PAGES {
            let mut query = vec![
                ("player_ids[]", player_id.to_string()),
                ("seasons[]", season.to_string()),
                ("per_page", STATS_PAGE_SIZE.to_string()),
            ];
            if let Some(c) = cursor {
                query.push(("cursor", c.to_string()));
            }

            let page: ListResponse<GameStat> = self.get_page("/v1/stats", &query).await?;
            cursor = page.next_cursor();
            stats.extend(page.data);

            if cursor.is_none() {
                break;
            }
        }

        if cursor.is_some() {
            tracing::warn!(
                "Stopped paging box scores for player {} after {} pages",
                player_id,
                MAX_STAT_PAGES
            );
        }

        // ISO dates sort lexicographically
        stats.sort_by(|a, b| b.game.date.cmp(&a.game.date));
        stats.retain(|s| s.played());
        stats.truncate(limit);
        Ok(stats)
    }

    /// Pick the best search hit: an exact full-name match, else the first result.
    fn resolve_player(player_name: &str, candidates: Vec<Player>) -> Option<Player> {
        let wanted = player_name.trim().to_lowercase();
        let exact = candidates
            .iter()
            .position(|p| p.full_name().to_lowercase() == wanted);
        match exact {
            Some(idx) => candidates.into_iter().nth(idx),
            None => candidates.into_iter().next(),
        }
    }

    async fn build_stat_context(
        &self,
        player_name: &str,
        prop_type: PropType,
    ) -> Result<StatContext, ResearchError> {
        let season = self.settings.season.unwrap_or_else(|| current_season(Utc::now()));

        // The search endpoint matches on a single token best; fall back to the last name.
        let mut candidates = self.search_players(player_name).await?;
        if candidates.is_empty() {
            if let Some(last) = player_name.split_whitespace().last() {
                if last != player_name.trim() {
                    candidates = self.search_players(last).await?;
                }
            }
        }

        let player = Self::resolve_player(player_name, candidates).ok_or_else(|| {
            ResearchError::UpstreamUnavailable(format!("No player found matching '{}'", player_name))
        })?;

        let averages = self
            .get_season_averages(player.id, season)
            .await?
            .ok_or_else(|| {
                ResearchError::UpstreamUnavailable(format!(
                    "No {} season averages for {}",
                    season,
                    player.full_name()
                ))
            })?;

        let season_average = averages.value_for(prop_type).ok_or_else(|| {
            ResearchError::UpstreamUnavailable(format!(
                "Season averages for {} are missing {}",
                player.full_name(),
                prop_type
            ))
        })?;

        // Recent form is best effort; season averages alone still make a real context.
        let recent = match self
            .get_recent_stats(player.id, season, self.settings.recent_games)
            .await
        {
            Ok(stats) => stats,
            Err(e) => {
                tracing::warn!("Recent games unavailable for {}: {}", player.full_name(), e);
                Vec::new()
            }
        };

        let recent_values: Vec<f64> = recent.iter().filter_map(|s| s.value_for(prop_type)).collect();
        let recent_average = if recent_values.is_empty() {
            None
        } else {
            Some(recent_values.iter().sum::<f64>() / recent_values.len() as f64)
        };

        tracing::info!(
            "Stat context for {} ({}): season {:.1}, recent {:?} over {} games",
            player.full_name(),
            prop_type,
            season_average,
            recent_average,
            recent_values.len()
        );

        Ok(StatContext {
            player_id: Some(player.id),
            player_name: player.full_name(),
            season,
            games_played: averages.games_played,
            season_average,
            recent_average,
            recent_games: recent_values.len(),
            baseline: season_average,
        })
    }
}

#[async_trait]
impl StatContextSource for BallDontLieClient {
    async fn fetch_stat_context(
        &self,
        player_name: &str,
        prop_type: PropType,
    ) -> Result<StatContext, ResearchError> {
        self.build_stat_context(player_name, prop_type).await
    }
}

fn map_transport_error(e: reqwest::Error) -> ResearchError {
    if e.is_timeout() {
        ResearchError::Timeout(e.to_string())
    } else {
        ResearchError::UpstreamUnavailable(e.to_string())
    }
}

fn map_status_error(status: StatusCode, body: &str) -> ResearchError {
    match status.as_u16() {
        401 | 402 | 403 => ResearchError::UpstreamUnauthorized(format!("HTTP {}: {}", status, body)),
        _ => ResearchError::UpstreamUnavailable(format!("HTTP {}: {}", status, body)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn lebron() -> serde_json::Value {
        json!({
            "id": 237,
            "first_name": "LeBron",
            "last_name": "James",
            "position": "F",
            "team": { "id": 14, "abbreviation": "LAL", "full_name": "Los Angeles Lakers" }
        })
    }

    fn game(id: u64, date: &str, min: &str, pts: f64) -> serde_json::Value {
        json!({
            "id": id,
            "min": min,
            "pts": pts,
            "ast": 8.0,
            "reb": 7.0,
            "stl": 1.0,
            "blk": 1.0,
            "fg3m": 2.0,
            "game": { "id": id + 1000, "date": date, "season": 2024 }
        })
    }

    fn client_for(server: &MockServer) -> BallDontLieClient {
        BallDontLieClient::with_base_url("test-key".to_string(), server.uri())
            .with_rate_limit(1000)
            .with_retry_backoff(Duration::from_millis(10))
            .with_settings(StatContextSettings {
                season: Some(2024),
                recent_games: 3,
            })
    }

    async fn mount_player_search(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/v1/players"))
            .and(header("Authorization", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    { "id": 1, "first_name": "Bronny", "last_name": "James" },
                    lebron()
                ]
            })))
            .mount(server)
            .await;
    }

    async fn mount_season_averages(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/v1/season_averages"))
            .and(query_param("player_id", "237"))
            .and(query_param("season", "2024"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{
                    "player_id": 237,
                    "season": 2024,
                    "games_played": 60,
                    "min": "35:02",
                    "pts": 25.0,
                    "ast": 8.1,
                    "reb": 7.4,
                    "stl": 1.2,
                    "blk": 0.6,
                    "fg3m": 2.1
                }]
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_fetch_stat_context_uses_exact_name_match_and_recent_form() {
        let server = MockServer::start().await;
        mount_player_search(&server).await;
        mount_season_averages(&server).await;

        Mock::given(method("GET"))
            .and(path("/v1/stats"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    game(1, "2025-01-01", "34", 20.0),
                    game(2, "2025-01-05", "36", 30.0),
                    game(3, "2025-01-03", "00", 0.0),
                    game(4, "2025-01-04", "33:10", 31.0),
                    game(5, "2025-01-02", "35", 32.0)
                ]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let ctx = client
            .fetch_stat_context("LeBron James", PropType::Points)
            .await
            .unwrap();

        assert_eq!(ctx.player_id, Some(237));
        assert_eq!(ctx.player_name, "LeBron James");
        assert_eq!(ctx.season, 2024);
        assert_eq!(ctx.games_played, 60);
        assert_eq!(ctx.season_average, 25.0);
        assert_eq!(ctx.baseline, 25.0);
        // newest three played games: 01-05 (30), 01-04 (31), 01-02 (32); the DNP is skipped
        assert_eq!(ctx.recent_games, 3);
        assert!((ctx.recent_average.unwrap() - 31.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_recent_stats_failure_still_returns_season_context() {
        let server = MockServer::start().await;
        mount_player_search(&server).await;
        mount_season_averages(&server).await;

        Mock::given(method("GET"))
            .and(path("/v1/stats"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let ctx = client_for(&server)
            .fetch_stat_context("LeBron James", PropType::Assists)
            .await
            .unwrap();

        assert_eq!(ctx.season_average, 8.1);
        assert_eq!(ctx.recent_average, None);
        assert_eq!(ctx.recent_games, 0);
    }

    #[tokio::test]
    async fn test_recent_stats_follow_cursor_to_newest_games() {
        let server = MockServer::start().await;
        mount_player_search(&server).await;
        mount_season_averages(&server).await;

        Mock::given(method("GET"))
            .and(path("/v1/stats"))
            .and(query_param("cursor", "42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    game(10, "2025-05-20", "40", 40.0),
                    game(11, "2025-05-22", "41", 41.0),
                    game(12, "2025-05-24", "42", 42.0)
                ],
                "meta": { "next_cursor": null, "per_page": 100 }
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/v1/stats"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    game(1, "2024-11-01", "30", 10.0),
                    game(2, "2024-11-03", "31", 11.0),
                    game(3, "2024-11-05", "32", 12.0)
                ],
                "meta": { "next_cursor": 42, "per_page": 100 }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let ctx = client_for(&server)
            .fetch_stat_context("LeBron James", PropType::Points)
            .await
            .unwrap();

        assert_eq!(ctx.recent_games, 3);
        assert!((ctx.recent_average.unwrap() - 41.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_paid_plan_error_maps_to_unauthorized() {
        let server = MockServer::start().await;
        mount_player_search(&server).await;

        Mock::given(method("GET"))
            .and(path("/v1/season_averages"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .fetch_stat_context("LeBron James", PropType::Points)
            .await
            .unwrap_err();

        assert!(matches!(err, ResearchError::UpstreamUnauthorized(_)));
    }

    #[tokio::test]
    async fn test_unknown_player_is_an_upstream_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/players"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .fetch_stat_context("Nobody Special", PropType::Points)
            .await
            .unwrap_err();

        assert!(matches!(err, ResearchError::UpstreamUnavailable(_)));
    }

    #[tokio::test]
    async fn test_rate_limited_requests_are_retried() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/players"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(2)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/v1/players"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [lebron()] })))
            .mount(&server)
            .await;

        let players = client_for(&server).search_players("James").await.unwrap();
        assert_eq!(players.len(), 1);
        assert_eq!(players[0].full_name(), "LeBron James");
    }

    #[tokio::test]
    async fn test_persistent_429_gives_up() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/players"))
            .respond_with(ResponseTemplate::new(429))
            .expect(3)
            .mount(&server)
            .await;

        let err = client_for(&server).search_players("James").await.unwrap_err();
        assert!(matches!(err, ResearchError::UpstreamUnavailable(_)));
    }

    #[test]
    fn test_game_stat_played_detects_dnp() {
        let stat = |min: Option<&str>| GameStat {
            id: 1,
            min: min.map(|m| m.to_string()),
            pts: None,
            ast: None,
            reb: None,
            stl: None,
            blk: None,
            fg3m: None,
            game: GameRef { id: 1, date: "2025-01-01".to_string(), season: None },
        };
        assert!(stat(Some("34")).played());
        assert!(stat(Some("12:30")).played());
        assert!(!stat(Some("00")).played());
        assert!(!stat(Some("0:00")).played());
        assert!(!stat(Some("")).played());
        assert!(!stat(None).played());
    }
}
