//! Research Routes
//!
//! Player prop research reports plus cache maintenance. Cache admin lives
//! under `/api/admin` so every `/api/research/:player_name` stays a player.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, get},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use research_core::{Prediction, PropType, ReportOutcome, ResearchError, StatContext};
use serde::{Deserialize, Serialize};

use crate::extract::{ApiPath, ApiQuery};
use crate::request_id::RequestId;
use crate::{AppError, AppState};

const REPORT_FAILURE_MESSAGE: &str = "Failed to generate research report";

#[derive(Deserialize)]
pub struct ResearchQuery {
    /// Stat category, defaults to points
    #[serde(default)]
    pub prop: Option<String>,
    /// Only "true" (any case) bypasses the cache
    #[serde(default)]
    pub refresh: Option<String>,
}

#[derive(Deserialize)]
pub struct InvalidateQuery {
    #[serde(default)]
    pub prop: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatContextView {
    pub player_id: Option<u64>,
    pub player_name: String,
    pub season: i32,
    pub games_played: u32,
    pub season_average: f64,
    pub recent_average: Option<f64>,
    pub recent_games: usize,
    pub baseline: f64,
}

impl From<&StatContext> for StatContextView {
    fn from(ctx: &StatContext) -> Self {
        Self {
            player_id: ctx.player_id,
            player_name: ctx.player_name.clone(),
            season: ctx.season,
            games_played: ctx.games_played,
            season_average: ctx.season_average,
            recent_average: ctx.recent_average,
            recent_games: ctx.recent_games,
            baseline: ctx.baseline,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchResponse {
    pub player_name: String,
    pub prop_type: PropType,
    pub prediction: Prediction,
    pub confidence: f64,
    pub reasoning: String,
    pub stat_weight: f64,
    pub sentiment_weight: f64,
    pub simulated: bool,
    pub stat_context: StatContextView,
    pub cached: bool,
    pub overall_sentiment: f64,
    pub mention_count: usize,
    pub generated_at: DateTime<Utc>,
}

impl From<&ReportOutcome> for ResearchResponse {
    fn from(outcome: &ReportOutcome) -> Self {
        let body = outcome.report.body();
        Self {
            player_name: body.player_name.clone(),
            prop_type: body.prop_type,
            prediction: body.prediction,
            confidence: body.confidence,
            reasoning: body.reasoning.clone(),
            stat_weight: body.stat_weight,
            sentiment_weight: body.sentiment_weight,
            simulated: outcome.report.is_simulated(),
            stat_context: StatContextView::from(&body.stat_context),
            cached: outcome.cached,
            overall_sentiment: body.overall_sentiment,
            mention_count: body.mention_count,
            generated_at: body.generated_at,
        }
    }
}

pub fn research_routes() -> Router<AppState> {
    Router::new()
        .route("/api/research/:player_name", get(get_research))
        .route("/api/research/:player_name/cache", delete(invalidate_research))
        .route("/api/admin/research/cache", delete(clear_research_cache))
}

/// Map pipeline errors to HTTP; upstream detail stays in the logs.
fn research_err(e: ResearchError) -> AppError {
    match e {
        ResearchError::InvalidInput(_) => {
            AppError::with_status(StatusCode::BAD_REQUEST, anyhow::anyhow!("{e}"))
        }
        other => AppError::with_message(
            StatusCode::INTERNAL_SERVER_ERROR,
            REPORT_FAILURE_MESSAGE,
            anyhow::anyhow!("{other}"),
        ),
    }
}

fn parse_prop(raw: Option<&str>) -> Result<PropType, AppError> {
    match raw {
        Some(p) if !p.trim().is_empty() => p.parse().map_err(research_err),
        _ => Ok(PropType::default()),
    }
}

fn validate_player(player_name: &str) -> Result<(), AppError> {
    if player_name.trim().is_empty() {
        return Err(research_err(ResearchError::InvalidInput(
            "player name must not be blank".to_string(),
        )));
    }
    Ok(())
}

fn wants_refresh(raw: Option<&str>) -> bool {
    raw.is_some_and(|r| r.eq_ignore_ascii_case("true"))
}

async fn get_research(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    ApiPath(player_name): ApiPath<String>,
    ApiQuery(query): ApiQuery<ResearchQuery>,
) -> Result<Json<ResearchResponse>, AppError> {
    validate_player(&player_name)?;
    let prop_type = parse_prop(query.prop.as_deref())?;
    let force_refresh = wants_refresh(query.refresh.as_deref());

    let outcome = state
        .orchestrator
        .get_report(&player_name, prop_type, force_refresh)
        .await
        .map_err(|e| {
            tracing::error!(
                request_id = %request_id,
                "Research report for {} ({}) failed: {}",
                player_name,
                prop_type,
                e
            );
            research_err(e)
        })?;

    Ok(Json(ResearchResponse::from(&outcome)))
}

async fn invalidate_research(
    State(state): State<AppState>,
    ApiPath(player_name): ApiPath<String>,
    ApiQuery(query): ApiQuery<InvalidateQuery>,
) -> Result<StatusCode, AppError> {
    validate_player(&player_name)?;
    let prop_type = parse_prop(query.prop.as_deref())?;

    let removed = state.orchestrator.invalidate(&player_name, prop_type);
    tracing::info!(
        "Invalidated research cache for {} ({}): {}",
        player_name,
        prop_type,
        if removed { "removed" } else { "not cached" }
    );

    Ok(StatusCode::NO_CONTENT)
}

async fn clear_research_cache(State(state): State<AppState>) -> StatusCode {
    state.orchestrator.clear_cache();
    StatusCode::NO_CONTENT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_flag_parsing() {
        assert!(wants_refresh(Some("true")));
        assert!(wants_refresh(Some("TRUE")));
        assert!(!wants_refresh(Some("1")));
        assert!(!wants_refresh(Some("yes")));
        assert!(!wants_refresh(None));
    }

    #[test]
    fn test_prop_defaults_to_points() {
        assert_eq!(parse_prop(None).ok(), Some(PropType::Points));
        assert_eq!(parse_prop(Some("")).ok(), Some(PropType::Points));
        assert_eq!(parse_prop(Some("reb")).ok(), Some(PropType::Rebounds));
        assert!(parse_prop(Some("dunks")).is_err());
    }
}
