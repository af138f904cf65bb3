use anyhow::Context;
use axum::{
    extract::State,
    http::{Request, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use balldontlie_client::{BallDontLieClient, StatContextSettings};
use research_orchestrator::{OrchestratorConfig, ResearchOrchestrator};
use sentiment_analysis::{RedditMentionSource, ScraperConfig};
use serde_json::json;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod config;
pub mod extract;
pub mod request_id;
pub mod research_routes;

pub use config::ServerConfig;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<ResearchOrchestrator>,
}

/// Handler error: a status, the message clients see, and the underlying cause
/// which is only logged.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    source: anyhow::Error,
}

impl AppError {
    /// Client errors echo the cause; server errors hide it behind a generic message.
    pub fn with_status(status: StatusCode, source: anyhow::Error) -> Self {
        let message = if status.is_server_error() {
            "Internal server error".to_string()
        } else {
            source.to_string()
        };
        Self {
            status,
            message,
            source,
        }
    }

    pub fn with_message(status: StatusCode, message: impl Into<String>, source: anyhow::Error) -> Self {
        Self {
            status,
            message: message.into(),
            source,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!("Request failed ({}): {:#}", self.status, self.source);
        } else {
            tracing::debug!("Request rejected ({}): {:#}", self.status, self.source);
        }
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "cachedReports": state.orchestrator.cache().len(),
    }))
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .merge(research_routes::research_routes())
        .layer(middleware::from_fn(request_id::request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                )
            }),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Wire the live collaborators together from configuration.
pub fn build_orchestrator(config: &ServerConfig) -> ResearchOrchestrator {
    if config.balldontlie_api_key.is_none() {
        tracing::warn!("BALLDONTLIE_API_KEY not set; reports will use simulated stat context");
    }

    let stats = BallDontLieClient::with_base_url(
        config.balldontlie_api_key.clone().unwrap_or_default(),
        config.balldontlie_base_url.clone(),
    )
    .with_rate_limit(config.balldontlie_rate_limit)
    .with_settings(StatContextSettings {
        season: config.season,
        recent_games: config.recent_games,
    });

    let mentions = RedditMentionSource::new(ScraperConfig {
        base_url: config.mentions_base_url.clone(),
        subreddits: config.mentions_subreddits.clone(),
        timeout: config.fetch_timeout(),
        ..ScraperConfig::default()
    });

    ResearchOrchestrator::new(
        Arc::new(mentions),
        Arc::new(stats),
        OrchestratorConfig {
            cache_ttl: config.cache_ttl(),
            fetch_timeout: config.fetch_timeout(),
            season: config.season,
        },
    )
}

fn init_tracing() {
    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "api_server=info,research_orchestrator=info,tower_http=info".into());

    if json_logging {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

pub async fn run_server() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ServerConfig::from_env()?;
    tracing::info!(
        "Research cache TTL {}s, fetch timeout {}s, subreddits: {}",
        config.cache_ttl_secs,
        config.fetch_timeout_secs,
        config.mentions_subreddits.join(",")
    );

    let state = AppState {
        orchestrator: Arc::new(build_orchestrator(&config)),
    };
    let app = build_router(state);

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("API server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}
