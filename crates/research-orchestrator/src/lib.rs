use chrono::Utc;
use dashmap::DashMap;
use research_core::{
    current_season, Mention, MentionSource, PropType, ReportOutcome, ResearchError,
    ResearchReport, StatContext, StatContextSource,
};
use sentiment_analysis::SentimentScorer;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

pub mod cache;
pub mod synthesis;

pub use cache::TtlCache;
pub use synthesis::{blend_weights, confidence_for, prediction_for, Weights};

use synthesis::SynthesisInput;

const DEFAULT_CACHE_TTL_SECS: u64 = 300; // 5 minutes
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub cache_ttl: Duration,
    /// Applied to each upstream fetch separately
    pub fetch_timeout: Duration,
    /// Season stamped on placeholder stat context; `None` derives it from today
    pub season: Option<i32>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            season: None,
        }
    }
}

/// Cache slot for a (player, prop) pair. Exact match: no case folding or trimming.
pub fn cache_key(player_name: &str, prop_type: PropType) -> String {
    format!("research:{}:{}", player_name, prop_type)
}

async fn with_timeout<T, F>(label: &str, timeout: Duration, fut: F) -> Result<T, ResearchError>
where
    F: Future<Output = Result<T, ResearchError>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(ResearchError::Timeout(format!("{} exceeded {:?}", label, timeout))),
    }
}

type InFlightRegistry = DashMap<String, Arc<Mutex<()>>>;

/// A caller's claim on the per-key coalescing lock. Dropping it releases the
/// registry entry once no other caller holds or waits on that lock, so
/// cancelled requests clean up after themselves too.
struct InFlightSlot<'a> {
    registry: &'a InFlightRegistry,
    key: &'a str,
    lock: Arc<Mutex<()>>,
}

impl<'a> InFlightSlot<'a> {
    fn claim(registry: &'a InFlightRegistry, key: &'a str) -> Self {
        let lock = registry
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        Self { registry, key, lock }
    }
}

impl Drop for InFlightSlot<'_> {
    fn drop(&mut self) {
        // The registry's copy plus ours: nobody else is queued on this key.
        self.registry
            .remove_if(self.key, |_, entry| Arc::strong_count(entry) <= 2);
    }
}

/// Builds research reports from mentions and stat context, cache-first.
pub struct ResearchOrchestrator {
    mention_source: Arc<dyn MentionSource>,
    stat_source: Arc<dyn StatContextSource>,
    scorer: SentimentScorer,
    cache: TtlCache<Arc<ResearchReport>>,
    /// One lock per key with a pipeline in progress; concurrent misses queue here
    in_flight: InFlightRegistry,
    config: OrchestratorConfig,
}

impl ResearchOrchestrator {
    pub fn new(
        mention_source: Arc<dyn MentionSource>,
        stat_source: Arc<dyn StatContextSource>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            mention_source,
            stat_source,
            scorer: SentimentScorer::new(),
            cache: TtlCache::new(config.cache_ttl),
            in_flight: DashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn cache(&self) -> &TtlCache<Arc<ResearchReport>> {
        &self.cache
    }

    /// Drop the cached report for one (player, prop) pair.
    pub fn invalidate(&self, player_name: &str, prop_type: PropType) -> bool {
        self.cache.remove(&cache_key(player_name, prop_type))
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
        tracing::info!("Research report cache cleared");
    }

    /// Get a research report, serving from cache unless `force_refresh` is set.
    /// A fresh report is always written back to the cache.
    pub async fn get_report(
        &self,
        player_name: &str,
        prop_type: PropType,
        force_refresh: bool,
    ) -> Result<ReportOutcome, ResearchError> {
        let key = cache_key(player_name, prop_type);

        if !force_refresh {
            if let Some(report) = self.cache.get(&key) {
                tracing::debug!("Cache hit for {}", key);
                return Ok(ReportOutcome {
                    report,
                    cached: true,
                });
            }
        }

        let slot = InFlightSlot::claim(&self.in_flight, &key);
        let _guard = slot.lock.lock().await;

        // Another request may have filled the cache while we waited.
        match (!force_refresh).then(|| self.cache.get(&key)).flatten() {
            Some(report) => {
                tracing::debug!("Cache filled by concurrent request for {}", key);
                Ok(ReportOutcome {
                    report,
                    cached: true,
                })
            }
            None => {
                tracing::debug!("Cache miss for {} (force_refresh: {})", key, force_refresh);
                let report = Arc::new(self.generate(player_name, prop_type).await?);
                self.cache.set(key.clone(), report.clone());
                Ok(ReportOutcome {
                    report,
                    cached: false,
                })
            }
        }
    }

    /// Run the full pipeline: fetch both signals concurrently, score, synthesize.
    async fn generate(
        &self,
        player_name: &str,
        prop_type: PropType,
    ) -> Result<ResearchReport, ResearchError> {
        tracing::info!("Generating research report for {} ({})", player_name, prop_type);
        let timeout = self.config.fetch_timeout;

        let (mentions_result, stats_result) = tokio::join!(
            with_timeout(
                "mention scrape",
                timeout,
                self.mention_source.scrape_mentions(player_name)
            ),
            with_timeout(
                "stat context fetch",
                timeout,
                self.stat_source.fetch_stat_context(player_name, prop_type)
            ),
        );

        let (mentions, stats) = match (mentions_result, stats_result) {
            (Err(mention_err), Err(stat_err)) => {
                tracing::error!(
                    "Both research inputs failed for {} ({}): mentions: {}; stats: {}",
                    player_name,
                    prop_type,
                    mention_err,
                    stat_err
                );
                return Err(ResearchError::ReportGenerationFailed(format!(
                    "mentions: {}; stats: {}",
                    mention_err, stat_err
                )));
            }
            (mentions, stats) => (mentions, stats),
        };

        let mentions: Vec<Mention> = mentions.unwrap_or_else(|e| {
            tracing::warn!("Mention scrape failed for {}, using neutral sentiment: {}", player_name, e);
            Vec::new()
        });

        let (stat_context, simulated) = match stats {
            Ok(ctx) => (ctx, false),
            Err(e) => {
                tracing::warn!(
                    "Stat context unavailable for {} ({}), falling back to simulated data: {}",
                    player_name,
                    prop_type,
                    e
                );
                let season = self.config.season.unwrap_or_else(|| current_season(Utc::now()));
                (StatContext::placeholder(player_name, prop_type, season), true)
            }
        };

        let sentiment = self.scorer.score_mentions(&mentions);

        let report = synthesis::synthesize(SynthesisInput {
            player_name,
            prop_type,
            stat_context,
            simulated,
            sentiment,
            mention_count: mentions.len(),
        });

        let body = report.body();
        tracing::info!(
            "Report for {} ({}): {} at {:.0}% confidence{}",
            player_name,
            prop_type,
            body.prediction.as_str(),
            body.confidence * 100.0,
            if simulated { " [simulated]" } else { "" }
        );

        Ok(report)
    }
}
