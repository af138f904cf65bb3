//! Turns a stat context and a sentiment summary into a report.

use chrono::Utc;
use research_core::{Prediction, PropType, ReportBody, ResearchReport, StatContext};
use sentiment_analysis::SentimentSummary;

/// Signals smaller than this are treated as zero.
const SIGNAL_EPSILON: f64 = 1e-9;

/// Blend coefficients for the two signals. Always sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weights {
    pub stat: f64,
    pub sentiment: f64,
}

impl Weights {
    fn new(stat: f64) -> Self {
        Self {
            stat,
            sentiment: 1.0 - stat,
        }
    }
}

/// Real stats outweigh chatter; placeholder stats carry little information, so
/// commentary leads when it exists.
pub fn blend_weights(simulated: bool, has_mentions: bool) -> Weights {
    match (simulated, has_mentions) {
        (false, true) => Weights::new(0.6),
        (false, false) => Weights::new(1.0),
        (true, true) => Weights::new(0.2),
        (true, false) => Weights::new(0.5),
    }
}

pub fn prediction_for(combined: f64) -> Prediction {
    if combined > SIGNAL_EPSILON {
        Prediction::Over
    } else if combined < -SIGNAL_EPSILON {
        Prediction::Under
    } else {
        Prediction::Neutral
    }
}

/// Monotonic in |combined|, clamped to [0, 1].
pub fn confidence_for(combined: f64) -> f64 {
    (2.0 * combined.abs()).tanh().clamp(0.0, 1.0)
}

/// Inputs to one synthesis run
pub struct SynthesisInput<'a> {
    pub player_name: &'a str,
    pub prop_type: PropType,
    pub stat_context: StatContext,
    pub simulated: bool,
    pub sentiment: SentimentSummary,
    pub mention_count: usize,
}

pub fn synthesize(input: SynthesisInput<'_>) -> ResearchReport {
    let weights = blend_weights(input.simulated, input.mention_count > 0);
    let stat_signal = input.stat_context.deviation();
    let sentiment_signal = input.sentiment.overall;

    let stat_part = weights.stat * stat_signal;
    let sentiment_part = weights.sentiment * sentiment_signal;
    let combined = (stat_part + sentiment_part).clamp(-1.0, 1.0);

    let prediction = prediction_for(combined);
    let confidence = confidence_for(combined);
    let reasoning = build_reasoning(&input, prediction, stat_part, sentiment_part);

    let body = ReportBody {
        player_name: input.player_name.to_string(),
        prop_type: input.prop_type,
        prediction,
        confidence,
        reasoning,
        stat_weight: weights.stat,
        sentiment_weight: weights.sentiment,
        overall_sentiment: sentiment_signal,
        mention_count: input.mention_count,
        stat_context: input.stat_context,
        generated_at: Utc::now(),
    };

    if input.simulated {
        ResearchReport::Simulated(body)
    } else {
        ResearchReport::Real(body)
    }
}

fn describe_stats(ctx: &StatContext, prop_type: PropType) -> String {
    let abbr = prop_type.abbreviation();
    match ctx.recent_average {
        Some(recent) => format!(
            "{:.1} {} over the last {} games vs a {:.1} baseline ({:+.0}%)",
            recent,
            abbr,
            ctx.recent_games,
            ctx.baseline,
            ctx.deviation() * 100.0
        ),
        None => format!("{:.1} {} season average, no recent games to compare", ctx.season_average, abbr),
    }
}

fn describe_sentiment(summary: &SentimentSummary, mention_count: usize) -> String {
    if mention_count == 0 {
        return "no recent mentions found".to_string();
    }
    format!(
        "{} commentary across {} mentions ({} positive, {} negative)",
        summary.label(),
        mention_count,
        summary.positive,
        summary.negative
    )
}

fn build_reasoning(
    input: &SynthesisInput<'_>,
    prediction: Prediction,
    stat_part: f64,
    sentiment_part: f64,
) -> String {
    let stats = describe_stats(&input.stat_context, input.prop_type);
    let sentiment = describe_sentiment(&input.sentiment, input.mention_count);

    let mut reasoning = match prediction {
        Prediction::Neutral => format!("No clear edge: {}; {}.", stats, sentiment),
        _ => {
            let lean = prediction.as_str().to_uppercase();
            if stat_part.abs() >= sentiment_part.abs() {
                format!(
                    "Recent form drives the {} lean: {}. Sentiment: {}.",
                    lean, stats, sentiment
                )
            } else {
                format!(
                    "Public sentiment drives the {} lean: {}. Stats: {}.",
                    lean, sentiment, stats
                )
            }
        }
    };

    if input.simulated {
        reasoning.push_str(" Live stats were unavailable, so league-average placeholder numbers were used.");
    }

    reasoning
}
