use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::ResearchError;

/// NBA season a date falls in. Seasons tip off in October, so January through
/// September belong to the season that started the previous calendar year.
pub fn current_season(now: DateTime<Utc>) -> i32 {
    if now.month() >= 10 {
        now.year()
    } else {
        now.year() - 1
    }
}

/// Stat category a prop line is written against
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropType {
    #[default]
    Points,
    Assists,
    Rebounds,
    Steals,
    Blocks,
    Threes,
}

impl PropType {
    pub const ALL: [PropType; 6] = [
        PropType::Points,
        PropType::Assists,
        PropType::Rebounds,
        PropType::Steals,
        PropType::Blocks,
        PropType::Threes,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PropType::Points => "points",
            PropType::Assists => "assists",
            PropType::Rebounds => "rebounds",
            PropType::Steals => "steals",
            PropType::Blocks => "blocks",
            PropType::Threes => "threes",
        }
    }

    /// Short stat-sheet abbreviation used in reasoning text
    pub fn abbreviation(&self) -> &'static str {
        match self {
            PropType::Points => "pts",
            PropType::Assists => "ast",
            PropType::Rebounds => "reb",
            PropType::Steals => "stl",
            PropType::Blocks => "blk",
            PropType::Threes => "3pm",
        }
    }

    /// Per-game value of a typical rotation player, used as placeholder data
    /// when real stat context is unavailable.
    pub fn league_baseline(&self) -> f64 {
        match self {
            PropType::Points => 14.5,
            PropType::Assists => 3.3,
            PropType::Rebounds => 5.6,
            PropType::Steals => 0.9,
            PropType::Blocks => 0.6,
            PropType::Threes => 1.6,
        }
    }
}

impl fmt::Display for PropType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PropType {
    type Err = ResearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "points" | "pts" => Ok(PropType::Points),
            "assists" | "ast" => Ok(PropType::Assists),
            "rebounds" | "reb" => Ok(PropType::Rebounds),
            "steals" | "stl" => Ok(PropType::Steals),
            "blocks" | "blk" => Ok(PropType::Blocks),
            "threes" | "fg3m" | "3pm" => Ok(PropType::Threes),
            other => Err(ResearchError::InvalidInput(format!(
                "unknown prop type '{}'",
                other
            ))),
        }
    }
}

/// Direction of the lean against the prop line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Prediction {
    Over,
    Under,
    Neutral,
}

impl Prediction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Prediction::Over => "over",
            Prediction::Under => "under",
            Prediction::Neutral => "neutral",
        }
    }
}

/// A short piece of public commentary about a player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mention {
    pub text: String,
    #[serde(default)]
    pub source: Option<String>,
}

impl Mention {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: None,
        }
    }

    pub fn with_source(text: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: Some(source.into()),
        }
    }
}

/// Season-average context for one player and one prop type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatContext {
    pub player_id: Option<u64>,
    pub player_name: String,
    pub season: i32,
    pub games_played: u32,
    pub season_average: f64,
    /// Mean over the most recent games, when those could be fetched
    pub recent_average: Option<f64>,
    pub recent_games: usize,
    /// Value the recent form is measured against
    pub baseline: f64,
}

impl StatContext {
    /// Placeholder context used when the stats API could not be reached.
    pub fn placeholder(player_name: &str, prop_type: PropType, season: i32) -> Self {
        let baseline = prop_type.league_baseline();
        Self {
            player_id: None,
            player_name: player_name.to_string(),
            season,
            games_played: 0,
            season_average: baseline,
            recent_average: None,
            recent_games: 0,
            baseline,
        }
    }

    /// Relative deviation of recent form from the baseline, clamped to [-1, 1].
    pub fn deviation(&self) -> f64 {
        match self.recent_average {
            Some(recent) => ((recent - self.baseline) / self.baseline.max(1.0)).clamp(-1.0, 1.0),
            None => 0.0,
        }
    }
}

/// Fields shared by real and simulated reports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportBody {
    pub player_name: String,
    pub prop_type: PropType,
    pub prediction: Prediction,
    pub confidence: f64, // 0.0 to 1.0
    pub reasoning: String,
    pub stat_weight: f64,
    pub sentiment_weight: f64,
    pub overall_sentiment: f64, // -1.0 to 1.0
    pub mention_count: usize,
    pub stat_context: StatContext,
    pub generated_at: DateTime<Utc>,
}

/// A research report. `Simulated` means the stat context is placeholder data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "body", rename_all = "lowercase")]
pub enum ResearchReport {
    Real(ReportBody),
    Simulated(ReportBody),
}

impl ResearchReport {
    pub fn body(&self) -> &ReportBody {
        match self {
            ResearchReport::Real(body) | ResearchReport::Simulated(body) => body,
        }
    }

    pub fn is_simulated(&self) -> bool {
        matches!(self, ResearchReport::Simulated(_))
    }
}

/// A report handed to a caller, tagged with whether it came from the cache
#[derive(Debug, Clone)]
pub struct ReportOutcome {
    pub report: Arc<ResearchReport>,
    pub cached: bool,
}
