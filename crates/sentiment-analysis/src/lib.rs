use research_core::Mention;
use serde::Serialize;
use std::collections::HashSet;

pub mod scraper;
pub use scraper::{RedditMentionSource, ScraperConfig};

const NEGATION_WORDS: &[&str] = &[
    "not", "no", "never", "don't", "doesn't", "didn't", "isn't", "aren't",
    "wasn't", "weren't", "won't", "wouldn't", "couldn't", "shouldn't", "hardly",
    "barely", "neither", "nor", "without", "can't", "ain't",
];

const NEGATION_WINDOW: usize = 3;

/// Net lexicon hits are divided by this before squashing, so two clean
/// positive hits land around +0.76.
const SQUASH_SCALE: f64 = 2.0;

/// A mention scoring inside this band counts as neutral in the breakdown.
const NEUTRAL_BAND: f64 = 0.1;

const POSITIVE_WORDS: &[&str] = &[
    "hot", "cooking", "dominant", "dominating", "dominated", "elite", "efficient",
    "healthy", "monster", "explosive", "clutch", "mvp", "triple-double",
    "double-double", "breakout", "streak", "improved", "rolling", "torching",
    "unstoppable", "strong", "great", "best", "smash", "lock", "returns",
    "returning", "cleared", "upgraded", "thriving", "surging", "career-high",
    "locked", "scorching", "automatic", "takeover", "bounce", "bounced",
    "rested", "fresh", "spark", "incredible", "insane", "huge", "impressive",
    "comeback", "active", "available", "starting", "expanded", "increase",
];

const NEGATIVE_WORDS: &[&str] = &[
    "injury", "injured", "questionable", "doubtful", "sidelined", "slump",
    "cold", "struggling", "struggles", "struggled", "tired", "fatigue",
    "resting", "limited", "restriction", "ankle", "hamstring", "knee", "sore",
    "soreness", "benched", "bad", "worst", "brick", "bricks", "bricking",
    "inefficient", "fade", "downgraded", "suspended", "suspension", "illness",
    "sick", "bust", "declining", "decline", "awful", "terrible", "poor",
    "weak", "missed", "misses", "concussion", "sprain", "strain", "surgery",
    "out", "dnp", "ejected", "foul", "turnovers", "frustrated", "decrease",
];

/// Aggregate sentiment over a batch of mentions
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SentimentSummary {
    /// Mean per-mention score, -1.0 to 1.0. Zero when there were no mentions.
    pub overall: f64,
    pub positive: usize,
    pub negative: usize,
    pub neutral: usize,
}

impl SentimentSummary {
    pub fn total(&self) -> usize {
        self.positive + self.negative + self.neutral
    }

    pub fn label(&self) -> &'static str {
        if self.overall > 0.35 {
            "strongly positive"
        } else if self.overall > NEUTRAL_BAND {
            "mildly positive"
        } else if self.overall >= -NEUTRAL_BAND {
            "neutral"
        } else if self.overall >= -0.35 {
            "mildly negative"
        } else {
            "strongly negative"
        }
    }
}

/// Lexicon-based scorer for short basketball commentary
pub struct SentimentScorer {
    positive: HashSet<&'static str>,
    negative: HashSet<&'static str>,
    negation: HashSet<&'static str>,
}

impl SentimentScorer {
    pub fn new() -> Self {
        Self {
            positive: POSITIVE_WORDS.iter().copied().collect(),
            negative: NEGATIVE_WORDS.iter().copied().collect(),
            negation: NEGATION_WORDS.iter().copied().collect(),
        }
    }

    /// Net lexicon score of a text: +1 per positive hit, -1 per negative hit,
    /// flipped when a negation word sits within `NEGATION_WINDOW` tokens before.
    fn raw_score(&self, text: &str) -> i32 {
        let text_lower = text.to_lowercase();
        let words: Vec<&str> = text_lower
            .split(|c: char| !(c.is_alphanumeric() || c == '-' || c == '\''))
            .filter(|w| !w.is_empty())
            .collect();

        let negation_positions: Vec<usize> = words
            .iter()
            .enumerate()
            .filter(|(_, w)| self.negation.contains(*w))
            .map(|(i, _)| i)
            .collect();

        let mut score: i32 = 0;

        for (i, word) in words.iter().enumerate() {
            let is_positive = self.positive.contains(*word);
            let is_negative = self.negative.contains(*word);

            if !is_positive && !is_negative {
                continue;
            }

            let negated = negation_positions
                .iter()
                .any(|&neg_pos| neg_pos < i && (i - neg_pos) <= NEGATION_WINDOW);

            let polarity = if is_positive { 1 } else { -1 };
            score += if negated { -polarity } else { polarity };
        }

        score
    }

    /// Score a single text into [-1, 1].
    pub fn score_text(&self, text: &str) -> f64 {
        (self.raw_score(text) as f64 / SQUASH_SCALE).tanh()
    }

    /// Score every mention and average the results.
    pub fn score_mentions(&self, mentions: &[Mention]) -> SentimentSummary {
        if mentions.is_empty() {
            return SentimentSummary {
                overall: 0.0,
                positive: 0,
                negative: 0,
                neutral: 0,
            };
        }

        let mut total = 0.0;
        let mut positive = 0;
        let mut negative = 0;
        let mut neutral = 0;

        for mention in mentions {
            let s = self.score_text(&mention.text);
            total += s;
            if s > NEUTRAL_BAND {
                positive += 1;
            } else if s < -NEUTRAL_BAND {
                negative += 1;
            } else {
                neutral += 1;
            }
        }

        let overall = (total / mentions.len() as f64).clamp(-1.0, 1.0);
        tracing::debug!(
            "Scored {} mentions: overall {:.3} ({} positive, {} negative, {} neutral)",
            mentions.len(),
            overall,
            positive,
            negative,
            neutral
        );

        SentimentSummary {
            overall,
            positive,
            negative,
            neutral,
        }
    }
}

impl Default for SentimentScorer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positive_text_scores_positive() {
        let scorer = SentimentScorer::new();
        let s = scorer.score_text("He's been cooking lately, absolutely unstoppable!");
        assert!(s > 0.5, "expected strong positive, got {}", s);
    }

    #[test]
    fn test_negative_text_scores_negative() {
        let scorer = SentimentScorer::new();
        let s = scorer.score_text("Questionable with ankle soreness, minutes restriction likely");
        assert!(s < -0.9, "expected strong negative, got {}", s);
    }

    #[test]
    fn test_negation_flips_polarity() {
        let scorer = SentimentScorer::new();
        assert!(scorer.score_text("he is healthy") > 0.0);
        assert!(scorer.score_text("he is not healthy") < 0.0);
        assert!(scorer.score_text("definitely not injured") > 0.0);
    }

    #[test]
    fn test_negation_window_is_bounded() {
        let scorer = SentimentScorer::new();
        // "not" is five tokens away from "elite", outside the window
        let s = scorer.score_text("not sure about tonight but honestly elite");
        assert!(s > 0.0);
    }

    #[test]
    fn test_unrelated_text_is_neutral() {
        let scorer = SentimentScorer::new();
        assert_eq!(scorer.score_text("Game starts at 7:30 eastern"), 0.0);
        assert_eq!(scorer.score_text(""), 0.0);
    }

    #[test]
    fn test_scores_stay_in_range() {
        let scorer = SentimentScorer::new();
        let gushing = "elite ".repeat(200);
        let doom = "injured ".repeat(200);
        let s_pos = scorer.score_text(&gushing);
        let s_neg = scorer.score_text(&doom);
        assert!(s_pos <= 1.0 && s_pos > 0.99);
        assert!(s_neg >= -1.0 && s_neg < -0.99);
    }

    #[test]
    fn test_scoring_is_deterministic() {
        let scorer = SentimentScorer::new();
        let text = "Triple-double streak continues but the knee looks sore";
        assert_eq!(scorer.score_text(text), scorer.score_text(text));
    }

    #[test]
    fn test_empty_mentions_are_neutral() {
        let summary = SentimentScorer::new().score_mentions(&[]);
        assert_eq!(summary.overall, 0.0);
        assert_eq!(summary.total(), 0);
        assert_eq!(summary.label(), "neutral");
    }

    #[test]
    fn test_score_mentions_averages_and_buckets() {
        let scorer = SentimentScorer::new();
        let mentions = vec![
            Mention::new("MVP level, dominant night"),
            Mention::new("Listed as doubtful with a hamstring strain"),
            Mention::new("Tip-off moved to 8pm"),
        ];
        let summary = scorer.score_mentions(&mentions);

        assert_eq!(summary.positive, 1);
        assert_eq!(summary.negative, 1);
        assert_eq!(summary.neutral, 1);

        let expected = mentions.iter().map(|m| scorer.score_text(&m.text)).sum::<f64>() / 3.0;
        assert!((summary.overall - expected).abs() < 1e-12);
        assert!(summary.overall >= -1.0 && summary.overall <= 1.0);
    }
}
