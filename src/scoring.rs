// src/scoring.rs
//! Engagement scoring: (sentiment, message length) -> (score, level).
//!
//! score = sentiment * 100 * length_modifier(length)
//!
//! | length       | modifier |
//! |--------------|----------|
//! | < 15         | 0.80     |
//! | 15..20       | 1.00     |
//! | 20..=60      | 1.20     |
//! | 61..=80      | 1.00     |
//! | > 80         | 0.90     |
//!
//! Inputs are not clamped: a sentiment outside [0,1] yields whatever the
//! formula gives. Range checks, if any, belong to the decoder.

use serde::{Deserialize, Serialize};
use std::fmt;

pub const SHORT_PENALTY: f64 = 0.80;
pub const OPTIMAL_BOOST: f64 = 1.20;
pub const LONG_PENALTY: f64 = 0.90;
pub const NEUTRAL: f64 = 1.00;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EngagementLevel {
    #[serde(rename = "Very Low")]
    VeryLow,
    Low,
    Medium,
    High,
}

impl EngagementLevel {
    pub const ALL: [EngagementLevel; 4] = [
        EngagementLevel::High,
        EngagementLevel::Medium,
        EngagementLevel::Low,
        EngagementLevel::VeryLow,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EngagementLevel::VeryLow => "Very Low",
            EngagementLevel::Low => "Low",
            EngagementLevel::Medium => "Medium",
            EngagementLevel::High => "High",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|l| l.as_str() == s)
    }
}

impl fmt::Display for EngagementLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_high() -> f64 {
    80.0
}
fn default_medium() -> f64 {
    60.0
}
fn default_low() -> f64 {
    40.0
}

/// Lower bounds (inclusive) of the High, Medium and Low bands.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct LevelThresholds {
    #[serde(default = "default_high")]
    pub high: f64,
    #[serde(default = "default_medium")]
    pub medium: f64,
    #[serde(default = "default_low")]
    pub low: f64,
}

impl Default for LevelThresholds {
    fn default() -> Self {
        Self {
            high: default_high(),
            medium: default_medium(),
            low: default_low(),
        }
    }
}

impl LevelThresholds {
    /// Bands must be strictly descending.
    pub fn is_ordered(&self) -> bool {
        self.high > self.medium && self.medium > self.low
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Engagement {
    pub score: f64,
    pub level: EngagementLevel,
}

pub fn length_modifier(length: u32) -> f64 {
    match length {
        0..=14 => SHORT_PENALTY,
        15..=19 => NEUTRAL,
        20..=60 => OPTIMAL_BOOST,
        61..=80 => NEUTRAL,
        _ => LONG_PENALTY,
    }
}

pub fn classify(score: f64, t: &LevelThresholds) -> EngagementLevel {
    if score >= t.high {
        EngagementLevel::High
    } else if score >= t.medium {
        EngagementLevel::Medium
    } else if score >= t.low {
        EngagementLevel::Low
    } else {
        EngagementLevel::VeryLow
    }
}

/// Scores are stored with two decimals.
pub fn storage_precision(score: f64) -> f64 {
    (score * 100.0).round() / 100.0
}

/// Pure and deterministic. `score` is left unrounded; the level is taken
/// from the two-decimal value so a stored row always agrees with its level.
pub fn score(sentiment: f64, length: u32, t: &LevelThresholds) -> Engagement {
    let base = sentiment * 100.0;
    let score = base * length_modifier(length);
    Engagement {
        score,
        level: classify(storage_precision(score), t),
    }
}
