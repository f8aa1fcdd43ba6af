use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Up,
    Down,
    Sideways,
}

impl Direction {
    /// UP = +1, DOWN = -1, SIDEWAYS = 0.
    pub fn as_number(&self) -> f64 {
        match self {
            Direction::Up => 1.0,
            Direction::Down => -1.0,
            Direction::Sideways => 0.0,
        }
    }

    /// Map a signed score back to a direction using a symmetric dead band.
    pub fn from_score(value: f64, threshold: f64) -> Self {
        if value > threshold {
            Direction::Up
        } else if value < -threshold {
            Direction::Down
        } else {
            Direction::Sideways
        }
    }

    pub fn is_neutral(&self) -> bool {
        matches!(self, Direction::Sideways)
    }
}

/// The three canonical voting rounds. Serialized as `1day`, `1week`,
/// `1month`, including when used as a map key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Timeframe {
    OneDay,
    OneWeek,
    OneMonth,
}

impl Timeframe {
    pub const ALL: [Timeframe; 3] = [Timeframe::OneDay, Timeframe::OneWeek, Timeframe::OneMonth];

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::OneDay => "1day",
            Timeframe::OneWeek => "1week",
            Timeframe::OneMonth => "1month",
        }
    }
}

impl std::str::FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Timeframe::ALL
            .into_iter()
            .find(|tf| tf.as_str() == s)
            .ok_or_else(|| format!("unknown timeframe '{s}', expected 1day, 1week or 1month"))
    }
}

impl Serialize for Timeframe {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Timeframe {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TimeframeSignal {
    pub direction: Direction,
    /// 0 to 100.
    pub confidence: f64,
}

impl TimeframeSignal {
    pub fn neutral() -> Self {
        Self {
            direction: Direction::Sideways,
            confidence: 0.0,
        }
    }
}

/// One agent's votes, keyed by timeframe. Missing timeframes abstain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentTimeframeSignals {
    pub agent: String,
    #[serde(default = "default_vote_weight")]
    pub weight: f64,
    pub timeframes: BTreeMap<Timeframe, TimeframeSignal>,
}

fn default_vote_weight() -> f64 {
    1.0
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SynthesizedPrediction {
    pub direction: Direction,
    pub timeframes: BTreeMap<Timeframe, TimeframeSignal>,
    pub confidence: f64,
    pub risk_level: RiskLevel,
    pub horizon_hours: u32,
    pub expires_at: DateTime<Utc>,
}
