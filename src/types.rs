use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Placeholder shown wherever an upstream value is missing.
pub const NOT_AVAILABLE: &str = "N/A";

// ---------------------------------------------------------------------------
// Live matches
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSummary {
    pub match_id: u64,
    pub home_team: String,
    pub away_team: String,
    pub score: Score,
    pub status: MatchStatus,
    /// Kickoff timestamp as sent upstream (ISO 8601).
    pub kickoff: Option<String>,
    pub league: LeagueInfo,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub home: u32,
    pub away: u32,
}

impl std::fmt::Display for Score {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.home, self.away)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchStatus {
    /// Short code, e.g. `1H`, `HT`, `2H`.
    pub short: Option<String>,
    pub long: Option<String>,
    /// Minutes played.
    pub elapsed: Option<u32>,
}

impl MatchStatus {
    /// `67'` while running, otherwise the short code.
    pub fn label(&self) -> String {
        match (self.elapsed, self.short.as_deref()) {
            (Some(min), Some("1H" | "2H" | "ET")) => format!("{min}'"),
            (_, Some(code)) => code.to_string(),
            (Some(min), None) => format!("{min}'"),
            (None, None) => NOT_AVAILABLE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeagueInfo {
    pub name: String,
    pub country: Option<String>,
}

// ---------------------------------------------------------------------------
// Predictions
// ---------------------------------------------------------------------------

/// Win probabilities for one fixture, relayed verbatim from upstream.
/// The three percentages are not required to sum to 100.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionSnapshot {
    pub match_id: String,
    pub home_team: String,
    pub away_team: String,
    pub home_win: u32,
    pub draw: u32,
    pub away_win: u32,
    pub advice: String,
}

// ---------------------------------------------------------------------------
// Live odds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveOddsEntry {
    pub fixture_id: u64,
    pub status: MatchStatus,
    pub league: LeagueRef,
    pub home: TeamGoals,
    pub away: TeamGoals,
    /// Market name → outcomes. Any market or price may be missing.
    pub odds: BTreeMap<String, Vec<OddsOutcome>>,
}

impl LiveOddsEntry {
    /// Price of one outcome in one market, or the `N/A` placeholder.
    pub fn price_label(&self, market: &str, outcome: &str) -> String {
        self.odds
            .get(market)
            .and_then(|outcomes| outcomes.iter().find(|o| o.outcome == outcome))
            .map(OddsOutcome::price_label)
            .unwrap_or_else(|| NOT_AVAILABLE.to_string())
    }

    pub fn score(&self) -> Score {
        Score {
            home: self.home.goals.unwrap_or(0),
            away: self.away.goals.unwrap_or(0),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeagueRef {
    pub id: Option<u64>,
    pub season: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamGoals {
    pub team_id: Option<u64>,
    pub goals: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OddsOutcome {
    pub outcome: String,
    pub price: Option<f64>,
    pub suspended: bool,
}

impl OddsOutcome {
    pub fn price_label(&self) -> String {
        match self.price {
            Some(p) if !self.suspended => format!("{p:.2}"),
            _ => NOT_AVAILABLE.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// In-play predictions
// ---------------------------------------------------------------------------

/// Normalized in-play prediction. Every upstream shape is adapted into this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InPlayPrediction {
    pub id: String,
    pub home_team: String,
    pub away_team: String,
    pub score: Option<String>,
    pub minute: Option<u32>,
    pub advice: Option<String>,
    /// Percentage, 0-100.
    pub probability: Option<f64>,
}
