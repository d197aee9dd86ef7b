//! Display-surface view model: maps a `RefreshState` to what a panel shows.
//!
//! - loading indicator iff a poll is in flight
//! - error message iff the last committed poll failed
//! - rows from the last good data, kept visible under an error

use crate::cell::RefreshState;
use crate::types::{InPlayPrediction, LiveOddsEntry, MatchSummary, PredictionSnapshot, NOT_AVAILABLE};

const FULLTIME_MARKET: &str = "Fulltime Result";

#[derive(Debug, Clone, PartialEq)]
pub struct ViewRow {
    pub primary: String,
    pub secondary: String,
    pub badge: String,
    /// 0-100, drawn as a bar when present.
    pub gauge: Option<u32>,
}

impl ViewRow {
    fn new(primary: impl Into<String>, secondary: impl Into<String>, badge: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            secondary: secondary.into(),
            badge: badge.into(),
            gauge: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PanelView {
    pub title: String,
    pub enabled: bool,
    pub loading: bool,
    pub error: Option<&'static str>,
    pub rows: Vec<ViewRow>,
}

impl PanelView {
    pub fn from_state<T: ToRows>(title: &str, state: &RefreshState<T>) -> Self {
        Self {
            title: title.to_string(),
            enabled: state.enabled,
            loading: state.is_loading,
            error: state.error.map(|e| e.user_message()),
            rows: state.data.as_ref().map(ToRows::to_rows).unwrap_or_default(),
        }
    }

    pub fn is_blank(&self) -> bool {
        !self.loading && self.error.is_none() && self.rows.is_empty()
    }
}

/// Row rendering for one payload type.
pub trait ToRows {
    fn to_rows(&self) -> Vec<ViewRow>;
}

impl<T: ToRows> ToRows for Vec<T> {
    fn to_rows(&self) -> Vec<ViewRow> {
        self.iter().flat_map(ToRows::to_rows).collect()
    }
}

impl ToRows for MatchSummary {
    fn to_rows(&self) -> Vec<ViewRow> {
        let league = match &self.league.country {
            Some(country) if !self.league.name.is_empty() => format!("{} ({country})", self.league.name),
            _ => self.league.name.clone(),
        };
        let mut secondary = format!("ID: {}", self.match_id);
        if !league.is_empty() {
            secondary.push_str(" · ");
            secondary.push_str(&league);
        }
        vec![ViewRow::new(
            format!("{} vs {}", self.home_team, self.away_team),
            secondary,
            format!("{}  {}", self.score, self.status.label()),
        )]
    }
}

impl ToRows for LiveOddsEntry {
    fn to_rows(&self) -> Vec<ViewRow> {
        let secondary = format!(
            "1: {}  X: {}  2: {}  ({} markets)",
            self.price_label(FULLTIME_MARKET, "Home"),
            self.price_label(FULLTIME_MARKET, "Draw"),
            self.price_label(FULLTIME_MARKET, "Away"),
            self.odds.len(),
        );
        vec![ViewRow::new(
            format!("Fixture {}", self.fixture_id),
            secondary,
            format!("{}  {}", self.score(), self.status.label()),
        )]
    }
}

impl ToRows for InPlayPrediction {
    fn to_rows(&self) -> Vec<ViewRow> {
        let minute = self
            .minute
            .map(|m| m.to_string())
            .unwrap_or_else(|| NOT_AVAILABLE.to_string());
        let probability = self
            .probability
            .map(|p| format!("{p:.0}%"))
            .unwrap_or_else(|| NOT_AVAILABLE.to_string());
        let secondary = format!(
            "Minute: {minute} · Advice: {} · Probability: {probability}",
            self.advice.as_deref().unwrap_or("No data"),
        );
        let mut row = ViewRow::new(
            format!("{} vs {}", self.home_team, self.away_team),
            secondary,
            self.score.clone().unwrap_or_else(|| "0-0".to_string()),
        );
        row.gauge = self.probability.map(|p| p.clamp(0.0, 100.0).round() as u32);
        vec![row]
    }
}

impl ToRows for PredictionSnapshot {
    fn to_rows(&self) -> Vec<ViewRow> {
        let bar = |label: String, pct: u32| {
            let mut row = ViewRow::new(label, String::new(), format!("{pct}%"));
            row.gauge = Some(pct.min(100));
            row
        };
        vec![
            ViewRow::new(
                format!("{} vs {}", self.home_team, self.away_team),
                format!("ID: {}", self.match_id),
                String::new(),
            ),
            bar(format!("{} win", self.home_team), self.home_win),
            bar("Draw".to_string(), self.draw),
            bar(format!("{} win", self.away_team), self.away_win),
            ViewRow::new("Advice", self.advice.clone(), String::new()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::error::ErrorKind;
    use crate::types::{LeagueInfo, LeagueRef, MatchStatus, OddsOutcome, Score, TeamGoals};

    fn summary() -> MatchSummary {
        MatchSummary {
            match_id: 42,
            home_team: "Arsenal".into(),
            away_team: "Chelsea".into(),
            score: Score { home: 0, away: 2 },
            status: MatchStatus {
                short: Some("2H".into()),
                long: None,
                elapsed: Some(71),
            },
            kickoff: None,
            league: LeagueInfo {
                name: "Premier League".into(),
                country: Some("England".into()),
            },
        }
    }

    #[test]
    fn error_shown_alongside_stale_rows() {
        let mut state = RefreshState::default();
        state.data = Some(vec![summary()]);
        state.error = Some(ErrorKind::Upstream);

        let view = PanelView::from_state("Live matches", &state);
        assert!(!view.loading);
        assert_eq!(view.error, Some("The data provider returned an error"));
        assert_eq!(view.rows.len(), 1);
        assert_eq!(view.rows[0].badge, "0-2  71'");
        assert_eq!(view.rows[0].secondary, "ID: 42 · Premier League (England)");
    }

    #[test]
    fn loading_iff_in_flight() {
        let mut state: RefreshState<Vec<MatchSummary>> = RefreshState::default();
        assert!(!PanelView::from_state("m", &state).loading);
        state.is_loading = true;
        assert!(PanelView::from_state("m", &state).loading);
    }

    #[test]
    fn empty_list_renders_nothing() {
        let mut state: RefreshState<Vec<MatchSummary>> = RefreshState::default();
        state.data = Some(Vec::new());
        let view = PanelView::from_state("m", &state);
        assert!(view.rows.is_empty());
        assert!(view.is_blank());
    }

    #[test]
    fn in_play_fallbacks() {
        let p = InPlayPrediction {
            id: "1".into(),
            home_team: "Ajax".into(),
            away_team: "PSV".into(),
            score: None,
            minute: None,
            advice: None,
            probability: None,
        };
        let row = &p.to_rows()[0];
        assert_eq!(row.badge, "0-0");
        assert_eq!(row.secondary, "Minute: N/A · Advice: No data · Probability: N/A");
        assert_eq!(row.gauge, None);
    }

    #[test]
    fn odds_row_uses_placeholder_for_missing_prices() {
        let mut odds = BTreeMap::new();
        odds.insert(
            FULLTIME_MARKET.to_string(),
            vec![OddsOutcome { outcome: "Home".into(), price: Some(2.0), suspended: false }],
        );
        let entry = LiveOddsEntry {
            fixture_id: 9,
            status: MatchStatus::default(),
            league: LeagueRef::default(),
            home: TeamGoals { team_id: None, goals: Some(1) },
            away: TeamGoals::default(),
            odds,
        };
        let row = &entry.to_rows()[0];
        assert_eq!(row.secondary, "1: 2.00  X: N/A  2: N/A  (1 markets)");
        assert_eq!(row.badge, "1-0  N/A");
    }

    #[test]
    fn prediction_rows_carry_gauges() {
        let p = PredictionSnapshot {
            match_id: "7".into(),
            home_team: "A".into(),
            away_team: "B".into(),
            home_win: 45,
            draw: 25,
            away_win: 30,
            advice: "Close match".into(),
        };
        let rows = p.to_rows();
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[1].gauge, Some(45));
        assert_eq!(rows[2].badge, "25%");
        assert_eq!(rows[4].secondary, "Close match");
    }
}
