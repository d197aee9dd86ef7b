use std::str::FromStr;
use std::time::Duration;

use crate::cell::SettlePolicy;
use crate::error::{AppError, Result};
use crate::gateway::InPlayFormat;

pub const FOOTBALL_API_URL: &str = "https://v3.football.api-sports.io";
pub const FOOTBALL_API_HOST: &str = "v3.football.api-sports.io";

/// Live matches panel refresh interval (milliseconds).
pub const MATCHES_POLL_MS: u64 = 30_000;

/// Live odds dialog refresh interval (milliseconds).
pub const ODDS_POLL_MS: u64 = 15_000;

/// In-play predictions panel refresh interval (milliseconds).
pub const INPLAY_POLL_MS: u64 = 5_000;

/// Floor for any configured poll interval (milliseconds).
pub const MIN_POLL_MS: u64 = 1_000;

/// Per-request timeout for upstream calls (seconds).
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

pub const CREDENTIAL_PATH: &str = "credential.json";

/// Panel names, also used as API path segments.
pub mod panels {
    pub const LIVE_MATCHES: &str = "live_matches";
    pub const LIVE_ODDS: &str = "live_odds";
    pub const IN_PLAY: &str = "in_play";
    pub const PREDICTION: &str = "prediction";
}

#[derive(Debug, Clone)]
pub struct Config {
    pub football_api_url: String,
    pub football_api_host: String,
    /// FOOTBALL_API_KEY. Falls back to the saved credential when unset.
    pub football_api_key: Option<String>,
    /// INPLAY_API_URL: full endpoint URL. The in-play panel exists only when set.
    pub inplay_api_url: Option<String>,
    pub inplay_api_host: Option<String>,
    pub inplay_api_key: Option<String>,
    /// INPLAY_FORMAT: which adapter decodes the in-play body.
    pub inplay_format: InPlayFormat,
    pub matches_poll: Duration,
    pub odds_poll: Duration,
    pub inplay_poll: Duration,
    pub matches_start_enabled: bool,
    /// Odds is a dialog panel: disabled until opened.
    pub odds_start_enabled: bool,
    pub inplay_start_enabled: bool,
    pub settle_policy: SettlePolicy,
    pub request_timeout: Duration,
    pub credential_path: String,
    pub api_port: u16,
    pub log_level: String,
    pub log_json: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let inplay_format = match get("INPLAY_FORMAT") {
            Some(raw) => InPlayFormat::from_str(&raw).map_err(AppError::Config)?,
            None => InPlayFormat::default(),
        };
        let settle_policy = match get("SETTLE_POLICY") {
            Some(raw) => SettlePolicy::from_str(&raw).map_err(AppError::Config)?,
            None => SettlePolicy::default(),
        };

        Ok(Self {
            football_api_url: get("FOOTBALL_API_URL")
                .unwrap_or_else(|| FOOTBALL_API_URL.to_string()),
            football_api_host: get("FOOTBALL_API_HOST")
                .unwrap_or_else(|| FOOTBALL_API_HOST.to_string()),
            football_api_key: get("FOOTBALL_API_KEY"),
            inplay_api_url: get("INPLAY_API_URL"),
            inplay_api_host: get("INPLAY_API_HOST"),
            inplay_api_key: get("INPLAY_API_KEY"),
            inplay_format,
            matches_poll: poll_interval(get("MATCHES_POLL_MS"), "MATCHES_POLL_MS", MATCHES_POLL_MS)?,
            odds_poll: poll_interval(get("ODDS_POLL_MS"), "ODDS_POLL_MS", ODDS_POLL_MS)?,
            inplay_poll: poll_interval(get("INPLAY_POLL_MS"), "INPLAY_POLL_MS", INPLAY_POLL_MS)?,
            matches_start_enabled: parse_bool(get("MATCHES_START_ENABLED"), true),
            odds_start_enabled: parse_bool(get("ODDS_START_ENABLED"), false),
            inplay_start_enabled: parse_bool(get("INPLAY_START_ENABLED"), true),
            settle_policy,
            request_timeout: Duration::from_secs(
                get("REQUEST_TIMEOUT_SECS")
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(REQUEST_TIMEOUT_SECS)
                    .max(1),
            ),
            credential_path: get("CREDENTIAL_PATH").unwrap_or_else(|| CREDENTIAL_PATH.to_string()),
            api_port: get("API_PORT")
                .unwrap_or_else(|| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            log_level: get("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            log_json: get("LOG_FORMAT").is_some_and(|f| f.eq_ignore_ascii_case("json")),
        })
    }

    pub fn inplay_configured(&self) -> bool {
        self.inplay_api_url.is_some()
    }
}

fn poll_interval(raw: Option<String>, name: &str, default_ms: u64) -> Result<Duration> {
    let ms = match raw {
        Some(v) => v
            .parse::<u64>()
            .map_err(|_| AppError::Config(format!("{name} must be a number of milliseconds")))?,
        None => default_ms,
    };
    Ok(Duration::from_millis(ms.max(MIN_POLL_MS)))
}

fn parse_bool(raw: Option<String>, default: bool) -> bool {
    match raw.as_deref().map(str::to_ascii_lowercase).as_deref() {
        Some("1" | "true" | "yes" | "on") => true,
        Some("0" | "false" | "no" | "off") => false,
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_with(pairs: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_match_panel_cadences() {
        let cfg = config_with(&[]).unwrap();
        assert_eq!(cfg.matches_poll, Duration::from_millis(30_000));
        assert_eq!(cfg.odds_poll, Duration::from_millis(15_000));
        assert_eq!(cfg.inplay_poll, Duration::from_millis(5_000));
        assert!(cfg.matches_start_enabled);
        assert!(!cfg.odds_start_enabled);
        assert!(cfg.football_api_key.is_none());
        assert!(!cfg.inplay_configured());
        assert_eq!(cfg.settle_policy, SettlePolicy::LastIssued);
    }

    #[test]
    fn blank_key_counts_as_unset() {
        let cfg = config_with(&[("FOOTBALL_API_KEY", "   ")]).unwrap();
        assert!(cfg.football_api_key.is_none());
    }

    #[test]
    fn interval_is_clamped_to_floor() {
        let cfg = config_with(&[("INPLAY_POLL_MS", "50")]).unwrap();
        assert_eq!(cfg.inplay_poll, Duration::from_millis(MIN_POLL_MS));
    }

    #[test]
    fn bad_interval_is_a_config_error() {
        let err = config_with(&[("ODDS_POLL_MS", "soon")]).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn bad_port_is_a_config_error() {
        assert!(config_with(&[("API_PORT", "99999")]).is_err());
    }

    #[test]
    fn settle_policy_and_format_parse() {
        let cfg = config_with(&[
            ("SETTLE_POLICY", "last_resolved"),
            ("INPLAY_FORMAT", "data"),
            ("ODDS_START_ENABLED", "yes"),
        ])
        .unwrap();
        assert_eq!(cfg.settle_policy, SettlePolicy::LastResolved);
        assert_eq!(cfg.inplay_format, InPlayFormat::DataEnvelope);
        assert!(cfg.odds_start_enabled);
    }
}
