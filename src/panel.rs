//! Panels: named polling cells wired to gateway calls, plus the registry the
//! HTTP API reads from.

use std::sync::{Arc, Mutex, PoisonError};

use dashmap::DashMap;
use futures_util::FutureExt;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::cell::{fetcher, CellConfig, LatencyStats, Phase, PollingCell, RefreshState};
use crate::config::{panels, Config};
use crate::credential::Credential;
use crate::error::{AppError, ErrorKind, GatewayError, Result};
use crate::gateway::{build_client, FootballApi, InPlayApi};
use crate::types::{InPlayPrediction, LiveOddsEntry, MatchSummary, PredictionSnapshot};

/// Serializable view of any panel, independent of its payload type.
#[derive(Debug, Clone, Serialize)]
pub struct PanelSnapshot {
    pub name: String,
    pub phase: Phase,
    pub enabled: bool,
    pub is_loading: bool,
    pub error: Option<ErrorKind>,
    /// Fixed user-facing text for `error`.
    pub message: Option<&'static str>,
    pub interval_ms: Option<u64>,
    pub updated_at_ns: Option<u64>,
    pub polls_started: u64,
    pub polls_settled: u64,
    pub in_flight: u32,
    pub data: Option<Value>,
}

impl PanelSnapshot {
    fn from_state<T: Serialize>(name: &str, interval_ms: Option<u64>, state: &RefreshState<T>) -> Self {
        Self {
            name: name.to_string(),
            phase: state.phase(),
            enabled: state.enabled,
            is_loading: state.is_loading,
            error: state.error,
            message: state.error.map(ErrorKind::user_message),
            interval_ms,
            updated_at_ns: state.updated_at_ns,
            polls_started: state.polls_started,
            polls_settled: state.polls_settled,
            in_flight: state.in_flight(),
            data: state
                .data
                .as_ref()
                .and_then(|d| serde_json::to_value(d).ok()),
        }
    }
}

/// Type-erased panel handle for the API and the registry.
pub trait Panel: Send + Sync {
    fn name(&self) -> &str;
    fn enable(&self);
    fn disable(&self);
    /// Background manual refresh.
    fn trigger_refresh(&self);
    fn snapshot(&self) -> PanelSnapshot;
    fn teardown(&self);
}

impl<T> Panel for PollingCell<T>
where
    T: Serialize + Clone + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        PollingCell::name(self)
    }

    fn enable(&self) {
        PollingCell::enable(self);
    }

    fn disable(&self) {
        PollingCell::disable(self);
    }

    fn trigger_refresh(&self) {
        self.trigger();
    }

    fn snapshot(&self) -> PanelSnapshot {
        let interval_ms = self.interval().map(|d| d.as_millis() as u64);
        PanelSnapshot::from_state(self.name(), interval_ms, &PollingCell::snapshot(self))
    }

    fn teardown(&self) {
        PollingCell::teardown(self);
    }
}

// ---------------------------------------------------------------------------
// Prediction panel
// ---------------------------------------------------------------------------

/// One-shot prediction lookup. Not polled: each `submit` runs exactly one
/// request for the given match id.
pub struct PredictionPanel {
    cell: PollingCell<PredictionSnapshot>,
    /// Last submitted id, re-fetched by a manual refresh.
    match_id: Arc<Mutex<Option<String>>>,
    api: Arc<FootballApi>,
    credential: Credential,
}

impl PredictionPanel {
    pub fn new(api: FootballApi, credential: Credential, config: CellConfig) -> Self {
        let match_id: Arc<Mutex<Option<String>>> = Arc::default();
        let slot = Arc::clone(&match_id);
        let api = Arc::new(api);
        let fetch_api = Arc::clone(&api);
        let fetch_credential = credential.clone();
        let fetch = fetcher(move || {
            let api = Arc::clone(&fetch_api);
            let credential = fetch_credential.clone();
            let id = slot.lock().unwrap_or_else(PoisonError::into_inner).clone();
            async move {
                match id {
                    Some(id) => api.get_prediction(&id, &credential).await,
                    None => Err(GatewayError::NotFound("no match id submitted".to_string())),
                }
            }
        });
        Self {
            cell: PollingCell::new(CellConfig { interval: None, ..config }, fetch),
            match_id,
            api,
            credential,
        }
    }

    /// Look up one match. An empty id is rejected without touching the cell.
    pub async fn submit(&self, match_id: &str) -> Result<()> {
        let id = match_id.trim();
        if id.is_empty() {
            return Err(AppError::InvalidInput("Please enter a match ID".to_string()));
        }
        let id = id.to_string();
        *self.match_id.lock().unwrap_or_else(PoisonError::into_inner) = Some(id.clone());
        info!(panel = %self.cell.name(), match_id = %id, "Prediction requested");

        // The request carries its own id; concurrent submits never share one.
        let api = Arc::clone(&self.api);
        let credential = self.credential.clone();
        self.cell
            .refresh_with(async move { api.get_prediction(&id, &credential).await }.boxed())
            .await;
        Ok(())
    }

    pub fn current_match_id(&self) -> Option<String> {
        self.match_id.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn cell(&self) -> &PollingCell<PredictionSnapshot> {
        &self.cell
    }

    fn has_match_id(&self) -> bool {
        self.current_match_id().is_some()
    }
}

impl Panel for PredictionPanel {
    fn name(&self) -> &str {
        self.cell.name()
    }

    fn enable(&self) {
        if self.has_match_id() {
            self.cell.enable();
        } else {
            debug!(panel = %self.cell.name(), "No match id yet; nothing to fetch");
        }
    }

    fn disable(&self) {
        self.cell.disable();
    }

    fn trigger_refresh(&self) {
        if self.has_match_id() {
            self.cell.trigger();
        }
    }

    fn snapshot(&self) -> PanelSnapshot {
        PanelSnapshot::from_state(self.cell.name(), None, &self.cell.snapshot())
    }

    fn teardown(&self) {
        self.cell.teardown();
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Panels by name, shared with API handlers.
#[derive(Default)]
pub struct PanelRegistry {
    panels: DashMap<String, Arc<dyn Panel>>,
}

impl PanelRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert(&self, panel: Arc<dyn Panel>) {
        self.panels.insert(panel.name().to_string(), panel);
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Panel>> {
        self.panels
            .get(name)
            .map(|p| Arc::clone(p.value()))
            .ok_or_else(|| AppError::UnknownPanel(name.to_string()))
    }

    /// Sorted by name.
    pub fn snapshots(&self) -> Vec<PanelSnapshot> {
        let mut out: Vec<PanelSnapshot> = self.panels.iter().map(|p| p.value().snapshot()).collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    pub fn len(&self) -> usize {
        self.panels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.panels.is_empty()
    }

    pub fn teardown_all(&self) {
        for p in self.panels.iter() {
            p.value().teardown();
        }
    }
}

// ---------------------------------------------------------------------------
// Standard panel set
// ---------------------------------------------------------------------------

/// The panels this application shows, typed for in-process display surfaces.
pub struct Panels {
    pub live_matches: Arc<PollingCell<Vec<MatchSummary>>>,
    pub live_odds: Arc<PollingCell<Vec<LiveOddsEntry>>>,
    pub in_play: Option<Arc<PollingCell<Vec<InPlayPrediction>>>>,
    pub prediction: Arc<PredictionPanel>,
}

impl Panels {
    /// Build every configured panel. Cells configured to start enabled begin
    /// polling immediately, so this must run inside a tokio runtime.
    pub fn build(
        cfg: &Config,
        credential: Credential,
        latency: Arc<LatencyStats>,
    ) -> Result<Self> {
        let client = build_client(cfg.request_timeout)?;
        let football = FootballApi::new(client.clone(), &cfg.football_api_url, &cfg.football_api_host);

        let cell_config = |name: &str, interval, start| {
            CellConfig::new(name, interval)
                .start_enabled(start)
                .settle_policy(cfg.settle_policy)
                .latency(Arc::clone(&latency))
        };

        let live_matches = {
            let api = Arc::new(football.clone());
            let credential = credential.clone();
            Arc::new(PollingCell::new(
                cell_config(panels::LIVE_MATCHES, Some(cfg.matches_poll), cfg.matches_start_enabled),
                fetcher(move || {
                    let api = Arc::clone(&api);
                    let credential = credential.clone();
                    async move { api.get_live_matches(&credential).await }
                }),
            ))
        };

        let live_odds = {
            let api = Arc::new(football.clone());
            let credential = credential.clone();
            Arc::new(PollingCell::new(
                cell_config(panels::LIVE_ODDS, Some(cfg.odds_poll), cfg.odds_start_enabled),
                fetcher(move || {
                    let api = Arc::clone(&api);
                    let credential = credential.clone();
                    async move { api.get_live_odds(&credential).await }
                }),
            ))
        };

        let in_play = match &cfg.inplay_api_url {
            Some(url) => {
                let key = cfg.inplay_api_key.as_deref().ok_or_else(|| {
                    AppError::Config("INPLAY_API_KEY is required when INPLAY_API_URL is set".to_string())
                })?;
                let inplay_credential = Credential::new(key)?;
                let api = Arc::new(InPlayApi::new(
                    client.clone(),
                    url,
                    cfg.inplay_api_host.clone(),
                    cfg.inplay_format,
                ));
                Some(Arc::new(PollingCell::new(
                    cell_config(panels::IN_PLAY, Some(cfg.inplay_poll), cfg.inplay_start_enabled),
                    fetcher(move || {
                        let api = Arc::clone(&api);
                        let credential = inplay_credential.clone();
                        async move { api.get_in_play(&credential).await }
                    }),
                )))
            }
            None => {
                info!("INPLAY_API_URL not set; in-play predictions panel disabled");
                None
            }
        };

        let prediction = Arc::new(PredictionPanel::new(
            football,
            credential,
            cell_config(panels::PREDICTION, None, false),
        ));

        Ok(Self {
            live_matches,
            live_odds,
            in_play,
            prediction,
        })
    }

    pub fn register_all(&self, registry: &PanelRegistry) {
        registry.insert(self.live_matches.clone());
        registry.insert(self.live_odds.clone());
        if let Some(in_play) = &self.in_play {
            registry.insert(in_play.clone());
        }
        registry.insert(self.prediction.clone());
    }

    pub fn teardown_all(&self) {
        self.live_matches.teardown();
        self.live_odds.teardown();
        if let Some(in_play) = &self.in_play {
            in_play.teardown();
        }
        self.prediction.cell().teardown();
    }
}
