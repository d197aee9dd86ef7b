use std::collections::BTreeMap;
use std::time::Instant;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use super::{get_json, lenient_f64};
use crate::credential::Credential;
use crate::error::GatewayError;
use crate::types::{
    LeagueInfo, LeagueRef, LiveOddsEntry, MatchStatus, MatchSummary, OddsOutcome,
    PredictionSnapshot, Score, TeamGoals,
};

const KEY_HEADER: &str = "x-rapidapi-key";
const HOST_HEADER: &str = "x-rapidapi-host";

/// Client for the fixtures / predictions / odds provider. Every payload
/// arrives wrapped in a `{ "errors": ..., "response": [...] }` envelope.
#[derive(Debug, Clone)]
pub struct FootballApi {
    client: reqwest::Client,
    base_url: String,
    host: String,
}

impl FootballApi {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            host: host.into(),
        }
    }

    /// All fixtures currently in play. Null goals normalize to 0.
    pub async fn get_live_matches(&self, credential: &Credential) -> Result<Vec<MatchSummary>, GatewayError> {
        let items: Vec<RawFixture> = self.fetch_envelope("/fixtures", &[("live", "all")], credential).await?;
        Ok(items.into_iter().map(RawFixture::into_summary).collect())
    }

    /// Win probabilities for one fixture. An empty result is `NotFound`.
    pub async fn get_prediction(
        &self,
        match_id: &str,
        credential: &Credential,
    ) -> Result<PredictionSnapshot, GatewayError> {
        let items: Vec<RawPrediction> = self
            .fetch_envelope("/predictions", &[("fixture", match_id)], credential)
            .await?;
        let Some(first) = items.into_iter().next() else {
            return Err(GatewayError::NotFound(format!("no prediction for fixture {match_id}")));
        };
        first.into_snapshot(match_id)
    }

    /// In-play odds for every live fixture. Missing markets or prices are kept
    /// as absent values, never errors.
    pub async fn get_live_odds(&self, credential: &Credential) -> Result<Vec<LiveOddsEntry>, GatewayError> {
        let items: Vec<RawLiveOdds> = self.fetch_envelope("/odds/live", &[], credential).await?;
        Ok(items.into_iter().map(RawLiveOdds::into_entry).collect())
    }

    async fn fetch_envelope<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        credential: &Credential,
    ) -> Result<Vec<T>, GatewayError> {
        let url = format!("{}{}", self.base_url, path);
        let started = Instant::now();
        let req = self
            .client
            .get(&url)
            .query(query)
            .header(KEY_HEADER, credential.expose())
            .header(HOST_HEADER, &self.host);

        let body = get_json(req).await?;
        let envelope = unwrap_envelope(body)?;
        let count = envelope.len();
        let items = envelope
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<T>, _>>()
            .map_err(|e| GatewayError::malformed(format!("unexpected {path} item: {e}")))?;

        debug!(
            endpoint = path,
            items = count,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Upstream call complete",
        );
        Ok(items)
    }
}

/// Pull the `response` array out of the envelope. The provider reports bad
/// keys and exhausted quotas as 200 replies with a non-empty `errors` field.
fn unwrap_envelope(body: Value) -> Result<Vec<Value>, GatewayError> {
    if let Some(errors) = body.get("errors") {
        let has_errors = match errors {
            Value::Array(a) => !a.is_empty(),
            Value::Object(o) => !o.is_empty(),
            Value::Null => false,
            _ => true,
        };
        if has_errors {
            return Err(GatewayError::malformed(describe_errors(errors)));
        }
    }

    match body {
        Value::Object(mut map) => match map.remove("response") {
            Some(Value::Array(items)) => Ok(items),
            Some(_) => Err(GatewayError::malformed("`response` is not an array")),
            None => Err(GatewayError::malformed("missing `response` field")),
        },
        _ => Err(GatewayError::malformed("response body is not an object")),
    }
}

fn describe_errors(errors: &Value) -> String {
    match errors {
        Value::Object(o) => o
            .iter()
            .map(|(k, v)| match v.as_str() {
                Some(s) => format!("{k}: {s}"),
                None => format!("{k}: {v}"),
            })
            .collect::<Vec<_>>()
            .join("; "),
        other => other.to_string(),
    }
}

/// Integer percentage from strings like `"45%"`: the leading digits count,
/// anything after them is ignored. No leading digits is an error.
pub(crate) fn parse_percent(raw: Option<&str>) -> Result<u32, GatewayError> {
    let s = raw.map(str::trim).unwrap_or("");
    let digits: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits
        .parse::<u32>()
        .map_err(|_| GatewayError::malformed(format!("unparseable percentage {s:?}")))
}

// ---------------------------------------------------------------------------
// Raw upstream shapes (private to this module)
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct RawStatus {
    long: Option<String>,
    short: Option<String>,
    elapsed: Option<u32>,
}

impl From<RawStatus> for MatchStatus {
    fn from(s: RawStatus) -> Self {
        MatchStatus {
            short: s.short,
            long: s.long,
            elapsed: s.elapsed,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawFixtureInfo {
    id: u64,
    date: Option<String>,
    #[serde(default)]
    status: RawStatus,
}

#[derive(Debug, Default, Deserialize)]
struct RawTeam {
    id: Option<u64>,
    name: Option<String>,
    goals: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct RawTeams {
    #[serde(default)]
    home: RawTeam,
    #[serde(default)]
    away: RawTeam,
}

#[derive(Debug, Default, Deserialize)]
struct RawGoals {
    home: Option<u32>,
    away: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct RawLeague {
    id: Option<u64>,
    name: Option<String>,
    country: Option<String>,
    season: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RawFixture {
    fixture: RawFixtureInfo,
    #[serde(default)]
    league: RawLeague,
    #[serde(default)]
    teams: RawTeams,
    #[serde(default)]
    goals: RawGoals,
}

impl RawFixture {
    fn into_summary(self) -> MatchSummary {
        MatchSummary {
            match_id: self.fixture.id,
            home_team: self.teams.home.name.unwrap_or_default(),
            away_team: self.teams.away.name.unwrap_or_default(),
            score: Score {
                home: self.goals.home.unwrap_or(0),
                away: self.goals.away.unwrap_or(0),
            },
            status: self.fixture.status.into(),
            kickoff: self.fixture.date,
            league: LeagueInfo {
                name: self.league.name.unwrap_or_default(),
                country: self.league.country,
            },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawPercent {
    home: Option<String>,
    draw: Option<String>,
    away: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawPredictionBody {
    advice: Option<String>,
    #[serde(default)]
    percent: RawPercent,
}

#[derive(Debug, Deserialize)]
struct RawPrediction {
    predictions: RawPredictionBody,
    #[serde(default)]
    teams: RawTeams,
}

impl RawPrediction {
    fn into_snapshot(self, match_id: &str) -> Result<PredictionSnapshot, GatewayError> {
        let percent = &self.predictions.percent;
        Ok(PredictionSnapshot {
            match_id: match_id.to_string(),
            home_team: self.teams.home.name.unwrap_or_default(),
            away_team: self.teams.away.name.unwrap_or_default(),
            home_win: parse_percent(percent.home.as_deref())?,
            draw: parse_percent(percent.draw.as_deref())?,
            away_win: parse_percent(percent.away.as_deref())?,
            advice: self.predictions.advice.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawOddsValue {
    value: Option<Value>,
    odd: Option<Value>,
    handicap: Option<Value>,
    #[serde(default)]
    suspended: bool,
}

#[derive(Debug, Deserialize)]
struct RawOddsMarket {
    name: Option<String>,
    #[serde(default)]
    values: Vec<RawOddsValue>,
}

#[derive(Debug, Deserialize)]
struct RawLiveOdds {
    fixture: RawFixtureInfo,
    #[serde(default)]
    league: RawLeague,
    #[serde(default)]
    teams: RawTeams,
    #[serde(default)]
    odds: Vec<RawOddsMarket>,
}

impl RawLiveOdds {
    fn into_entry(self) -> LiveOddsEntry {
        let mut odds: BTreeMap<String, Vec<OddsOutcome>> = BTreeMap::new();
        for market in self.odds {
            let Some(name) = market.name.filter(|n| !n.is_empty()) else {
                continue;
            };
            let outcomes: Vec<OddsOutcome> = market
                .values
                .into_iter()
                .filter_map(|v| {
                    let label = v.value.as_ref().and_then(scalar_text)?;
                    let outcome = match v.handicap.as_ref().and_then(scalar_text) {
                        Some(h) if !h.is_empty() => format!("{label} {h}"),
                        _ => label,
                    };
                    Some(OddsOutcome {
                        outcome,
                        price: v.odd.as_ref().and_then(lenient_f64),
                        suspended: v.suspended,
                    })
                })
                .collect();
            odds.entry(name).or_default().extend(outcomes);
        }

        LiveOddsEntry {
            fixture_id: self.fixture.id,
            status: self.fixture.status.into(),
            league: LeagueRef {
                id: self.league.id,
                season: self.league.season,
            },
            home: TeamGoals {
                team_id: self.teams.home.id,
                goals: self.teams.home.goals,
            },
            away: TeamGoals {
                team_id: self.teams.away.id,
                goals: self.teams.away.goals,
            },
            odds,
        }
    }
}

fn scalar_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    async fn api_for(server: &MockServer) -> FootballApi {
        FootballApi::new(reqwest::Client::new(), server.uri(), "v3.football.api-sports.io")
    }

    fn credential() -> Credential {
        Credential::new("abc").unwrap()
    }

    #[tokio::test]
    async fn null_home_goals_default_to_zero() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/fixtures"))
            .and(query_param("live", "all"))
            .and(header("x-rapidapi-key", "abc"))
            .and(header("x-rapidapi-host", "v3.football.api-sports.io"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "errors": [],
                "response": [{
                    "fixture": {"id": 1035037, "date": "2024-02-20T20:00:00+00:00",
                                "status": {"long": "Second Half", "short": "2H", "elapsed": 71}},
                    "league": {"id": 39, "name": "Premier League", "country": "England"},
                    "teams": {"home": {"id": 1, "name": "Arsenal"}, "away": {"id": 2, "name": "Chelsea"}},
                    "goals": {"home": null, "away": 2}
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let matches = api_for(&server).await.get_live_matches(&credential()).await.unwrap();
        assert_eq!(matches.len(), 1);
        let m = &matches[0];
        assert_eq!(m.match_id, 1035037);
        assert_eq!(m.home_team, "Arsenal");
        assert_eq!(m.score.to_string(), "0-2");
        assert_eq!(m.status.label(), "71'");
        assert_eq!(m.league.country.as_deref(), Some("England"));
    }

    #[tokio::test]
    async fn absent_goals_object_defaults_both_sides() {
        let server = MockServer::start().await;
        Mock::given(path("/fixtures"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "response": [{
                    "fixture": {"id": 7},
                    "teams": {"home": {"name": "A"}, "away": {"name": "B"}}
                }]
            })))
            .mount(&server)
            .await;

        let matches = api_for(&server).await.get_live_matches(&credential()).await.unwrap();
        assert_eq!(matches[0].score.to_string(), "0-0");
    }

    #[tokio::test]
    async fn null_names_do_not_fail_the_list() {
        let server = MockServer::start().await;
        Mock::given(path("/fixtures"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "response": [
                    {
                        "fixture": {"id": 7},
                        "league": {"id": 39, "name": null},
                        "teams": {"home": {"id": 1, "name": null}, "away": {"id": 2, "name": "B"}},
                        "goals": {"home": 1, "away": 0}
                    },
                    {
                        "fixture": {"id": 8},
                        "teams": {"home": {"name": "C"}, "away": {"name": "D"}}
                    }
                ]
            })))
            .mount(&server)
            .await;

        let matches = api_for(&server).await.get_live_matches(&credential()).await.unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].home_team, "");
        assert_eq!(matches[0].away_team, "B");
        assert_eq!(matches[0].league.name, "");
        assert_eq!(matches[1].home_team, "C");
    }

    #[tokio::test]
    async fn non_2xx_is_upstream_with_status_text() {
        let server = MockServer::start().await;
        Mock::given(path("/fixtures"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = api_for(&server).await.get_live_matches(&credential()).await.unwrap_err();
        assert_eq!(err, GatewayError::upstream(503, "Service Unavailable"));
    }

    #[tokio::test]
    async fn errors_field_on_200_is_upstream() {
        let server = MockServer::start().await;
        Mock::given(path("/fixtures"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "errors": {"token": "Error/Missing application key in the header"},
                "response": []
            })))
            .mount(&server)
            .await;

        let err = api_for(&server).await.get_live_matches(&credential()).await.unwrap_err();
        match err {
            GatewayError::Upstream { message, .. } => assert!(message.contains("Missing application key")),
            other => panic!("expected Upstream, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn garbage_body_is_upstream() {
        let server = MockServer::start().await;
        Mock::given(path("/fixtures"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = api_for(&server).await.get_live_matches(&credential()).await.unwrap_err();
        assert!(matches!(err, GatewayError::Upstream { status: 200, .. }));
    }

    #[tokio::test]
    async fn connection_refused_is_network() {
        // Nothing listens on the discard port.
        let api = FootballApi::new(reqwest::Client::new(), "http://127.0.0.1:9", "host");
        let err = api.get_live_matches(&credential()).await.unwrap_err();
        assert!(matches!(err, GatewayError::Network(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn empty_prediction_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(path("/predictions"))
            .and(query_param("fixture", "999"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"errors": [], "response": []})))
            .mount(&server)
            .await;

        let err = api_for(&server).await.get_prediction("999", &credential()).await.unwrap_err();
        assert!(matches!(err, GatewayError::NotFound(_)));
    }

    #[tokio::test]
    async fn prediction_percentages_parse_from_strings() {
        let server = MockServer::start().await;
        Mock::given(path("/predictions"))
            .and(query_param("fixture", "198772"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "response": [{
                    "predictions": {
                        "advice": "Double chance : draw or Arsenal",
                        "percent": {"home": "45%", "draw": "45%", "away": "10%"}
                    },
                    "teams": {"home": {"id": 1, "name": "Arsenal"}, "away": {"id": 2, "name": "Chelsea"}}
                }]
            })))
            .mount(&server)
            .await;

        let p = api_for(&server).await.get_prediction("198772", &credential()).await.unwrap();
        assert_eq!((p.home_win, p.draw, p.away_win), (45, 45, 10));
        assert_eq!(p.advice, "Double chance : draw or Arsenal");
        assert_eq!(p.home_team, "Arsenal");
        assert_eq!(p.match_id, "198772");
    }

    #[tokio::test]
    async fn unparseable_percentage_is_upstream_not_zero() {
        let server = MockServer::start().await;
        Mock::given(path("/predictions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "response": [{
                    "predictions": {"advice": "x", "percent": {"home": "n/a", "draw": "45%", "away": "10%"}},
                    "teams": {"home": {"name": "A"}, "away": {"name": "B"}}
                }]
            })))
            .mount(&server)
            .await;

        let err = api_for(&server).await.get_prediction("1", &credential()).await.unwrap_err();
        assert!(matches!(err, GatewayError::Upstream { .. }));
    }

    #[tokio::test]
    async fn live_odds_tolerate_partial_tables() {
        let server = MockServer::start().await;
        Mock::given(path("/odds/live"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "response": [{
                    "fixture": {"id": 721238, "status": {"long": "Second Half", "elapsed": 62}},
                    "league": {"id": 30, "season": 2022},
                    "teams": {"home": {"id": 1563, "goals": 1}, "away": {"id": 1565, "goals": null}},
                    "odds": [
                        {"id": 59, "name": "Fulltime Result", "values": [
                            {"value": "Home", "odd": "1.44", "suspended": false},
                            {"value": "Draw", "odd": null, "suspended": false},
                            {"value": "Away", "odd": "7.5", "suspended": true}
                        ]},
                        {"id": 36, "name": "Over/Under Line", "values": [
                            {"value": "Over", "odd": "2.1", "handicap": "2.5", "main": true, "suspended": false}
                        ]},
                        {"id": 1, "name": "Empty Market"}
                    ]
                }, {
                    "fixture": {"id": 5}
                }]
            })))
            .mount(&server)
            .await;

        let entries = api_for(&server).await.get_live_odds(&credential()).await.unwrap();
        assert_eq!(entries.len(), 2);

        let e = &entries[0];
        assert_eq!(e.fixture_id, 721238);
        assert_eq!(e.score().to_string(), "1-0");
        assert_eq!(e.price_label("Fulltime Result", "Home"), "1.44");
        assert_eq!(e.price_label("Fulltime Result", "Draw"), "N/A");
        assert_eq!(e.price_label("Fulltime Result", "Away"), "N/A");
        assert_eq!(e.price_label("Over/Under Line", "Over 2.5"), "2.10");
        assert!(e.odds["Empty Market"].is_empty());

        assert!(entries[1].odds.is_empty());
    }

    #[test]
    fn percent_takes_leading_digits() {
        assert_eq!(parse_percent(Some("45%")).unwrap(), 45);
        assert_eq!(parse_percent(Some("45.5%")).unwrap(), 45);
        assert_eq!(parse_percent(Some(" 7 ")).unwrap(), 7);
        assert!(parse_percent(Some("%")).is_err());
        assert!(parse_percent(None).is_err());
    }
}
