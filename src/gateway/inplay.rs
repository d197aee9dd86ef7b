use std::str::FromStr;

use serde_json::Value;
use tracing::debug;

use super::{get_json, id_string, lenient_f64, lenient_u32};
use crate::credential::Credential;
use crate::error::GatewayError;
use crate::types::InPlayPrediction;

const KEY_HEADER: &str = "x-api-key";
const HOST_HEADER: &str = "x-api-host";

/// Body layouts seen from in-play prediction providers. Each one has its own
/// adapter; all of them produce `InPlayPrediction`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InPlayFormat {
    /// `{ "predictions": [ { id, home_team, away_team, score, minute, prediction, probability } ] }`
    #[default]
    PredictionsEnvelope,
    /// `{ "data": [ { id, home_team, away_team, prediction, probabilities: { "1": .., "X": .., "2": .. }, result } ] }`
    DataEnvelope,
    /// Top-level array of `PredictionsEnvelope` items.
    BareArray,
    /// `{ "response": [ { fixture, teams, goals, predictions: { advice, percent } } ] }`
    ResponseEnvelope,
}

impl FromStr for InPlayFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "predictions" => Ok(InPlayFormat::PredictionsEnvelope),
            "data" => Ok(InPlayFormat::DataEnvelope),
            "array" => Ok(InPlayFormat::BareArray),
            "response" => Ok(InPlayFormat::ResponseEnvelope),
            other => Err(format!(
                "unknown INPLAY_FORMAT {other:?} (expected predictions, data, array or response)"
            )),
        }
    }
}

impl InPlayFormat {
    /// Normalize a raw decoded body. A body that does not have this format's
    /// top-level shape is an `Upstream` error; individual items missing an id
    /// or team names are skipped.
    pub fn adapt(self, body: &Value) -> Result<Vec<InPlayPrediction>, GatewayError> {
        match self {
            InPlayFormat::PredictionsEnvelope => {
                let items = array_field(body, "predictions")?;
                Ok(items.iter().filter_map(adapt_flat_item).collect())
            }
            InPlayFormat::BareArray => {
                let items = body
                    .as_array()
                    .ok_or_else(|| GatewayError::malformed("in-play body is not an array"))?;
                Ok(items.iter().filter_map(adapt_flat_item).collect())
            }
            InPlayFormat::DataEnvelope => {
                let items = array_field(body, "data")?;
                Ok(items.iter().filter_map(adapt_data_item).collect())
            }
            InPlayFormat::ResponseEnvelope => {
                let items = array_field(body, "response")?;
                Ok(items.iter().filter_map(adapt_response_item).collect())
            }
        }
    }
}

fn array_field<'a>(body: &'a Value, field: &str) -> Result<&'a Vec<Value>, GatewayError> {
    body.get(field)
        .and_then(Value::as_array)
        .ok_or_else(|| GatewayError::malformed(format!("in-play body has no `{field}` array")))
}

fn text(v: &Value, field: &str) -> Option<String> {
    v.get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn adapt_flat_item(v: &Value) -> Option<InPlayPrediction> {
    let id = v.get("id").and_then(id_string)?;
    Some(InPlayPrediction {
        home_team: text(v, "home_team")?,
        away_team: text(v, "away_team")?,
        score: text(v, "score"),
        minute: v.get("minute").and_then(lenient_u32),
        advice: text(v, "prediction"),
        probability: v.get("probability").and_then(lenient_f64),
        id,
    })
}

fn adapt_data_item(v: &Value) -> Option<InPlayPrediction> {
    let id = v.get("id").and_then(id_string)?;
    let advice = text(v, "prediction");
    // Probabilities are fractions keyed by the predicted market ("1", "X", "2", "1X", ...).
    let probability = advice
        .as_deref()
        .and_then(|key| v.get("probabilities")?.get(key))
        .and_then(lenient_f64)
        .map(|p| if p <= 1.0 { p * 100.0 } else { p });
    Some(InPlayPrediction {
        home_team: text(v, "home_team")?,
        away_team: text(v, "away_team")?,
        score: text(v, "result").map(|r| r.replace(' ', "")),
        minute: v.get("minute").and_then(lenient_u32),
        advice,
        probability,
        id,
    })
}

fn adapt_response_item(v: &Value) -> Option<InPlayPrediction> {
    let id = v.get("fixture")?.get("id").and_then(id_string)?;
    let teams = v.get("teams")?;
    let home_team = text(teams.get("home")?, "name")?;
    let away_team = text(teams.get("away")?, "name")?;

    let score = v.get("goals").map(|g| {
        let side = |k: &str| g.get(k).and_then(Value::as_u64).unwrap_or(0);
        format!("{}-{}", side("home"), side("away"))
    });
    let predictions = v.get("predictions");
    // Confidence of the favoured outcome.
    let probability = predictions
        .and_then(|p| p.get("percent"))
        .and_then(Value::as_object)
        .and_then(|pct| pct.values().filter_map(lenient_f64).reduce(f64::max));

    Some(InPlayPrediction {
        id,
        home_team,
        away_team,
        score,
        minute: v
            .get("fixture")
            .and_then(|f| f.get("status"))
            .and_then(|s| s.get("elapsed"))
            .and_then(lenient_u32),
        advice: predictions.and_then(|p| text(p, "advice")),
        probability,
    })
}

/// Client for the in-play predictions provider: a single endpoint whose body
/// is taken as-is and handed to the configured adapter.
#[derive(Debug, Clone)]
pub struct InPlayApi {
    client: reqwest::Client,
    endpoint: String,
    host: Option<String>,
    format: InPlayFormat,
}

impl InPlayApi {
    pub fn new(
        client: reqwest::Client,
        endpoint: impl Into<String>,
        host: Option<String>,
        format: InPlayFormat,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            host,
            format,
        }
    }

    pub async fn get_in_play(&self, credential: &Credential) -> Result<Vec<InPlayPrediction>, GatewayError> {
        let mut req = self
            .client
            .get(&self.endpoint)
            .header(KEY_HEADER, credential.expose());
        if let Some(host) = &self.host {
            req = req.header(HOST_HEADER, host);
        }

        let body = get_json(req).await?;
        let predictions = self.format.adapt(&body)?;
        debug!(
            format = ?self.format,
            items = predictions.len(),
            "In-play predictions decoded",
        );
        Ok(predictions)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[test]
    fn predictions_envelope_adapts_and_skips_incomplete_items() {
        let body = json!({"predictions": [
            {"id": 11, "home_team": "Ajax", "away_team": "PSV", "score": "1-0",
             "minute": "34", "prediction": "Over 2.5", "probability": "62%"},
            {"id": 12, "home_team": "Feyenoord"},
            {"id": 13, "home_team": "AZ", "away_team": "Twente"}
        ]});
        let out = InPlayFormat::PredictionsEnvelope.adapt(&body).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].id, "11");
        assert_eq!(out[0].minute, Some(34));
        assert_eq!(out[0].probability, Some(62.0));
        assert_eq!(out[0].advice.as_deref(), Some("Over 2.5"));
        assert_eq!(out[1].score, None);
        assert_eq!(out[1].probability, None);
    }

    #[test]
    fn data_envelope_scales_fractional_probability() {
        let body = json!({"data": [{
            "id": 81, "home_team": "Lyon", "away_team": "Nice", "prediction": "X",
            "probabilities": {"1": 0.31, "X": 0.42, "2": 0.27}, "result": "1 - 1"
        }]});
        let out = InPlayFormat::DataEnvelope.adapt(&body).unwrap();
        assert_eq!(out[0].score.as_deref(), Some("1-1"));
        let p = out[0].probability.unwrap();
        assert!((p - 42.0).abs() < 1e-9, "p={p}");
    }

    #[test]
    fn response_envelope_takes_favoured_outcome() {
        let body = json!({"response": [{
            "fixture": {"id": 5, "status": {"elapsed": 77}},
            "teams": {"home": {"name": "Roma"}, "away": {"name": "Lazio"}},
            "goals": {"home": null, "away": 1},
            "predictions": {"advice": "Lazio to win", "percent": {"home": "20%", "draw": "30%", "away": "50%"}}
        }]});
        let out = InPlayFormat::ResponseEnvelope.adapt(&body).unwrap();
        assert_eq!(out[0].score.as_deref(), Some("0-1"));
        assert_eq!(out[0].minute, Some(77));
        assert_eq!(out[0].probability, Some(50.0));
    }

    #[test]
    fn wrong_top_level_shape_is_upstream() {
        let err = InPlayFormat::PredictionsEnvelope.adapt(&json!({"data": []})).unwrap_err();
        assert!(matches!(err, GatewayError::Upstream { .. }));
        assert!(InPlayFormat::BareArray.adapt(&json!({})).is_err());
        assert!(InPlayFormat::BareArray.adapt(&json!([])).unwrap().is_empty());
    }

    #[test]
    fn format_names_parse() {
        assert_eq!("Array".parse::<InPlayFormat>().unwrap(), InPlayFormat::BareArray);
        assert!("xml".parse::<InPlayFormat>().is_err());
    }

    #[tokio::test]
    async fn sends_its_own_header_pair() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/inplay"))
            .and(header("x-api-key", "k2"))
            .and(header("x-api-host", "inplay.example"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"predictions": []})))
            .expect(1)
            .mount(&server)
            .await;

        let api = InPlayApi::new(
            reqwest::Client::new(),
            format!("{}/inplay", server.uri()),
            Some("inplay.example".to_string()),
            InPlayFormat::PredictionsEnvelope,
        );
        let out = api.get_in_play(&Credential::new("k2").unwrap()).await.unwrap();
        assert!(out.is_empty());
    }
}
