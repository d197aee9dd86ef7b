//! Remote data gateway: one function per logical query, one HTTP call each,
//! normalized into the types in `crate::types`. No retries at this layer.

mod football;
mod inplay;

use std::time::Duration;

use reqwest::RequestBuilder;
use serde_json::Value;

use crate::error::{AppError, GatewayError};

pub use football::FootballApi;
pub use inplay::{InPlayApi, InPlayFormat};

pub fn build_client(timeout: Duration) -> Result<reqwest::Client, AppError> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

/// Send and decode a JSON body. Transport failures are `Network`, non-2xx
/// replies are `Upstream` with the status text, undecodable bodies are
/// `Upstream` too.
async fn get_json(req: RequestBuilder) -> Result<Value, GatewayError> {
    let resp = req.send().await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(GatewayError::upstream(
            status.as_u16(),
            status.canonical_reason().unwrap_or("unknown status"),
        ));
    }
    let body = resp.bytes().await?;
    serde_json::from_slice(&body)
        .map_err(|e| GatewayError::malformed(format!("invalid JSON body: {e}")))
}

/// Accepts `12`, `"12"`, `"12%"` and `"12.5%"`.
fn lenient_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse().ok(),
        _ => None,
    }
}

fn lenient_u32(v: &Value) -> Option<u32> {
    match v {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Ids arrive as numbers from some providers and strings from others.
fn id_string(v: &Value) -> Option<String> {
    match v {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn lenient_numbers() {
        assert_eq!(lenient_f64(&json!(62)), Some(62.0));
        assert_eq!(lenient_f64(&json!("62%")), Some(62.0));
        assert_eq!(lenient_f64(&json!(" 12.5 % ")), Some(12.5));
        assert_eq!(lenient_f64(&json!(null)), None);
        assert_eq!(lenient_u32(&json!("34")), Some(34));
        assert_eq!(lenient_u32(&json!(-1)), None);
    }

    #[test]
    fn ids_from_numbers_or_strings() {
        assert_eq!(id_string(&json!(1035037)), Some("1035037".to_string()));
        assert_eq!(id_string(&json!("abc")), Some("abc".to_string()));
        assert_eq!(id_string(&json!("")), None);
    }
}
