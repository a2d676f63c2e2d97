use std::time::{Duration, Instant};

use log::warn;
use reqwest::blocking::Client;
use serde::Serialize;
use serde_json::Value;

use crate::capture::HttpEvent;

use super::types::{AiErrorCode, AiResult, ClassifierConfig};

/// Wire body for a classification request. `request_id` is omitted
/// entirely (rather than sent as `null`) when absent.
#[derive(Debug, Serialize)]
struct ClassifyRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    request_id: Option<&'a str>,
    host: &'a str,
    path: &'a str,
}

/// A classifier client bound to one endpoint/timeout/token configuration
/// for the life of the process.
pub struct ClassifierClient {
    http: Client,
    config: ClassifierConfig,
}

impl ClassifierClient {
    pub fn new(config: ClassifierConfig) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .timeout(Duration::from_millis(config.total_timeout_ms))
            .build()?;
        Ok(Self { http, config })
    }

    /// Classifies one request. Always returns a populated [`AiResult`]:
    /// failures are recorded as an error code, never propagated as a `Result`.
    pub fn classify(&self, event: &HttpEvent, request_id: Option<&str>) -> AiResult {
        if self.config.endpoint.is_empty() {
            return AiResult {
                error_code: AiErrorCode::Curl,
                raw: "classifier endpoint not configured".to_string(),
                ..Default::default()
            };
        }

        if event.host.is_empty() {
            return AiResult {
                error_code: AiErrorCode::Empty,
                raw: "empty_event".to_string(),
                ..Default::default()
            };
        }

        let path = if event.path.is_empty() { "/" } else { &event.path };
        let body = ClassifyRequest {
            request_id: request_id.filter(|id| !id.is_empty()),
            host: &event.host,
            path,
        };

        let mut request = self.http.post(&self.config.endpoint).json(&body);
        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token);
        }

        let t0 = Instant::now();
        let response = request.send();
        let latency_ms = t0.elapsed().as_millis() as i64;

        let response = match response {
            Ok(resp) => resp,
            Err(e) => {
                let error_code = if e.is_timeout() {
                    AiErrorCode::Timeout
                } else {
                    AiErrorCode::Curl
                };
                warn!("classifier request failed: {e}");
                return AiResult {
                    error_code,
                    latency_ms,
                    raw: e.to_string(),
                    ..Default::default()
                };
            }
        };

        let http_status = response.status().as_u16() as i32;
        if !response.status().is_success() {
            let body_text = response.text().unwrap_or_default();
            return AiResult {
                error_code: AiErrorCode::Http,
                http_status,
                latency_ms,
                raw: body_text,
                ..Default::default()
            };
        }

        let body_text = match response.text() {
            Ok(text) => text,
            Err(e) => {
                return AiResult {
                    error_code: AiErrorCode::Parse,
                    http_status,
                    latency_ms,
                    raw: e.to_string(),
                    ..Default::default()
                }
            }
        };

        parse_classifier_response(&body_text, http_status, latency_ms)
    }
}

/// Tolerant JSON parse: only `score` and `label` are required; everything
/// else (including a body that isn't an object, or has extra fields) is
/// accepted as long as those two keys are present with the right types.
fn parse_classifier_response(body: &str, http_status: i32, latency_ms: i64) -> AiResult {
    let value: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(_) => {
            return AiResult {
                error_code: AiErrorCode::Parse,
                http_status,
                latency_ms,
                raw: body.to_string(),
                ..Default::default()
            }
        }
    };

    let score = value.get("score").and_then(Value::as_f64);
    let label = value.get("label").and_then(Value::as_str);

    let (Some(score), Some(label)) = (score, label) else {
        return AiResult {
            error_code: AiErrorCode::Parse,
            http_status,
            latency_ms,
            raw: body.to_string(),
            ..Default::default()
        };
    };

    let model_version = value
        .get("model_version")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();

    AiResult {
        ok: true,
        score,
        label: label.to_string(),
        model_version,
        http_status,
        error_code: AiErrorCode::Ok,
        latency_ms,
        raw: String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_response() {
        let r = parse_classifier_response(r#"{"score":0.9,"label":"malicious"}"#, 200, 10);
        assert!(r.ok);
        assert_eq!(r.score, 0.9);
        assert_eq!(r.label, "malicious");
        assert_eq!(r.model_version, "unknown");
    }

    #[test]
    fn missing_score_is_a_parse_error() {
        let r = parse_classifier_response(r#"{"label":"benign"}"#, 200, 10);
        assert!(!r.ok);
        assert_eq!(r.error_code, AiErrorCode::Parse);
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let r = parse_classifier_response("not json", 200, 10);
        assert!(!r.ok);
        assert_eq!(r.error_code, AiErrorCode::Parse);
    }

    #[test]
    fn model_version_defaults_when_absent() {
        let r = parse_classifier_response(r#"{"score":0.1,"label":"benign"}"#, 200, 10);
        assert_eq!(r.model_version, "unknown");
    }
}
