//! Remote CPU temperature reading.
//!
//! The temperature comes from a monitoring endpoint that serves its sensors as
//! a JSON tree (LibreHardwareMonitor's `data.json` layout): nodes are objects
//! with a `Text` label, an optional `Value` and an optional `Children` list, and
//! any node may itself be a list of nodes.
//!
//! The endpoint is untrusted. [`RemoteTemperatureFetcher::fetch`] never fails;
//! every problem ends up as the `0.0` sentinel and a warning.

use std::future::Future;

use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::RemoteConfig;
use crate::error::StatlinkError;

/// Reading reported when the temperature is unavailable.
pub const UNAVAILABLE: f64 = 0.0;

const LABEL_KEY: &str = "Text";
const VALUE_KEY: &str = "Value";
const CHILDREN_KEY: &str = "Children";

/// Why a single fetch produced no reading.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network error, timeout or unreadable body.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The endpoint answered with something other than 200.
    #[error("unexpected HTTP status {0}")]
    Status(StatusCode),

    /// The body is not JSON.
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// No node carries the sensor label.
    #[error("sensor '{0}' not found")]
    SensorNotFound(String),

    /// The sensor node exists but its value is missing or not numeric.
    #[error("sensor '{label}' has unusable value {value}")]
    InvalidValue {
        /// Sensor label.
        label: String,
        /// The raw value as found in the tree.
        value: String,
    },
}

/// Anything that can provide the current temperature in °C.
///
/// Implementations must not fail; unavailable readings are [`UNAVAILABLE`].
pub trait TemperatureSource: Send + Sync {
    /// Current temperature, or `0.0` when unavailable.
    fn fetch(&self) -> impl Future<Output = f64> + Send;
}

/// Reads one labelled sensor from a remote JSON sensor tree over HTTP.
pub struct RemoteTemperatureFetcher {
    client: reqwest::Client,
    url: String,
    username: String,
    password: Option<String>,
    sensor_label: String,
}

impl RemoteTemperatureFetcher {
    /// Build a fetcher with the configured endpoint, credentials and timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: &RemoteConfig) -> crate::error::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| StatlinkError::RemoteClientError(e.to_string()))?;

        Ok(Self {
            client,
            url: config.url.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            sensor_label: config.sensor_label.clone(),
        })
    }

    /// Perform one request and extract the sensor value.
    ///
    /// # Errors
    ///
    /// Returns the reason no reading could be produced.
    pub async fn try_fetch(&self) -> Result<f64, FetchError> {
        let mut request = self.client.get(&self.url);
        if !self.username.is_empty() {
            request = request.basic_auth(&self.username, self.password.as_deref());
        }

        let response = request.send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(FetchError::Status(status));
        }

        let body = response.bytes().await?;
        let tree: Value = serde_json::from_slice(&body)?;

        let node = find_labelled(&tree, &self.sensor_label)
            .ok_or_else(|| FetchError::SensorNotFound(self.sensor_label.clone()))?;

        let raw = node.get(VALUE_KEY).unwrap_or(&Value::Null);
        parse_reading(raw).ok_or_else(|| FetchError::InvalidValue {
            label: self.sensor_label.clone(),
            value: raw.to_string(),
        })
    }
}

impl TemperatureSource for RemoteTemperatureFetcher {
    async fn fetch(&self) -> f64 {
        match self.try_fetch().await {
            Ok(celsius) => {
                debug!(celsius, "Remote temperature fetched");
                celsius
            }
            Err(e) => {
                warn!(url = %self.url, error = %e, "Remote temperature unavailable");
                UNAVAILABLE
            }
        }
    }
}

/// Find the first node, in document order, whose label equals `label`.
///
/// Walks the tree pre-order with an explicit stack, so a hostile document can
/// not exhaust the call stack. Scalars and unexpected shapes are skipped.
#[must_use]
pub fn find_labelled<'a>(tree: &'a Value, label: &str) -> Option<&'a Value> {
    let mut stack: Vec<&Value> = vec![tree];

    while let Some(node) = stack.pop() {
        match node {
            Value::Object(fields) => {
                if fields.get(LABEL_KEY).and_then(Value::as_str) == Some(label) {
                    return Some(node);
                }
                if let Some(Value::Array(children)) = fields.get(CHILDREN_KEY) {
                    stack.extend(children.iter().rev());
                }
            }
            Value::Array(items) => stack.extend(items.iter().rev()),
            Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {}
        }
    }

    None
}

/// Interpret a sensor value such as `"36,5 °C"`, `"36.5"` or `36.5`.
///
/// Accepts a comma or dot decimal separator and ignores a trailing unit.
/// The result is rounded to one decimal, ties to even on the exact value
/// (`0.25` becomes `0.2`).
#[must_use]
pub fn parse_reading(raw: &Value) -> Option<f64> {
    let value = match raw {
        Value::Number(number) => number.as_f64()?,
        Value::String(text) => parse_numeric_text(text)?,
        _ => return None,
    };
    round_tenths(value).filter(|rounded| rounded.is_finite())
}

fn parse_numeric_text(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    let end = trimmed.rfind(|c: char| c.is_ascii_digit())? + 1;
    trimmed[..end].trim().replace(',', ".").parse().ok()
}

// Formatting rounds the exact binary value and never overflows, unlike scaling by ten.
fn round_tenths(value: f64) -> Option<f64> {
    format!("{value:.1}").parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TelemetrySample;
    use axum::http::{HeaderMap, StatusCode as AxumStatus};
    use axum::routing::get;
    use axum::Router;
    use serde_json::json;
    use std::time::Duration;

    fn lhm_tree(core_average: Value) -> Value {
        json!({
            "id": 0,
            "Text": "Sensor",
            "Children": [{
                "Text": "DESKTOP-01",
                "Children": [{
                    "Text": "Intel Core i7",
                    "Children": [
                        {"Text": "Clocks", "Children": [{"Text": "Bus Speed", "Value": "100,0 MHz"}]},
                        {"Text": "Temperatures", "Children": [
                            {"Text": "CPU Package", "Value": "61,0 °C"},
                            {"Text": "Core Average", "Value": core_average}
                        ]}
                    ]
                }]
            }]
        })
    }

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/data.json")
    }

    fn fetcher_for(url: String) -> RemoteTemperatureFetcher {
        RemoteTemperatureFetcher::new(&RemoteConfig {
            url,
            password: Some("lhm".to_string()),
            timeout_ms: 500,
            ..RemoteConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_decimal_separator_variants_agree() {
        for raw in ["36.5", "36,5", "36.5°C", "36,5 °C", " 36.5 "] {
            assert_eq!(parse_reading(&json!(raw)), Some(36.5), "input {raw:?}");
        }
        assert_eq!(parse_reading(&json!(36.5)), Some(36.5));
    }

    #[test]
    fn test_reading_is_rounded_to_one_decimal() {
        assert_eq!(parse_reading(&json!("55.34 °C")), Some(55.3));
        assert_eq!(parse_reading(&json!("-4,96")), Some(-5.0));
    }

    #[test]
    fn test_ties_round_to_even() {
        assert_eq!(parse_reading(&json!("0.25")), Some(0.2));
        assert_eq!(parse_reading(&json!("36,25 °C")), Some(36.2));
        assert_eq!(parse_reading(&json!("36.35")), Some(36.4));
        assert_eq!(parse_reading(&json!(-0.75)), Some(-0.8));
    }

    #[test]
    fn test_unusable_readings() {
        for raw in [json!("°C"), json!(""), json!("hot"), json!(null), json!(true), json!([])] {
            assert_eq!(parse_reading(&raw), None, "input {raw}");
        }
        assert_eq!(parse_reading(&json!("1e999 °C")), None);
    }

    #[test]
    fn test_huge_reading_stays_a_number_in_payload() {
        let celsius = parse_reading(&json!("1e308 °C")).unwrap();
        assert!(celsius.is_finite());

        let sample = TelemetrySample {
            temperature_c: celsius,
            ..TelemetrySample::default()
        };
        let payload = String::from_utf8(sample.to_payload().unwrap()).unwrap();
        assert!(!payload.contains("null"), "{payload}");
    }

    #[test]
    fn test_first_match_in_document_order_wins() {
        let tree = json!([
            {"Text": "Board", "Children": [
                {"Text": "Nested", "Children": [{"Text": "Core Average", "Value": "40,0 °C"}]}
            ]},
            {"Text": "Core Average", "Value": "70,0 °C"}
        ]);
        let node = find_labelled(&tree, "Core Average").unwrap();
        assert_eq!(node["Value"], "40,0 °C");
    }

    #[test]
    fn test_parent_matches_before_children() {
        let tree = json!({"Text": "Core Average", "Value": "1", "Children": [
            {"Text": "Core Average", "Value": "2"}
        ]});
        assert_eq!(find_labelled(&tree, "Core Average").unwrap()["Value"], "1");
    }

    #[test]
    fn test_search_tolerates_odd_shapes() {
        let tree = json!({"Text": "root", "Children": [
            null, 3, "Core Average", {"Children": "not a list"}, [[{"Text": 7}]],
            {"Text": "Core Average", "Value": "36,5"}
        ]});
        assert_eq!(find_labelled(&tree, "Core Average").unwrap()["Value"], "36,5");
        assert!(find_labelled(&json!("Core Average"), "Core Average").is_none());
        assert!(find_labelled(&json!({"text": "Core Average"}), "Core Average").is_none());
    }

    #[test]
    fn test_deeply_nested_match_is_found() {
        let mut tree = json!({"Text": "Core Average", "Value": "36.5"});
        for _ in 0..2_000 {
            tree = json!({"Text": "level", "Children": [tree]});
        }
        assert_eq!(find_labelled(&tree, "Core Average").unwrap()["Value"], "36.5");
    }

    #[tokio::test]
    async fn test_fetch_reads_core_average_with_basic_auth() {
        let router = Router::new().route(
            "/data.json",
            get(|headers: HeaderMap| async move {
                // "admin:lhm"
                if headers.get("authorization").and_then(|v| v.to_str().ok())
                    == Some("Basic YWRtaW46bGht")
                {
                    (AxumStatus::OK, lhm_tree(json!("55,3 °C")).to_string())
                } else {
                    (AxumStatus::UNAUTHORIZED, String::new())
                }
            }),
        );
        let fetcher = fetcher_for(serve(router).await);

        assert_eq!(fetcher.fetch().await, 55.3);
    }

    #[tokio::test]
    async fn test_fetch_server_error_is_sentinel() {
        let router = Router::new().route(
            "/data.json",
            get(|| async { (AxumStatus::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let fetcher = fetcher_for(serve(router).await);

        assert!(matches!(
            fetcher.try_fetch().await,
            Err(FetchError::Status(StatusCode::INTERNAL_SERVER_ERROR))
        ));
        assert_eq!(fetcher.fetch().await, UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_fetch_malformed_json_is_sentinel() {
        let router = Router::new().route("/data.json", get(|| async { "{\"Text\": [unterminated" }));
        let fetcher = fetcher_for(serve(router).await);

        assert!(matches!(fetcher.try_fetch().await, Err(FetchError::Json(_))));
        assert_eq!(fetcher.fetch().await, UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_fetch_missing_or_malformed_node_is_sentinel() {
        let cases = [
            json!({"Text": "Sensor", "Children": []}),
            lhm_tree(json!(null)),
            lhm_tree(json!("n/a")),
            lhm_tree(json!({"nested": 1})),
        ];
        for tree in cases {
            let body = tree.to_string();
            let router = Router::new().route(
                "/data.json",
                get(move || {
                    let body = body.clone();
                    async move { body }
                }),
            );
            let fetcher = fetcher_for(serve(router).await);

            assert_eq!(fetcher.fetch().await, UNAVAILABLE);
        }
    }

    #[tokio::test]
    async fn test_fetch_timeout_is_sentinel() {
        let router = Router::new().route(
            "/data.json",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                lhm_tree(json!("50,0 °C")).to_string()
            }),
        );
        let fetcher = fetcher_for(serve(router).await);

        assert!(matches!(fetcher.try_fetch().await, Err(FetchError::Http(_))));
        assert_eq!(fetcher.fetch().await, UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_fetch_unreachable_host_is_sentinel() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let fetcher = fetcher_for(format!("http://{addr}/data.json"));

        assert_eq!(fetcher.fetch().await, UNAVAILABLE);
    }
}
