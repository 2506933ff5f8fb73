use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::constants::{RAIN_DISTANCE_KEY, REPORT_TYPE};
use crate::error::ReportError;
use crate::poll::MetricsSink;
use crate::types::DerivedMetrics;

#[derive(Debug, Serialize)]
pub struct ReportPayload {
    #[serde(rename = "Type")]
    kind: &'static str,
    #[serde(rename = "Timestamp")]
    timestamp_ms: i64,
    #[serde(rename = "Data")]
    data: Map<String, Value>,
}

impl ReportPayload {
    pub fn new(metrics: &DerivedMetrics, observed_at: DateTime<Utc>) -> Self {
        let mut data = Map::new();
        for (radius_km, peak) in &metrics.max_intensity_by_radius {
            data.insert(format!("{radius_km}km"), json!(peak));
        }
        data.insert(RAIN_DISTANCE_KEY.to_string(), json!(metrics.rain_distance_km));

        Self {
            kind: REPORT_TYPE,
            timestamp_ms: observed_at.timestamp_millis(),
            data,
        }
    }
}

/// Posts one payload per cycle. Failures are surfaced, never retried here.
pub struct HttpReporter {
    http: Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpReporter {
    pub fn new(http: Client, endpoint: String, timeout: Duration) -> Self {
        Self {
            http,
            endpoint,
            timeout,
        }
    }
}

impl MetricsSink for HttpReporter {
    async fn report(
        &self,
        metrics: &DerivedMetrics,
        observed_at: DateTime<Utc>,
    ) -> Result<(), ReportError> {
        let payload = ReportPayload::new(metrics, observed_at);
        let response = self
            .http
            .post(&self.endpoint)
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|source| ReportError::Transport {
                endpoint: self.endpoint.clone(),
                source,
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(ReportError::Protocol {
                endpoint: self.endpoint.clone(),
                status,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};

    use axum::extract::State;
    use axum::routing::post;
    use axum::{Json, Router};
    use chrono::TimeZone;

    use super::*;

    #[derive(Clone)]
    struct Sink {
        status: StatusCode,
        received: Arc<Mutex<Vec<Value>>>,
    }

    async fn accept(State(sink): State<Sink>, Json(body): Json<Value>) -> StatusCode {
        sink.received.lock().unwrap().push(body);
        sink.status
    }

    async fn spawn_sink(status: StatusCode) -> (String, Arc<Mutex<Vec<Value>>>) {
        let received = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new().route("/report", post(accept)).with_state(Sink {
            status,
            received: received.clone(),
        });
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        (format!("http://{addr}/report"), received)
    }

    fn sample_metrics() -> DerivedMetrics {
        DerivedMetrics {
            field_max_mm_h: 20.5,
            max_intensity_by_radius: BTreeMap::from([(1, 0.0), (10, 2.5), (50, 12.75)]),
            rain_distance_km: Some(4.0),
        }
    }

    fn observed_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 5, 0).unwrap()
    }

    fn reporter(endpoint: String) -> HttpReporter {
        HttpReporter::new(Client::new(), endpoint, Duration::from_secs(5))
    }

    #[test]
    fn payload_matches_wire_shape() {
        let payload =
            serde_json::to_value(ReportPayload::new(&sample_metrics(), observed_at())).unwrap();
        assert_eq!(
            payload,
            json!({
                "Type": "Radar",
                "Timestamp": 1_714_565_100_000_i64,
                "Data": {
                    "1km": 0.0,
                    "10km": 2.5,
                    "50km": 12.75,
                    "rain_distance": 4.0
                }
            })
        );
    }

    #[test]
    fn dry_frame_reports_null_distance() {
        let metrics = DerivedMetrics {
            field_max_mm_h: 0.0,
            max_intensity_by_radius: BTreeMap::from([(3, 0.0)]),
            rain_distance_km: None,
        };
        let payload = serde_json::to_value(ReportPayload::new(&metrics, observed_at())).unwrap();
        assert_eq!(payload["Data"]["rain_distance"], Value::Null);
        assert_eq!(payload["Data"]["3km"], json!(0.0));
    }

    #[tokio::test]
    async fn delivers_payload_on_200() {
        let (endpoint, received) = spawn_sink(StatusCode::OK).await;
        reporter(endpoint)
            .report(&sample_metrics(), observed_at())
            .await
            .unwrap();

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0]["Type"], "Radar");
        assert_eq!(received[0]["Data"]["50km"], json!(12.75));
    }

    #[tokio::test]
    async fn non_200_is_a_protocol_failure() {
        for status in [StatusCode::CREATED, StatusCode::SERVICE_UNAVAILABLE] {
            let (endpoint, _) = spawn_sink(status).await;
            let error = reporter(endpoint)
                .report(&sample_metrics(), observed_at())
                .await
                .unwrap_err();
            assert!(
                matches!(error, ReportError::Protocol { status: got, .. } if got == status),
                "unexpected {error}"
            );
        }
    }

    #[tokio::test]
    async fn slow_sink_times_out_as_a_transport_failure() {
        let app = Router::new().route(
            "/report",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                StatusCode::OK
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let reporter = HttpReporter::new(
            Client::new(),
            format!("http://{addr}/report"),
            Duration::from_millis(100),
        );
        let error = reporter
            .report(&sample_metrics(), observed_at())
            .await
            .unwrap_err();
        match error {
            ReportError::Transport { source, .. } => assert!(source.is_timeout(), "{source}"),
            other => panic!("unexpected {other}"),
        }
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_transport_failure() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let error = reporter(format!("http://{addr}/report"))
            .report(&sample_metrics(), observed_at())
            .await
            .unwrap_err();
        assert!(matches!(error, ReportError::Transport { .. }), "unexpected {error}");
    }
}
