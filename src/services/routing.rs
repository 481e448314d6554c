use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{backoff, failure_policy, Config, Error as FailsafeError, StateMachine};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::domain::geo::{haversine_meters, GeoPoint};

#[derive(Error, Debug)]
pub enum OsrmError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("OSRM returned status {0}")]
    UpstreamStatus(u16),
    #[error("No route found: {0}")]
    NoRoute(String),
    #[error("Circuit breaker open: {0}")]
    CircuitBreakerOpen(String),
}

#[derive(Debug, Deserialize)]
struct RouteResponse {
    code: String,
    #[serde(default)]
    routes: Vec<Route>,
}

#[derive(Debug, Deserialize)]
struct Route {
    /// Seconds.
    duration: f64,
    /// Meters.
    distance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimateSource {
    Osrm,
    StraightLine,
}

#[derive(Debug, Clone, Serialize)]
pub struct TravelEstimate {
    pub duration_minutes: i64,
    pub distance_meters: f64,
    pub source: EstimateSource,
}

/// HTTP client for an OSRM routing server
#[derive(Clone)]
pub struct OsrmClient {
    client: Client,
    base_url: String,
    circuit_breaker: StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>,
}

impl OsrmClient {
    pub fn new(base_url: String) -> Self {
        Self::with_circuit_breaker(base_url, 3, 60)
    }

    pub fn with_circuit_breaker(base_url: String, failure_threshold: u32, reset_timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_default();

        let backoff = backoff::equal_jittered(
            Duration::from_secs(reset_timeout_secs),
            Duration::from_secs(reset_timeout_secs * 2),
        );
        let policy = failure_policy::consecutive_failures(failure_threshold, backoff);
        let circuit_breaker = Config::new().failure_policy(policy).build();

        OsrmClient {
            client,
            base_url,
            circuit_breaker,
        }
    }

    pub fn circuit_state(&self) -> String {
        if self.circuit_breaker.is_call_permitted() {
            "closed".to_string()
        } else {
            "open".to_string()
        }
    }

    /// Driving route between two points. Returns (seconds, meters).
    pub async fn route(&self, from: GeoPoint, to: GeoPoint) -> Result<(f64, f64), OsrmError> {
        let url = format!(
            "{}/route/v1/driving/{},{};{},{}?overview=false",
            self.base_url.trim_end_matches('/'),
            from.longitude,
            from.latitude,
            to.longitude,
            to.latitude
        );
        let client = self.client.clone();

        let result = self
            .circuit_breaker
            .call(async move {
                let response = client.get(&url).send().await?;
                if !response.status().is_success() {
                    return Err(OsrmError::UpstreamStatus(response.status().as_u16()));
                }

                let body = response.json::<RouteResponse>().await?;
                if body.code != "Ok" {
                    return Err(OsrmError::NoRoute(body.code));
                }
                body.routes
                    .first()
                    .map(|route| (route.duration, route.distance))
                    .ok_or_else(|| OsrmError::NoRoute("empty route list".to_string()))
            })
            .await;

        match result {
            Ok(route) => Ok(route),
            Err(FailsafeError::Rejected) => Err(OsrmError::CircuitBreakerOpen(
                "OSRM circuit breaker is open".to_string(),
            )),
            Err(FailsafeError::Inner(e)) => Err(e),
        }
    }
}

/// Route-based travel time with a straight-line fallback.
#[derive(Clone)]
pub struct TravelEstimator {
    osrm: Option<OsrmClient>,
    fallback_speed_kmh: f64,
}

impl TravelEstimator {
    pub fn new(osrm_url: Option<String>, fallback_speed_kmh: f64) -> Self {
        Self {
            osrm: osrm_url.map(OsrmClient::new),
            fallback_speed_kmh,
        }
    }

    pub fn with_client(osrm: OsrmClient, fallback_speed_kmh: f64) -> Self {
        Self {
            osrm: Some(osrm),
            fallback_speed_kmh,
        }
    }

    pub async fn estimate(&self, from: GeoPoint, to: GeoPoint) -> TravelEstimate {
        if let Some(osrm) = &self.osrm {
            match osrm.route(from, to).await {
                Ok((seconds, meters)) => {
                    return TravelEstimate {
                        duration_minutes: minutes_from_seconds(seconds),
                        distance_meters: meters,
                        source: EstimateSource::Osrm,
                    }
                }
                Err(e) => tracing::warn!("OSRM route failed, using straight-line estimate: {}", e),
            }
        }
        self.straight_line(from, to)
    }

    pub fn straight_line(&self, from: GeoPoint, to: GeoPoint) -> TravelEstimate {
        let distance_meters = haversine_meters(from, to);
        let meters_per_second = self.fallback_speed_kmh * 1000.0 / 3600.0;
        TravelEstimate {
            duration_minutes: minutes_from_seconds(distance_meters / meters_per_second),
            distance_meters,
            source: EstimateSource::StraightLine,
        }
    }
}

fn minutes_from_seconds(seconds: f64) -> i64 {
    ((seconds / 60.0).ceil() as i64).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn abidjan() -> (GeoPoint, GeoPoint) {
        (GeoPoint::new(5.36, -4.01), GeoPoint::new(5.361, -4.011))
    }

    #[test]
    fn test_circuit_breaker_state() {
        let client = OsrmClient::new("http://localhost:5000".to_string());
        assert_eq!(client.circuit_state(), "closed");
    }

    #[test]
    fn test_straight_line_minimum_is_one_minute() {
        let (from, _) = abidjan();
        let estimator = TravelEstimator::new(None, 30.0);
        let estimate = estimator.straight_line(from, from);
        assert_eq!(estimate.duration_minutes, 1);
        assert_eq!(estimate.source, EstimateSource::StraightLine);
    }

    #[test]
    fn test_straight_line_uses_fallback_speed() {
        // One degree of longitude at the equator is about 111 km: 223 minutes at 30 km/h.
        let estimator = TravelEstimator::new(None, 30.0);
        let estimate = estimator.straight_line(GeoPoint::new(0.0, 0.0), GeoPoint::new(0.0, 1.0));
        assert!((220..=225).contains(&estimate.duration_minutes));
    }

    #[tokio::test]
    async fn test_route_with_mock() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", mockito::Matcher::Regex(r"^/route/v1/driving/.*".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"code":"Ok","routes":[{"duration":421.5,"distance":3120.0}]}"#)
            .create_async()
            .await;

        let (from, to) = abidjan();
        let estimator = TravelEstimator::with_client(OsrmClient::new(server.url()), 30.0);
        let estimate = estimator.estimate(from, to).await;

        assert_eq!(estimate.source, EstimateSource::Osrm);
        assert_eq!(estimate.duration_minutes, 8);
        assert_eq!(estimate.distance_meters, 3120.0);
    }

    #[tokio::test]
    async fn test_falls_back_on_upstream_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", mockito::Matcher::Regex(r"^/route/v1/driving/.*".into()))
            .with_status(500)
            .create_async()
            .await;

        let (from, to) = abidjan();
        let estimator = TravelEstimator::with_client(OsrmClient::new(server.url()), 30.0);
        let estimate = estimator.estimate(from, to).await;
        assert_eq!(estimate.source, EstimateSource::StraightLine);
    }

    #[tokio::test]
    async fn test_no_route_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", mockito::Matcher::Regex(r"^/route/v1/driving/.*".into()))
            .with_status(200)
            .with_body(r#"{"code":"NoRoute","routes":[]}"#)
            .create_async()
            .await;

        let (from, to) = abidjan();
        let client = OsrmClient::new(server.url());
        let result = client.route(from, to).await;
        assert!(matches!(result, Err(OsrmError::NoRoute(_))));
    }

    #[tokio::test]
    async fn test_circuit_breaker_opens_after_failures() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", mockito::Matcher::Regex(r"^/route/v1/driving/.*".into()))
            .with_status(500)
            .expect_at_least(3)
            .create_async()
            .await;

        let (from, to) = abidjan();
        let client = OsrmClient::with_circuit_breaker(server.url(), 3, 60);
        for _ in 0..3 {
            let _ = client.route(from, to).await;
        }

        let result = client.route(from, to).await;
        assert!(matches!(result, Err(OsrmError::CircuitBreakerOpen(_))));
    }
}
