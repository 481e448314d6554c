use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::time::timeout;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub dependencies: HashMap<String, DependencyStatus>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DependencyStatus {
    Healthy { status: String, latency_ms: u64 },
    Unhealthy { status: String, error: String },
}

impl DependencyStatus {
    fn healthy(start: Instant) -> Self {
        DependencyStatus::Healthy {
            status: "healthy".to_string(),
            latency_ms: start.elapsed().as_millis() as u64,
        }
    }

    fn unhealthy(error: impl ToString) -> Self {
        DependencyStatus::Unhealthy {
            status: "unhealthy".to_string(),
            error: error.to_string(),
        }
    }
}

#[async_trait]
pub trait DependencyChecker: Send + Sync {
    async fn check(&self) -> DependencyStatus;
}

pub struct PostgresChecker {
    pool: sqlx::PgPool,
}

impl PostgresChecker {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DependencyChecker for PostgresChecker {
    async fn check(&self) -> DependencyStatus {
        let start = Instant::now();
        match sqlx::query("SELECT 1").execute(&self.pool).await {
            Ok(_) => DependencyStatus::healthy(start),
            Err(e) => DependencyStatus::unhealthy(e),
        }
    }
}

/// The OTP store. Bookings keep working without it.
pub struct RedisChecker {
    url: String,
}

impl RedisChecker {
    pub fn new(url: String) -> Self {
        Self { url }
    }
}

#[async_trait]
impl DependencyChecker for RedisChecker {
    async fn check(&self) -> DependencyStatus {
        let start = Instant::now();
        let client = match redis::Client::open(self.url.as_str()) {
            Ok(client) => client,
            Err(e) => return DependencyStatus::unhealthy(e),
        };
        let mut conn = match client.get_multiplexed_async_connection().await {
            Ok(conn) => conn,
            Err(e) => return DependencyStatus::unhealthy(e),
        };
        match redis::cmd("PING").query_async::<_, String>(&mut conn).await {
            Ok(_) => DependencyStatus::healthy(start),
            Err(e) => DependencyStatus::unhealthy(e),
        }
    }
}

pub async fn check_health(
    postgres: &PostgresChecker,
    redis: &RedisChecker,
    start_time: Instant,
) -> HealthResponse {
    let timeout_duration = Duration::from_secs(5);

    let (postgres_result, redis_result) = tokio::join!(
        timeout(timeout_duration, postgres.check()),
        timeout(timeout_duration, redis.check())
    );

    let mut dependencies = HashMap::new();
    dependencies.insert(
        "postgres".to_string(),
        postgres_result.unwrap_or_else(|_| DependencyStatus::unhealthy("timeout")),
    );
    dependencies.insert(
        "redis".to_string(),
        redis_result.unwrap_or_else(|_| DependencyStatus::unhealthy("timeout")),
    );

    let overall_status = determine_overall_status(&dependencies);

    HealthResponse {
        status: overall_status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: start_time.elapsed().as_secs(),
        dependencies,
    }
}

fn determine_overall_status(dependencies: &HashMap<String, DependencyStatus>) -> String {
    let critical_deps = ["postgres"];
    let mut has_critical_failure = false;
    let mut has_non_critical_failure = false;

    for (name, status) in dependencies {
        if matches!(status, DependencyStatus::Unhealthy { .. }) {
            if critical_deps.contains(&name.as_str()) {
                has_critical_failure = true;
            } else {
                has_non_critical_failure = true;
            }
        }
    }

    if has_critical_failure {
        "unhealthy".to_string()
    } else if has_non_critical_failure {
        "degraded".to_string()
    } else {
        "healthy".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deps(postgres_ok: bool, redis_ok: bool) -> HashMap<String, DependencyStatus> {
        let status = |ok: bool| {
            if ok {
                DependencyStatus::healthy(Instant::now())
            } else {
                DependencyStatus::unhealthy("down")
            }
        };
        HashMap::from([
            ("postgres".to_string(), status(postgres_ok)),
            ("redis".to_string(), status(redis_ok)),
        ])
    }

    #[test]
    fn test_overall_status() {
        assert_eq!(determine_overall_status(&deps(true, true)), "healthy");
        assert_eq!(determine_overall_status(&deps(true, false)), "degraded");
        assert_eq!(determine_overall_status(&deps(false, true)), "unhealthy");
    }

    #[tokio::test]
    async fn test_redis_checker_reports_bad_url() {
        let checker = RedisChecker::new("not a url".to_string());
        assert!(matches!(checker.check().await, DependencyStatus::Unhealthy { .. }));
    }
}
