//! Health check handler and response types.

use crate::state::HealthState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use utoipa::ToSchema;

const CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Run an async check with timeout; returns "healthy", "timeout", or "{prefix}: {error}".
async fn run_check<F, E>(timeout: Duration, f: F, error_prefix: &str) -> String
where
    F: Future<Output = Result<(), E>>,
    E: Display,
{
    match tokio::time::timeout(timeout, f).await {
        Ok(Ok(())) => "healthy".to_string(),
        Ok(Err(e)) => format!("{}: {}", error_prefix, e),
        Err(_) => "timeout".to_string(),
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthCheckResponse {
    pub status: String,
    pub database: String,
    pub storage: String,
}

/// Database and durable storage health
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthCheckResponse),
        (status = 503, description = "Database unavailable", body = HealthCheckResponse)
    )
)]
pub async fn health_check(State(health): State<HealthState>) -> impl IntoResponse {
    let database = match health.pool.clone() {
        Some(pool) => {
            run_check(
                CHECK_TIMEOUT,
                async move { sqlx::query("SELECT 1").execute(&pool).await.map(drop) },
                "unhealthy",
            )
            .await
        }
        None => "not_configured".to_string(),
    };

    let storage = health.storage.clone();
    let storage = run_check(
        CHECK_TIMEOUT,
        async move { storage.exists("health/probe").await.map(drop) },
        "degraded",
    )
    .await;

    let healthy = database == "healthy" || database == "not_configured";
    if !healthy {
        tracing::error!(database = %database, "Health check failed");
    }

    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let status = if !healthy {
        "unhealthy"
    } else if storage == "healthy" {
        "healthy"
    } else {
        "degraded"
    };

    (
        status_code,
        Json(HealthCheckResponse {
            status: status.to_string(),
            database,
            storage,
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_check_reports_outcomes() {
        let ok = run_check(Duration::from_secs(1), async { Ok::<(), String>(()) }, "x").await;
        assert_eq!(ok, "healthy");

        let failed = run_check(
            Duration::from_secs(1),
            async { Err::<(), String>("down".to_string()) },
            "unhealthy",
        )
        .await;
        assert_eq!(failed, "unhealthy: down");

        let slow = run_check(
            Duration::from_millis(10),
            async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok::<(), String>(())
            },
            "x",
        )
        .await;
        assert_eq!(slow, "timeout");
    }
}
