use serde::Serialize;
use utoipa::ToSchema;

/// Health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// `ok` while storage is installed, `degraded` otherwise.
    pub status: &'static str,
}

impl HealthResponse {
    /// Storage is reachable.
    pub fn ok() -> Self {
        Self { status: "ok" }
    }

    /// Start and submit requests are refused until storage comes back.
    pub fn degraded() -> Self {
        Self { status: "degraded" }
    }
}
