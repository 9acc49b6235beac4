use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Respond with a static health payload while logging connectivity issues.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.require_storage().await {
        Ok(storage) => {
            if let Err(err) = storage.health.health_check().await {
                warn!(error = %err, "storage health check failed");
            }
        }
        Err(_) => warn!("storage unavailable (degraded mode)"),
    }

    if state.is_degraded() {
        HealthResponse::degraded()
    } else {
        HealthResponse::ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::Harness;

    #[tokio::test]
    async fn reports_degraded_without_storage() {
        let harness = Harness::new().await;
        assert_eq!(health_status(&harness.state).await.status, "ok");

        harness.state.clear_storage().await;
        assert_eq!(health_status(&harness.state).await.status, "degraded");
    }
}
