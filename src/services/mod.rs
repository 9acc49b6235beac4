/// Song catalog lookups.
pub mod catalog_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Per-connection guess state machine.
pub mod guess_protocol;
/// Health check service.
pub mod health_service;
/// Round start: content resolution, prompt building and session creation.
pub mod round_service;
/// Periodic cleanup of expired and retained sessions.
pub mod session_sweeper;
/// Storage connection supervisor toggling degraded mode.
pub mod storage_supervisor;
/// Result submission validation and persistence.
pub mod submission_service;
/// WebSocket connection and message handling service.
pub mod websocket_service;

#[cfg(test)]
pub(crate) mod test_support;
