use axum::Router;

use crate::state::SharedState;

/// Song catalog.
pub mod catalog;
/// Swagger UI and OpenAPI JSON.
pub mod docs;
/// Health check.
pub mod health;
/// Optional player identity.
pub mod identity;
/// Round start.
pub mod round;
/// Result submission.
pub mod submission;
/// Guessing WebSocket upgrade.
pub mod websocket;

/// Compose all route trees, wiring in shared state and documentation routes.
///
/// Game routes live under the configured API prefix; health and docs stay at the root.
pub fn router(state: SharedState) -> Router<()> {
    let game_router = round::router()
        .merge(submission::router())
        .merge(catalog::router())
        .merge(websocket::router());

    let prefix = state.config().api_prefix().to_owned();
    let api_router = if prefix.is_empty() {
        health::router().merge(game_router)
    } else {
        health::router().nest(&prefix, game_router)
    };

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}
