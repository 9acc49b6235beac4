use axum::{Json, Router, extract::State, routing::post};

use crate::{
    dto::round::{StartRoundRequest, StartRoundResponse},
    error::{AppError, ErrorBody},
    routes::identity::MaybeUser,
    services::round_service,
    state::SharedState,
};

/// Routes starting new rounds.
pub fn router() -> Router<SharedState> {
    Router::new().route("/start", post(start_round))
}

/// Start a round and return its prompt and WebSocket URL.
#[utoipa::path(
    post,
    path = "/api/v1/start",
    tag = "rounds",
    request_body = StartRoundRequest,
    params(("x-user-id" = Option<String>, Header, description = "Authenticated player identifier")),
    responses(
        (status = 200, description = "Round started", body = StartRoundResponse),
        (status = 400, description = "Invalid mode and date combination", body = ErrorBody),
        (status = 401, description = "Malformed player identifier", body = ErrorBody),
        (status = 404, description = "No content to play", body = ErrorBody),
        (status = 503, description = "Storage unavailable", body = ErrorBody)
    )
)]
pub async fn start_round(
    State(state): State<SharedState>,
    MaybeUser(user_id): MaybeUser,
    Json(payload): Json<StartRoundRequest>,
) -> Result<Json<StartRoundResponse>, AppError> {
    let response = round_service::start_round(&state, payload, user_id).await?;
    Ok(Json(response))
}
