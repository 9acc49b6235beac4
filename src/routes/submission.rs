use axum::{Json, Router, extract::State, routing::post};
use axum_valid::Valid;

use crate::{
    dto::submission::{SubmitResultRequest, SubmitResultResponse},
    error::{AppError, ErrorBody},
    routes::identity::MaybeUser,
    services::submission_service,
    state::SharedState,
};

/// Routes recording finished rounds.
pub fn router() -> Router<SharedState> {
    Router::new().route("/submit", post(submit_result))
}

/// Record the outcome of a finished round.
#[utoipa::path(
    post,
    path = "/api/v1/submit",
    tag = "rounds",
    request_body = SubmitResultRequest,
    params(("x-user-id" = Option<String>, Header, description = "Authenticated player identifier")),
    responses(
        (status = 200, description = "Result stored", body = SubmitResultResponse),
        (status = 400, description = "Submission does not fit the mode or session",
            body = ErrorBody),
        (status = 401, description = "Malformed player identifier", body = ErrorBody),
        (status = 403, description = "Daily game already played", body = ErrorBody),
        (status = 404, description = "Unknown session", body = ErrorBody),
        (status = 409, description = "Result already submitted", body = ErrorBody),
        (status = 503, description = "Storage unavailable", body = ErrorBody)
    )
)]
pub async fn submit_result(
    State(state): State<SharedState>,
    MaybeUser(user_id): MaybeUser,
    Valid(Json(payload)): Valid<Json<SubmitResultRequest>>,
) -> Result<Json<SubmitResultResponse>, AppError> {
    let response = submission_service::submit_result(&state, payload, user_id).await?;
    Ok(Json(response))
}
