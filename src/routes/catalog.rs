use axum::{Json, Router, extract::State, routing::get};

use crate::{
    dto::catalog::SongTitlesResponse,
    error::{AppError, ErrorBody},
    services::catalog_service,
    state::SharedState,
};

/// Routes exposing the song catalog.
pub fn router() -> Router<SharedState> {
    Router::new().route("/songs", get(song_titles))
}

/// List every song title, for guess autocompletion.
#[utoipa::path(
    get,
    path = "/api/v1/songs",
    tag = "catalog",
    responses(
        (status = 200, description = "Song titles", body = SongTitlesResponse),
        (status = 503, description = "Storage unavailable", body = ErrorBody)
    )
)]
pub async fn song_titles(
    State(state): State<SharedState>,
) -> Result<Json<SongTitlesResponse>, AppError> {
    let response = catalog_service::song_titles(&state).await?;
    Ok(Json(response))
}
