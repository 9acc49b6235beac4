use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Heardle Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::round::start_round,
        crate::routes::submission::submit_result,
        crate::routes::catalog::song_titles,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::round::StartRoundRequest,
            crate::dto::round::StartRoundResponse,
            crate::dto::round::RoundPrompt,
            crate::dto::submission::SubmitResultRequest,
            crate::dto::submission::SubmitResultResponse,
            crate::dto::catalog::SongTitlesResponse,
            crate::dto::ws::GuessInboundMessage,
            crate::dto::ws::GuessOutboundMessage,
            crate::dto::ws::SongReveal,
            crate::dao::models::GameOutcome,
            crate::state::mode::GameMode,
            crate::error::ErrorBody,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "rounds", description = "Starting rounds and submitting results"),
        (name = "catalog", description = "Song catalog lookups"),
        (name = "players", description = "WebSocket guessing protocol"),
    )
)]
pub struct ApiDoc;
