use serde::{Deserialize, Serialize};
use time::Date;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{dao::models::GameOutcome, dto::ws::SongReveal, state::mode::GameMode};

/// Outcome reported by the client once a round is over.
#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
pub struct SubmitResultRequest {
    /// Round being reported.
    pub session_id: Uuid,
    /// Mode the round was played in.
    pub mode: GameMode,
    /// Whether the player found the answer.
    pub won: bool,
    /// Guesses used.
    #[validate(range(min = 1, message = "attempts must be at least 1"))]
    pub attempts: u32,
    /// Day of the round, for daily and archive rounds only.
    #[serde(default)]
    #[schema(value_type = Option<String>, format = Date, example = "2024-05-09")]
    pub date: Option<Date>,
}

/// Acknowledgement of a stored result.
#[derive(Debug, Serialize, ToSchema)]
pub struct SubmitResultResponse {
    /// Round the result belongs to.
    pub session_id: Uuid,
    /// Stored outcome.
    pub result: GameOutcome,
    /// Guesses used.
    pub attempts: u32,
    /// Song of the round, when it could be looked up.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub song: Option<SongReveal>,
}
