use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::state::mode::GameMode;

/// Payload used to start a new round.
#[derive(Debug, Deserialize, ToSchema)]
pub struct StartRoundRequest {
    /// Mode to play.
    pub mode: GameMode,
    /// Day to replay; required for the archive mode and refused otherwise.
    #[serde(default)]
    #[schema(value_type = Option<String>, format = Date, example = "2024-05-09")]
    pub date: Option<Date>,
}

/// Everything a client needs to play a freshly started round.
#[derive(Debug, Serialize, ToSchema)]
pub struct StartRoundResponse {
    /// Identifier of the round, also used in the WebSocket path.
    pub session_id: Uuid,
    /// WebSocket URL to open for guessing.
    pub ws_url: String,
    /// Session lifetime rounded up to whole minutes.
    pub expires_in_minutes: i64,
    /// Instant from which guesses are refused.
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String, format = DateTime)]
    pub expires_at: OffsetDateTime,
    /// Mode of the round.
    pub mode: GameMode,
    /// Day the round is pinned to, for daily and archive rounds.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>, format = Date)]
    pub date: Option<Date>,
    /// Clip or lyric fragment shown to the player.
    #[serde(flatten)]
    pub prompt: RoundPrompt,
}

/// Prompt shown at the start of a round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(untagged)]
pub enum RoundPrompt {
    /// Audio clip of the song.
    Audio {
        /// URL of the full audio file.
        audio: String,
        /// Offset of the clip, in seconds.
        audio_start_at: u32,
        /// Length of the clip, in seconds.
        clip_length_seconds: u32,
    },
    /// Two lyric lines with the answer masked.
    Lyrics {
        /// Masked lines joined by `;`.
        lyrics: String,
    },
}
