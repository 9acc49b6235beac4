use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use validator::ValidationError;

use crate::{dao::models::SongMetadata, dto::validation::validate_guess};

#[derive(Debug, Deserialize, Serialize, ToSchema)]
/// Messages accepted from player WebSocket clients.
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GuessInboundMessage {
    /// One attempt at the answer.
    Guess {
        /// Free-text answer.
        guess: String,
    },
}

/// Why an inbound frame was refused.
#[derive(Debug, Error)]
pub enum InboundMessageError {
    /// Not valid JSON or not a known message type.
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
    /// Well-formed but the guess itself is unacceptable.
    #[error("invalid guess: {0}")]
    Invalid(ValidationError),
}

impl GuessInboundMessage {
    /// Parse a text frame and validate its content.
    pub fn from_json_str(text: &str) -> Result<Self, InboundMessageError> {
        let message: Self = serde_json::from_str(text)?;
        match &message {
            Self::Guess { guess } => validate_guess(guess).map_err(InboundMessageError::Invalid)?,
        }
        Ok(message)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
/// Messages pushed to player WebSocket clients.
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GuessOutboundMessage {
    /// Evaluation of the latest guess.
    Result {
        /// Whether the guess matched.
        correct: bool,
        /// Whether the round is over.
        done: bool,
        /// Guesses counted so far.
        attempts: u32,
    },
    /// The round ran out of time.
    Expired,
    /// The request could not be served.
    Error {
        /// Human readable reason.
        message: String,
    },
    /// Song revealed after the round finished.
    Song(SongReveal),
}

impl GuessOutboundMessage {
    /// Error payload with the given reason.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
/// End-of-round song details.
pub struct SongReveal {
    /// Song title.
    pub title: String,
    /// Year of release.
    pub release_year: i32,
    /// Album, when known.
    pub album: Option<String>,
    /// Performing artists.
    pub artists: Vec<String>,
    /// Link to listen to the full song.
    pub share_link: String,
}

impl From<SongMetadata> for SongReveal {
    fn from(value: SongMetadata) -> Self {
        Self {
            title: value.title,
            release_year: value.release_year,
            album: value.album,
            artists: value.artists,
            share_link: value.share_link,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn guess_frames_parse_and_validate() {
        let message = GuessInboundMessage::from_json_str(r#"{"type":"guess","guess":"Africa"}"#)
            .unwrap();
        let GuessInboundMessage::Guess { guess } = message;
        assert_eq!(guess, "Africa");
    }

    #[test]
    fn unknown_types_and_blank_guesses_are_refused() {
        assert!(matches!(
            GuessInboundMessage::from_json_str(r#"{"type":"hint"}"#),
            Err(InboundMessageError::Malformed(_))
        ));
        assert!(matches!(
            GuessInboundMessage::from_json_str("not json"),
            Err(InboundMessageError::Malformed(_))
        ));
        assert!(matches!(
            GuessInboundMessage::from_json_str(r#"{"type":"guess","guess":"  "}"#),
            Err(InboundMessageError::Invalid(_))
        ));
    }

    #[test]
    fn outbound_messages_are_tagged_by_type() {
        let result = GuessOutboundMessage::Result {
            correct: false,
            done: true,
            attempts: 6,
        };
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({ "type": "result", "correct": false, "done": true, "attempts": 6 })
        );
        assert_eq!(
            serde_json::to_value(GuessOutboundMessage::Expired).unwrap(),
            json!({ "type": "expired" })
        );
        let song = GuessOutboundMessage::Song(SongReveal {
            title: "Africa".into(),
            release_year: 1982,
            album: Some("Toto IV".into()),
            artists: vec!["Toto".into()],
            share_link: "https://example.com/africa".into(),
        });
        assert_eq!(
            serde_json::to_value(&song).unwrap()["type"],
            json!("song")
        );
        assert_eq!(serde_json::to_value(&song).unwrap()["release_year"], json!(1982));
    }
}
