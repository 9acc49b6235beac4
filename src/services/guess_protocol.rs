//! Per-connection guess protocol.
//!
//! A connection starts `Active` once it owns its session and becomes
//! `Finished` after the guess that ends the round or after expiry. Every
//! inbound frame is checked against the session's expiry before it is
//! serviced. Transport concerns (socket I/O, metadata lookups) stay in
//! [`crate::services::websocket_service`]; this module only decides what to
//! answer.

use time::OffsetDateTime;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    dto::ws::{GuessInboundMessage, GuessOutboundMessage},
    state::session::{
        AttachOutcome, GuessVerdict, Liveness, SessionId, SessionSnapshot, SessionStore,
    },
};

/// Where a connection stands in the round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    /// Guesses are evaluated.
    Active,
    /// The round ended; guesses are answered without being counted.
    Finished,
}

/// What the transport must do after a frame was handled.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Reaction {
    /// Messages to send, in order.
    pub replies: Vec<GuessOutboundMessage>,
    /// Song to reveal after the replies, set once when a guess ends the round.
    pub reveal_song: Option<Uuid>,
    /// Close the socket after sending.
    pub close: bool,
}

impl Reaction {
    fn reply(message: GuessOutboundMessage) -> Self {
        Self {
            replies: vec![message],
            ..Self::default()
        }
    }

    fn reply_and_close(message: GuessOutboundMessage) -> Self {
        Self {
            replies: vec![message],
            reveal_song: None,
            close: true,
        }
    }
}

/// Protocol state of one WebSocket connection bound to one session.
#[derive(Debug)]
pub struct GuessConnection {
    session_id: SessionId,
    answer_song_id: Uuid,
    phase: ConnectionPhase,
}

impl GuessConnection {
    /// Bind a new connection to `session_id`.
    ///
    /// On refusal the returned message must be sent before closing the socket.
    pub fn open(
        sessions: &SessionStore,
        session_id: SessionId,
        now: OffsetDateTime,
    ) -> Result<Self, GuessOutboundMessage> {
        match sessions.attach(&session_id, now) {
            AttachOutcome::Attached(snapshot) => Ok(Self::from_snapshot(snapshot)),
            AttachOutcome::NotFound => Err(GuessOutboundMessage::error(format!(
                "session `{session_id}` not found"
            ))),
            AttachOutcome::AlreadyAttached => Err(GuessOutboundMessage::error(format!(
                "session `{session_id}` is already in use by another connection"
            ))),
            AttachOutcome::Expired => Err(GuessOutboundMessage::Expired),
        }
    }

    fn from_snapshot(snapshot: SessionSnapshot) -> Self {
        let phase = if snapshot.done {
            ConnectionPhase::Finished
        } else {
            ConnectionPhase::Active
        };
        Self {
            session_id: snapshot.id,
            answer_song_id: snapshot.answer_song_id,
            phase,
        }
    }

    /// Session this connection owns.
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Current protocol phase.
    pub fn phase(&self) -> ConnectionPhase {
        self.phase
    }

    /// Handle a text frame.
    pub fn on_text(
        &mut self,
        sessions: &SessionStore,
        text: &str,
        now: OffsetDateTime,
    ) -> Reaction {
        if let Some(reaction) = self.check_expiry(sessions, now) {
            return reaction;
        }

        let guess = match GuessInboundMessage::from_json_str(text) {
            Ok(GuessInboundMessage::Guess { guess }) => guess,
            Err(err) => {
                debug!(session_id = %self.session_id, error = %err, "rejected inbound frame");
                return Reaction::reply(GuessOutboundMessage::error(err.to_string()));
            }
        };

        match sessions.record_guess(&self.session_id, &guess, now) {
            GuessVerdict::Scored { outcome, finished } => {
                let mut reaction = Reaction::reply(GuessOutboundMessage::Result {
                    correct: outcome.correct,
                    done: outcome.done,
                    attempts: outcome.attempts,
                });
                if finished {
                    self.phase = ConnectionPhase::Finished;
                    reaction.reveal_song = Some(self.answer_song_id);
                }
                reaction
            }
            GuessVerdict::AlreadyFinished(outcome) => {
                self.phase = ConnectionPhase::Finished;
                Reaction::reply(GuessOutboundMessage::Result {
                    correct: outcome.correct,
                    done: outcome.done,
                    attempts: outcome.attempts,
                })
            }
            GuessVerdict::Expired => self.expire(),
            GuessVerdict::NotFound => self.lost(),
        }
    }

    /// Handle a binary frame, which the protocol does not use.
    pub fn on_binary(&mut self, sessions: &SessionStore, now: OffsetDateTime) -> Reaction {
        if let Some(reaction) = self.check_expiry(sessions, now) {
            return reaction;
        }
        Reaction::reply(GuessOutboundMessage::error("binary frames are not supported"))
    }

    fn check_expiry(&mut self, sessions: &SessionStore, now: OffsetDateTime) -> Option<Reaction> {
        match sessions.check_liveness(&self.session_id, now) {
            Liveness::Active => None,
            Liveness::Expired => Some(self.expire()),
            Liveness::Missing => Some(self.lost()),
        }
    }

    fn expire(&mut self) -> Reaction {
        self.phase = ConnectionPhase::Finished;
        Reaction::reply_and_close(GuessOutboundMessage::Expired)
    }

    fn lost(&mut self) -> Reaction {
        warn!(session_id = %self.session_id, "session vanished while connected");
        self.phase = ConnectionPhase::Finished;
        Reaction::reply_and_close(GuessOutboundMessage::error(format!(
            "session `{}` not found",
            self.session_id
        )))
    }
}
