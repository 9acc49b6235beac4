//! In-memory store of live game rounds.
//!
//! Sessions only live here: they are created by start requests, mutated by the
//! connection that owns them and dropped when that connection ends. Callers
//! never hold a mutable reference to a session; every change goes through a
//! store method that takes the entry's shard lock for the duration of a plain,
//! non-async update.

use dashmap::{DashMap, mapref::entry::Entry};
use thiserror::Error;
use time::{Date, Duration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::state::mode::GameMode;

/// Identifier handed to the client and used as the WebSocket path segment.
pub type SessionId = Uuid;

/// Everything needed to open a new round.
#[derive(Debug, Clone)]
pub struct NewSession {
    /// Text the player must find; normalised on insertion.
    pub answer: String,
    /// Song the round is built on.
    pub answer_song_id: Uuid,
    /// Authenticated player, if any.
    pub user_id: Option<Uuid>,
    /// Mode the round was started in.
    pub mode: GameMode,
    /// Calendar day for daily and archive rounds.
    pub date: Option<Date>,
    /// Creation instant.
    pub created_at: OffsetDateTime,
    /// Instant from which the round can no longer be played.
    pub expires_at: OffsetDateTime,
}

/// Read-only view of a session. The answer is deliberately not part of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// Session identifier.
    pub id: SessionId,
    /// Song the round is built on.
    pub answer_song_id: Uuid,
    /// Authenticated player, if any.
    pub user_id: Option<Uuid>,
    /// Mode the round was started in.
    pub mode: GameMode,
    /// Calendar day for daily and archive rounds.
    pub date: Option<Date>,
    /// Upper bound on guesses.
    pub maximum_attempts: u32,
    /// Guesses evaluated so far.
    pub attempts: u32,
    /// Whether the round is over.
    pub done: bool,
    /// Creation instant.
    pub created_at: OffsetDateTime,
    /// Expiry instant.
    pub expires_at: OffsetDateTime,
}

/// Result of evaluating one guess.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuessOutcome {
    /// Whether the guess matched the answer.
    pub correct: bool,
    /// Whether the round is now over.
    pub done: bool,
    /// Guesses evaluated so far, this one included.
    pub attempts: u32,
}

/// What happened to a guess submitted to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuessVerdict {
    /// The guess was counted. `finished` is set when this guess ended the round.
    Scored {
        /// Evaluation result.
        outcome: GuessOutcome,
        /// True only for the guess that moved the round into its terminal state.
        finished: bool,
    },
    /// The round was already over; nothing changed.
    AlreadyFinished(GuessOutcome),
    /// The round ran out of time before this guess.
    Expired,
    /// No such session.
    NotFound,
}

/// Outcome of binding a connection to a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachOutcome {
    /// The caller now owns the session.
    Attached(SessionSnapshot),
    /// No such session.
    NotFound,
    /// Another connection already owns the session.
    AlreadyAttached,
    /// The session expired before anyone connected.
    Expired,
}

/// Expiry status of a session at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// Still playable.
    Active,
    /// Past its expiry; now marked done.
    Expired,
    /// No such session.
    Missing,
}

/// Counters reported by [`SessionStore::sweep`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Live sessions retired because they expired.
    pub expired: usize,
    /// Retained sessions dropped because their retention ended.
    pub purged: usize,
}

/// A session without a usable answer cannot be created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("session answer must not be empty")]
pub struct EmptyAnswer;

#[derive(Debug)]
struct LiveSession {
    answer: String,
    attached: bool,
    snapshot: SessionSnapshot,
}

#[derive(Debug)]
struct RetainedSession {
    snapshot: SessionSnapshot,
    retain_until: OffsetDateTime,
}

/// Concurrency-safe registry of live rounds.
///
/// Rounds whose connection has ended are kept read-only for `retention` so a
/// result can still be submitted for them.
#[derive(Debug)]
pub struct SessionStore {
    live: DashMap<SessionId, LiveSession>,
    retained: DashMap<SessionId, RetainedSession>,
    retention: Duration,
}

/// Fold case and whitespace so guesses compare loosely.
pub fn normalize_answer(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

impl SessionStore {
    /// Create an empty store keeping finished rounds for `retention`.
    pub fn new(retention: Duration) -> Self {
        Self {
            live: DashMap::new(),
            retained: DashMap::new(),
            retention,
        }
    }

    /// Register a new round and return its freshly allocated identifier.
    pub fn create(&self, session: NewSession) -> Result<SessionId, EmptyAnswer> {
        let answer = normalize_answer(&session.answer);
        if answer.is_empty() {
            return Err(EmptyAnswer);
        }

        loop {
            let id = Uuid::new_v4();
            if self.retained.contains_key(&id) {
                continue;
            }

            match self.live.entry(id) {
                Entry::Occupied(_) => continue,
                Entry::Vacant(slot) => {
                    slot.insert(LiveSession {
                        answer,
                        attached: false,
                        snapshot: SessionSnapshot {
                            id,
                            answer_song_id: session.answer_song_id,
                            user_id: session.user_id,
                            mode: session.mode,
                            date: session.date,
                            maximum_attempts: session.mode.maximum_attempts(),
                            attempts: 0,
                            done: false,
                            created_at: session.created_at,
                            expires_at: session.expires_at,
                        },
                    });
                    return Ok(id);
                }
            }
        }
    }

    /// Look up a live session.
    pub fn get(&self, id: &SessionId) -> Option<SessionSnapshot> {
        self.live.get(id).map(|entry| entry.snapshot.clone())
    }

    /// Look up a session that is live or still retained after its connection ended.
    pub fn resolve(&self, id: &SessionId) -> Option<SessionSnapshot> {
        self.get(id)
            .or_else(|| self.retained.get(id).map(|entry| entry.snapshot.clone()))
    }

    /// Number of live sessions.
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Bind a connection to a session. Only one connection may own a session at a time.
    pub fn attach(&self, id: &SessionId, now: OffsetDateTime) -> AttachOutcome {
        let Some(mut entry) = self.live.get_mut(id) else {
            return AttachOutcome::NotFound;
        };

        if now >= entry.snapshot.expires_at {
            entry.snapshot.done = true;
            return AttachOutcome::Expired;
        }
        if entry.attached {
            return AttachOutcome::AlreadyAttached;
        }

        entry.attached = true;
        AttachOutcome::Attached(entry.snapshot.clone())
    }

    /// Check the session against its expiry, marking it done once it has passed.
    pub fn check_liveness(&self, id: &SessionId, now: OffsetDateTime) -> Liveness {
        let Some(mut entry) = self.live.get_mut(id) else {
            return Liveness::Missing;
        };

        if now >= entry.snapshot.expires_at {
            entry.snapshot.done = true;
            Liveness::Expired
        } else {
            Liveness::Active
        }
    }

    /// Evaluate a guess against the session's answer.
    pub fn record_guess(
        &self,
        id: &SessionId,
        guess: &str,
        now: OffsetDateTime,
    ) -> GuessVerdict {
        let Some(mut entry) = self.live.get_mut(id) else {
            return GuessVerdict::NotFound;
        };

        let session = &mut *entry;
        if session.snapshot.done {
            return GuessVerdict::AlreadyFinished(GuessOutcome {
                correct: false,
                done: true,
                attempts: session.snapshot.attempts,
            });
        }
        if now >= session.snapshot.expires_at {
            session.snapshot.done = true;
            return GuessVerdict::Expired;
        }

        session.snapshot.attempts += 1;
        let correct = normalize_answer(guess) == session.answer;
        let done = correct || session.snapshot.attempts >= session.snapshot.maximum_attempts;
        session.snapshot.done = done;

        GuessVerdict::Scored {
            outcome: GuessOutcome {
                correct,
                done,
                attempts: session.snapshot.attempts,
            },
            finished: done,
        }
    }

    /// End a session's live phase, keeping a read-only copy for result submission.
    pub fn release(&self, id: &SessionId, now: OffsetDateTime) -> Option<SessionSnapshot> {
        let (_, session) = self.live.remove(id)?;
        Some(self.retain_snapshot(session.snapshot, now))
    }

    fn retain_snapshot(&self, snapshot: SessionSnapshot, now: OffsetDateTime) -> SessionSnapshot {
        self.retained.insert(
            snapshot.id,
            RetainedSession {
                snapshot: snapshot.clone(),
                retain_until: now + self.retention,
            },
        );
        snapshot
    }

    /// Drop every trace of a session.
    pub fn remove(&self, id: &SessionId) -> Option<SessionSnapshot> {
        let live = self.live.remove(id).map(|(_, session)| session.snapshot);
        let retained = self.retained.remove(id).map(|(_, entry)| entry.snapshot);
        live.or(retained)
    }

    /// Retire expired live sessions and forget retained ones past their retention.
    ///
    /// Sessions owned by a connection are left alone; that connection reports the
    /// expiry on its next frame and releases the session when it ends.
    pub fn sweep(&self, now: OffsetDateTime) -> SweepReport {
        let is_stale =
            |session: &LiveSession| !session.attached && now >= session.snapshot.expires_at;
        let expired_ids: Vec<SessionId> = self
            .live
            .iter()
            .filter(|entry| is_stale(entry.value()))
            .map(|entry| *entry.key())
            .collect();

        let mut report = SweepReport::default();
        for id in expired_ids {
            let Some((_, mut session)) = self.live.remove_if(&id, |_, session| is_stale(session))
            else {
                continue;
            };
            session.snapshot.done = true;
            self.retain_snapshot(session.snapshot, now);
            report.expired += 1;
        }

        let before = self.retained.len();
        self.retained.retain(|_, entry| entry.retain_until > now);
        report.purged = before.saturating_sub(self.retained.len());

        if report != SweepReport::default() {
            debug!(
                expired = report.expired,
                purged = report.purged,
                "session sweep completed"
            );
        }
        report
    }
}
