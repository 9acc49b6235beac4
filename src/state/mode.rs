use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{Date, Duration, OffsetDateTime};
use utoipa::ToSchema;

/// Gameplay variants offered to players.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum GameMode {
    /// Random song, long clip, six guesses.
    Original,
    /// Song of the day, one play per user.
    Daily,
    /// Random song, very short clip, single guess.
    Rapid,
    /// Random song, masked lyric fragment, single guess.
    Lyrics,
    /// Past song of the day replayed on demand.
    Archive,
}

/// Where the song of a round comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentSource {
    /// Uniformly random pick from the catalog.
    RandomSong,
    /// Song scheduled for a calendar date (today for Daily, a past date for Archive).
    PinnedToDate,
}

/// What the player is shown at the start of the round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    /// A slice of the song's audio.
    AudioClip {
        /// Length of the clip in seconds.
        clip_length_seconds: u32,
    },
    /// Two lyric lines with a one or two word gap.
    MaskedLyrics,
}

/// How the round's date is taken from the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateRule {
    /// No date may be supplied.
    Forbidden,
    /// No date may be supplied; the round is pinned to today.
    Today,
    /// A date strictly before today must be supplied.
    RequiredPast,
}

/// Lifetime of a live session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionExpiry {
    /// Fixed number of minutes after creation.
    Minutes(i64),
    /// Until the next UTC midnight.
    EndOfDay,
}

/// Rules governing a single [`GameMode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModePolicy {
    /// Source of the round's song.
    pub source: ContentSource,
    /// Prompt presented to the player.
    pub prompt: PromptKind,
    /// Date handling for start requests.
    pub date_rule: DateRule,
    /// Upper bound on guesses.
    pub maximum_attempts: u32,
    /// Session lifetime.
    pub expiry: SessionExpiry,
}

/// Reasons a start request is rejected before any content is fetched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoundRequestError {
    /// Only the archive mode accepts a date.
    #[error("a date cannot be provided for the {0} mode")]
    DateNotAllowed(GameMode),
    /// Archive rounds must name the day to replay.
    #[error("a date is required for the archive mode")]
    ArchiveDateRequired,
    /// Archive rounds can only replay days that are over.
    #[error("archive date {requested} must be before {today}")]
    ArchiveDateNotInPast { requested: Date, today: Date },
}

const STANDARD_CLIP_SECONDS: u32 = 16;
const RAPID_CLIP_SECONDS: u32 = 3;

impl GameMode {
    /// Every mode, in display order.
    pub const ALL: [GameMode; 5] = [
        GameMode::Original,
        GameMode::Daily,
        GameMode::Rapid,
        GameMode::Lyrics,
        GameMode::Archive,
    ];

    /// Policy table entry for this mode.
    pub const fn policy(self) -> ModePolicy {
        match self {
            GameMode::Original => ModePolicy {
                source: ContentSource::RandomSong,
                prompt: PromptKind::AudioClip {
                    clip_length_seconds: STANDARD_CLIP_SECONDS,
                },
                date_rule: DateRule::Forbidden,
                maximum_attempts: 6,
                expiry: SessionExpiry::Minutes(15),
            },
            GameMode::Daily => ModePolicy {
                source: ContentSource::PinnedToDate,
                prompt: PromptKind::AudioClip {
                    clip_length_seconds: STANDARD_CLIP_SECONDS,
                },
                date_rule: DateRule::Today,
                maximum_attempts: 6,
                expiry: SessionExpiry::EndOfDay,
            },
            GameMode::Rapid => ModePolicy {
                source: ContentSource::RandomSong,
                prompt: PromptKind::AudioClip {
                    clip_length_seconds: RAPID_CLIP_SECONDS,
                },
                date_rule: DateRule::Forbidden,
                maximum_attempts: 1,
                expiry: SessionExpiry::Minutes(2),
            },
            GameMode::Lyrics => ModePolicy {
                source: ContentSource::RandomSong,
                prompt: PromptKind::MaskedLyrics,
                date_rule: DateRule::Forbidden,
                maximum_attempts: 1,
                expiry: SessionExpiry::Minutes(2),
            },
            GameMode::Archive => ModePolicy {
                source: ContentSource::PinnedToDate,
                prompt: PromptKind::AudioClip {
                    clip_length_seconds: STANDARD_CLIP_SECONDS,
                },
                date_rule: DateRule::RequiredPast,
                maximum_attempts: 6,
                expiry: SessionExpiry::Minutes(15),
            },
        }
    }

    /// Upper bound on guesses for this mode.
    pub const fn maximum_attempts(self) -> u32 {
        self.policy().maximum_attempts
    }

    /// Whether rounds of this mode are tied to a calendar date.
    pub const fn is_dated(self) -> bool {
        matches!(self.policy().source, ContentSource::PinnedToDate)
    }

    /// Lowercase identifier used on the wire and in storage.
    pub const fn as_str(self) -> &'static str {
        match self {
            GameMode::Original => "original",
            GameMode::Daily => "daily",
            GameMode::Rapid => "rapid",
            GameMode::Lyrics => "lyrics",
            GameMode::Archive => "archive",
        }
    }
}

impl std::fmt::Display for GameMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ModePolicy {
    /// Apply the date rule to a start request, returning the date the round is pinned to.
    pub fn resolve_date(
        &self,
        mode: GameMode,
        requested: Option<Date>,
        today: Date,
    ) -> Result<Option<Date>, RoundRequestError> {
        match (self.date_rule, requested) {
            (DateRule::Forbidden | DateRule::Today, Some(_)) => {
                Err(RoundRequestError::DateNotAllowed(mode))
            }
            (DateRule::Forbidden, None) => Ok(None),
            (DateRule::Today, None) => Ok(Some(today)),
            (DateRule::RequiredPast, None) => Err(RoundRequestError::ArchiveDateRequired),
            (DateRule::RequiredPast, Some(requested)) if requested >= today => {
                Err(RoundRequestError::ArchiveDateNotInPast { requested, today })
            }
            (DateRule::RequiredPast, Some(requested)) => Ok(Some(requested)),
        }
    }

    /// Lifetime of a session created at `now`.
    pub fn session_lifetime(&self, now: OffsetDateTime) -> Duration {
        match self.expiry {
            SessionExpiry::Minutes(minutes) => Duration::minutes(minutes),
            SessionExpiry::EndOfDay => match now.date().next_day() {
                Some(tomorrow) => tomorrow.midnight().assume_utc() - now,
                None => Duration::DAY,
            },
        }
    }

    /// Clip length for audio prompts, `None` for lyric prompts.
    pub fn clip_length_seconds(&self) -> Option<u32> {
        match self.prompt {
            PromptKind::AudioClip {
                clip_length_seconds,
            } => Some(clip_length_seconds),
            PromptKind::MaskedLyrics => None,
        }
    }

    /// Latest offset at which a clip still fits inside a song of `duration_seconds`.
    pub fn latest_clip_start(&self, duration_seconds: u32) -> u32 {
        let clip = self.clip_length_seconds().unwrap_or(0);
        duration_seconds.saturating_sub(clip)
    }

    /// Uniformly random clip offset fitting the song duration.
    pub fn random_clip_start<R: Rng>(&self, duration_seconds: u32, rng: &mut R) -> u32 {
        rng.random_range(0..=self.latest_clip_start(duration_seconds))
    }

    /// Clamp a stored offset so the clip never runs past the end of the song.
    pub fn clamp_clip_start(&self, stored: u32, duration_seconds: u32) -> u32 {
        stored.min(self.latest_clip_start(duration_seconds))
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};
    use time::macros::{date, datetime};

    use super::*;

    const TODAY: Date = date!(2024 - 05 - 10);

    #[test]
    fn free_play_modes_reject_any_date() {
        for mode in [GameMode::Original, GameMode::Rapid, GameMode::Lyrics] {
            let err = mode
                .policy()
                .resolve_date(mode, Some(date!(2024 - 05 - 01)), TODAY)
                .unwrap_err();
            assert_eq!(err, RoundRequestError::DateNotAllowed(mode));
            assert_eq!(mode.policy().resolve_date(mode, None, TODAY), Ok(None));
        }
    }

    #[test]
    fn daily_is_pinned_to_today_and_rejects_explicit_date() {
        let policy = GameMode::Daily.policy();
        assert_eq!(
            policy.resolve_date(GameMode::Daily, None, TODAY),
            Ok(Some(TODAY))
        );
        assert_eq!(
            policy.resolve_date(GameMode::Daily, Some(TODAY), TODAY),
            Err(RoundRequestError::DateNotAllowed(GameMode::Daily))
        );
    }

    #[test]
    fn archive_requires_a_past_date() {
        let policy = GameMode::Archive.policy();
        assert_eq!(
            policy.resolve_date(GameMode::Archive, None, TODAY),
            Err(RoundRequestError::ArchiveDateRequired)
        );
        assert!(matches!(
            policy.resolve_date(GameMode::Archive, Some(TODAY), TODAY),
            Err(RoundRequestError::ArchiveDateNotInPast { .. })
        ));
        assert!(matches!(
            policy.resolve_date(GameMode::Archive, Some(date!(2024 - 05 - 11)), TODAY),
            Err(RoundRequestError::ArchiveDateNotInPast { .. })
        ));
        assert_eq!(
            policy.resolve_date(GameMode::Archive, Some(date!(2024 - 05 - 09)), TODAY),
            Ok(Some(date!(2024 - 05 - 09)))
        );
    }

    #[test]
    fn attempt_limits_match_the_mode_table() {
        assert_eq!(GameMode::Original.maximum_attempts(), 6);
        assert_eq!(GameMode::Daily.maximum_attempts(), 6);
        assert_eq!(GameMode::Archive.maximum_attempts(), 6);
        assert_eq!(GameMode::Rapid.maximum_attempts(), 1);
        assert_eq!(GameMode::Lyrics.maximum_attempts(), 1);
    }

    #[test]
    fn daily_sessions_expire_at_next_utc_midnight() {
        let now = datetime!(2024-05-10 22:30 UTC);
        let lifetime = GameMode::Daily.policy().session_lifetime(now);
        assert_eq!(lifetime, Duration::minutes(90));
        assert_eq!(
            GameMode::Rapid.policy().session_lifetime(now),
            Duration::minutes(2)
        );
    }

    #[test]
    fn clip_offsets_always_fit_inside_the_song() {
        let mut rng = StdRng::seed_from_u64(7);
        let policy = GameMode::Original.policy();
        for _ in 0..200 {
            let start = policy.random_clip_start(40, &mut rng);
            assert!(start + 16 <= 40);
        }
        assert_eq!(policy.random_clip_start(10, &mut rng), 0);
        assert_eq!(policy.clamp_clip_start(100, 60), 44);
        assert_eq!(GameMode::Lyrics.policy().clip_length_seconds(), None);
    }
}
