use serde::{Deserialize, Serialize};
use time::{Date, Duration, OffsetDateTime};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::state::mode::GameMode;

/// Catalog entry for a playable song.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SongEntity {
    /// Stable identifier for the song.
    pub id: Uuid,
    /// Title players try to guess.
    pub title: String,
    /// Year the song was released.
    pub release_year: i32,
    /// Album the song appears on, when known.
    #[serde(default)]
    pub album: Option<String>,
    /// Performing artists in billing order.
    #[serde(default)]
    pub artists: Vec<String>,
    /// Public link revealed once the round is over.
    pub share_link: String,
    /// Object path of the audio file inside the storage bucket.
    pub audio_path: String,
    /// Lyrics with lines separated by `;`.
    #[serde(default)]
    pub lyrics: String,
    /// Length of the audio file in seconds.
    pub duration_seconds: u32,
}

impl SongEntity {
    /// Public description of the song, safe to reveal after a round.
    pub fn metadata(&self) -> SongMetadata {
        SongMetadata {
            id: self.id,
            title: self.title.clone(),
            release_year: self.release_year,
            album: self.album.clone(),
            artists: self.artists.clone(),
            share_link: self.share_link.clone(),
        }
    }
}

/// Song details revealed at the end of a round.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SongMetadata {
    /// Song identifier.
    pub id: Uuid,
    /// Song title.
    pub title: String,
    /// Release year.
    pub release_year: i32,
    /// Album, when known.
    pub album: Option<String>,
    /// Performing artists.
    pub artists: Vec<String>,
    /// Public link to the song.
    pub share_link: String,
}

/// Song scheduled for a calendar day together with its clip offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyPickEntity {
    /// Day the pick belongs to.
    pub date: Date,
    /// Scheduled song.
    pub song: SongEntity,
    /// Stored clip offset in seconds.
    pub audio_start_at: u32,
}

/// Final outcome of a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum GameOutcome {
    /// The answer was found.
    Win,
    /// Attempts ran out or the round expired.
    Lose,
}

impl GameOutcome {
    /// Map the client-reported flag onto an outcome.
    pub fn from_won(won: bool) -> Self {
        if won { Self::Win } else { Self::Lose }
    }

    /// Whether this outcome is a win.
    pub fn is_win(self) -> bool {
        matches!(self, Self::Win)
    }
}

/// Durable record of a submitted round. Unique on `session_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameResultEntity {
    /// Session the result belongs to.
    pub session_id: Uuid,
    /// Player who submitted, if authenticated.
    pub user_id: Option<Uuid>,
    /// Mode of the round.
    pub mode: GameMode,
    /// Win or loss.
    pub result: GameOutcome,
    /// Attempts used.
    pub attempts: u32,
    /// Song the round was built on.
    pub song_id: Uuid,
    /// Calendar day for daily and archive rounds.
    pub date: Option<Date>,
    /// Submission instant.
    pub submitted_at: OffsetDateTime,
}

/// Completed round reported to the post-submission hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameCompletion {
    /// Authenticated player.
    pub user_id: Uuid,
    /// Mode of the round.
    pub mode: GameMode,
    /// Whether the round was won.
    pub won: bool,
    /// Attempts used.
    pub attempts: u32,
    /// UTC day the result was submitted on.
    pub completed_on: Date,
}

/// Number of guess distribution buckets.
pub const GUESS_BUCKETS: usize = 6;

/// Aggregated per-user, per-mode statistics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatisticsEntity {
    /// Owner of the statistics.
    pub user_id: Uuid,
    /// Mode the statistics cover.
    pub mode: GameMode,
    /// Rounds submitted.
    pub games_played: u32,
    /// Rounds won.
    pub win_count: u32,
    /// Consecutive wins up to the latest round.
    pub current_streak: u32,
    /// Longest run of consecutive wins.
    pub maximum_streak: u32,
    /// Wins bucketed by attempts used, index 0 meaning a first-guess win.
    pub guess_distribution: [u32; GUESS_BUCKETS],
}

impl StatisticsEntity {
    /// Fresh statistics for a player who has not played the mode yet.
    pub fn empty(user_id: Uuid, mode: GameMode) -> Self {
        Self {
            user_id,
            mode,
            games_played: 0,
            win_count: 0,
            current_streak: 0,
            maximum_streak: 0,
            guess_distribution: [0; GUESS_BUCKETS],
        }
    }

    /// Fold one completed round into the aggregate.
    pub fn record(&mut self, won: bool, attempts: u32) {
        self.games_played += 1;

        if !won {
            self.current_streak = 0;
            return;
        }

        self.win_count += 1;
        self.current_streak += 1;
        self.maximum_streak = self.maximum_streak.max(self.current_streak);

        let bucket = usize::try_from(attempts)
            .ok()
            .and_then(|attempts| attempts.checked_sub(1))
            .filter(|bucket| *bucket < GUESS_BUCKETS);
        if let Some(bucket) = bucket {
            self.guess_distribution[bucket] += 1;
        }
    }
}

/// Time window a leaderboard counter covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaderboardPeriod {
    /// Current UTC day.
    Daily,
    /// Current ISO week, starting Monday.
    Weekly,
    /// Current calendar month.
    Monthly,
    /// Since the beginning.
    AllTime,
}

impl LeaderboardPeriod {
    /// Periods tracked for a mode. Only the original mode has a daily board.
    pub fn tracked_for(mode: GameMode) -> &'static [LeaderboardPeriod] {
        match mode {
            GameMode::Original => &[
                LeaderboardPeriod::Daily,
                LeaderboardPeriod::Weekly,
                LeaderboardPeriod::Monthly,
                LeaderboardPeriod::AllTime,
            ],
            _ => &[
                LeaderboardPeriod::Weekly,
                LeaderboardPeriod::Monthly,
                LeaderboardPeriod::AllTime,
            ],
        }
    }

    /// First day of the window containing `day`; `None` for the all-time board.
    pub fn window_start(self, day: Date) -> Option<Date> {
        match self {
            LeaderboardPeriod::Daily => Some(day),
            LeaderboardPeriod::Weekly => {
                let offset = i64::from(day.weekday().number_days_from_monday());
                Some(day - Duration::days(offset))
            }
            LeaderboardPeriod::Monthly => day.replace_day(1).ok(),
            LeaderboardPeriod::AllTime => None,
        }
    }

    /// Lowercase identifier used in storage keys.
    pub fn as_str(self) -> &'static str {
        match self {
            LeaderboardPeriod::Daily => "daily",
            LeaderboardPeriod::Weekly => "weekly",
            LeaderboardPeriod::Monthly => "monthly",
            LeaderboardPeriod::AllTime => "all_time",
        }
    }
}

/// Key of a single leaderboard counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LeaderboardKey {
    /// Player the counter belongs to.
    pub user_id: Uuid,
    /// Mode the counter covers.
    pub mode: GameMode,
    /// Window kind.
    pub period: LeaderboardPeriod,
    /// First day of the window, absent for the all-time board.
    pub window_start: Option<Date>,
}

impl LeaderboardKey {
    /// Every counter a win on `completion` contributes to.
    pub fn for_completion(completion: &GameCompletion) -> Vec<LeaderboardKey> {
        LeaderboardPeriod::tracked_for(completion.mode)
            .iter()
            .map(|period| LeaderboardKey {
                user_id: completion.user_id,
                mode: completion.mode,
                period: *period,
                window_start: period.window_start(completion.completed_on),
            })
            .collect()
    }
}
