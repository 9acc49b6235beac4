//! Document shapes stored in MongoDB.
//!
//! Identifiers are stored as hyphenated UUID strings and calendar days as
//! `YYYY-MM-DD` strings so documents stay readable from the shell.

use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime, macros::format_description};
use uuid::Uuid;

use super::error::{MongoDaoError, MongoResult};
use crate::{
    dao::models::{
        GUESS_BUCKETS, GameOutcome, GameResultEntity, LeaderboardKey, SongEntity,
        StatisticsEntity,
    },
    state::mode::GameMode,
};

pub const SONG_COLLECTION: &str = "songs";
pub const DAILY_COLLECTION: &str = "daily_games";
pub const RESULT_COLLECTION: &str = "game_results";
pub const STATISTICS_COLLECTION: &str = "statistics";
pub const LEADERBOARD_COLLECTION: &str = "leaderboards";

/// Catalog entry as stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoSongDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub release_year: i32,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub artists: Vec<String>,
    pub share_link: String,
    pub audio_path: String,
    #[serde(default)]
    pub lyrics: String,
    pub duration_seconds: u32,
}

impl TryFrom<MongoSongDocument> for SongEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoSongDocument) -> MongoResult<Self> {
        let id = parse_uuid(SONG_COLLECTION, &value.id, &value.id)?;
        Ok(Self {
            id,
            title: value.title,
            release_year: value.release_year,
            album: value.album,
            artists: value.artists,
            share_link: value.share_link,
            audio_path: value.audio_path,
            lyrics: value.lyrics,
            duration_seconds: value.duration_seconds,
        })
    }
}

/// Projection used to list titles.
#[derive(Debug, Clone, Deserialize)]
pub struct MongoTitleDocument {
    pub title: String,
}

/// Daily schedule entry, keyed by date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoDailyDocument {
    #[serde(rename = "_id")]
    pub date: String,
    pub song_id: String,
    #[serde(default)]
    pub audio_start_at: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct MongoResultDocument {
    #[serde(rename = "_id")]
    pub session_id: String,
    pub user_id: Option<String>,
    pub mode: GameMode,
    pub result: GameOutcome,
    pub attempts: u32,
    pub song_id: String,
    pub date: Option<String>,
    pub submitted_at: DateTime,
}

impl From<GameResultEntity> for MongoResultDocument {
    fn from(value: GameResultEntity) -> Self {
        Self {
            session_id: value.session_id.to_string(),
            user_id: value.user_id.map(|id| id.to_string()),
            mode: value.mode,
            result: value.result,
            attempts: value.attempts,
            song_id: value.song_id.to_string(),
            date: value.date.map(date_key),
            submitted_at: bson_datetime(value.submitted_at),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoStatisticsDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub mode: GameMode,
    pub games_played: u32,
    pub win_count: u32,
    pub current_streak: u32,
    pub maximum_streak: u32,
    pub guess_distribution: [u32; GUESS_BUCKETS],
    /// Bumped on every write; replacements are conditional on the version read.
    #[serde(default)]
    pub version: i64,
}

impl MongoStatisticsDocument {
    /// Document id of a player's statistics for a mode.
    pub fn key(user_id: Uuid, mode: GameMode) -> String {
        format!("{user_id}:{mode}")
    }
}

impl From<StatisticsEntity> for MongoStatisticsDocument {
    fn from(value: StatisticsEntity) -> Self {
        Self {
            id: Self::key(value.user_id, value.mode),
            user_id: value.user_id.to_string(),
            mode: value.mode,
            games_played: value.games_played,
            win_count: value.win_count,
            current_streak: value.current_streak,
            maximum_streak: value.maximum_streak,
            guess_distribution: value.guess_distribution,
            version: 0,
        }
    }
}

impl TryFrom<MongoStatisticsDocument> for StatisticsEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoStatisticsDocument) -> MongoResult<Self> {
        let user_id = parse_uuid(STATISTICS_COLLECTION, &value.id, &value.user_id)?;
        Ok(Self {
            user_id,
            mode: value.mode,
            games_played: value.games_played,
            win_count: value.win_count,
            current_streak: value.current_streak,
            maximum_streak: value.maximum_streak,
            guess_distribution: value.guess_distribution,
        })
    }
}

/// Document id of a leaderboard counter.
pub fn leaderboard_key(key: &LeaderboardKey) -> String {
    let window = key
        .window_start
        .map(date_key)
        .unwrap_or_else(|| "all".to_owned());
    format!(
        "{}:{}:{}:{}",
        key.user_id,
        key.mode,
        key.period.as_str(),
        window
    )
}

/// ISO `YYYY-MM-DD` form used for ids and date fields.
pub fn date_key(date: Date) -> String {
    date.to_string()
}

/// Inverse of [`date_key`].
pub fn parse_date(collection: &'static str, value: &str) -> MongoResult<Date> {
    Date::parse(value, format_description!("[year]-[month]-[day]")).map_err(|err| {
        MongoDaoError::InvalidDocument {
            collection,
            id: value.to_owned(),
            reason: err.to_string(),
        }
    })
}

pub fn parse_uuid(
    collection: &'static str,
    document_id: &str,
    value: &str,
) -> MongoResult<Uuid> {
    Uuid::parse_str(value).map_err(|err| MongoDaoError::InvalidDocument {
        collection,
        id: document_id.to_owned(),
        reason: err.to_string(),
    })
}

fn bson_datetime(value: OffsetDateTime) -> DateTime {
    let millis = value.unix_timestamp_nanos() / 1_000_000;
    DateTime::from_millis(i64::try_from(millis).unwrap_or(i64::MAX))
}

#[cfg(test)]
mod tests {
    use time::macros::{date, datetime};

    use super::*;
    use crate::dao::models::LeaderboardPeriod;

    #[test]
    fn dates_round_trip_through_their_key() {
        let day = date!(2024 - 05 - 09);
        assert_eq!(date_key(day), "2024-05-09");
        assert_eq!(parse_date(DAILY_COLLECTION, "2024-05-09").unwrap(), day);
        assert!(parse_date(DAILY_COLLECTION, "09/05/2024").is_err());
    }

    #[test]
    fn result_documents_use_the_session_as_primary_key() {
        let session_id = Uuid::new_v4();
        let document = MongoResultDocument::from(GameResultEntity {
            session_id,
            user_id: None,
            mode: GameMode::Archive,
            result: GameOutcome::Lose,
            attempts: 6,
            song_id: Uuid::nil(),
            date: Some(date!(2024 - 05 - 09)),
            submitted_at: datetime!(2024-05-10 00:00:01 UTC),
        });
        assert_eq!(document.session_id, session_id.to_string());
        assert_eq!(document.date.as_deref(), Some("2024-05-09"));
        assert_eq!(document.submitted_at.timestamp_millis(), 1_715_299_201_000);
    }

    #[test]
    fn leaderboard_keys_separate_windows() {
        let key = LeaderboardKey {
            user_id: Uuid::nil(),
            mode: GameMode::Original,
            period: LeaderboardPeriod::AllTime,
            window_start: None,
        };
        assert_eq!(
            leaderboard_key(&key),
            "00000000-0000-0000-0000-000000000000:original:all_time:all"
        );
        let weekly = LeaderboardKey {
            period: LeaderboardPeriod::Weekly,
            window_start: Some(date!(2024 - 05 - 13)),
            ..key
        };
        assert!(leaderboard_key(&weekly).ends_with(":weekly:2024-05-13"));
    }
}
