//! Process-local storage backend.
//!
//! Serves the catalog from a JSON seed file and keeps results, statistics and
//! leaderboard counters in memory. Used when no database is configured and by
//! the test suite.

use std::{fs, path::Path, sync::Arc};

use dashmap::{DashMap, mapref::entry::Entry};
use futures::future::{self, BoxFuture};
use rand::seq::IndexedRandom;
use serde::Deserialize;
use thiserror::Error;
use time::Date;
use uuid::Uuid;

use super::{
    CompletionHook, ContentProvider, HealthProbe, InsertOutcome, ResultStore, StorageBackend,
};
use crate::{
    dao::{
        models::{
            DailyPickEntity, GameCompletion, GameResultEntity, LeaderboardKey, SongEntity,
            SongMetadata, StatisticsEntity,
        },
        storage::StorageResult,
    },
    state::mode::GameMode,
};

/// Failures while loading a catalog seed.
#[derive(Debug, Error)]
pub enum SeedError {
    /// The file could not be read.
    #[error("failed to read catalog seed `{path}`")]
    Read {
        /// Seed file path.
        path: String,
        /// I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The file is not a valid seed.
    #[error("failed to parse catalog seed `{path}`")]
    Parse {
        /// Seed file path.
        path: String,
        /// JSON error.
        #[source]
        source: serde_json::Error,
    },
    /// A daily entry points at a song missing from the seed.
    #[error("daily pick for {date} references unknown song `{song_id}`")]
    UnknownSong {
        /// Scheduled day.
        date: Date,
        /// Missing song.
        song_id: Uuid,
    },
}

/// JSON layout of a catalog seed file.
#[derive(Debug, Default, Deserialize)]
pub struct CatalogSeed {
    /// Playable songs.
    #[serde(default)]
    pub songs: Vec<SongEntity>,
    /// Daily schedule.
    #[serde(default)]
    pub daily: Vec<DailySeed>,
}

/// One scheduled day inside a [`CatalogSeed`].
#[derive(Debug, Deserialize)]
pub struct DailySeed {
    /// Scheduled day.
    pub date: Date,
    /// Song played that day.
    pub song_id: Uuid,
    /// Clip offset in seconds.
    #[serde(default)]
    pub audio_start_at: u32,
}

#[derive(Default)]
struct MemoryInner {
    songs: DashMap<Uuid, SongEntity>,
    daily: DashMap<Date, (Uuid, u32)>,
    results: DashMap<Uuid, GameResultEntity>,
    daily_claims: DashMap<(Uuid, Date), Uuid>,
    statistics: DashMap<(Uuid, GameMode), StatisticsEntity>,
    leaderboards: DashMap<LeaderboardKey, u32>,
}

/// In-memory implementation of every storage trait.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

impl MemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from an already parsed seed.
    pub fn from_seed(seed: CatalogSeed) -> Result<Self, SeedError> {
        let store = Self::new();
        for song in seed.songs {
            store.insert_song(song);
        }
        for day in seed.daily {
            if !store.inner.songs.contains_key(&day.song_id) {
                return Err(SeedError::UnknownSong {
                    date: day.date,
                    song_id: day.song_id,
                });
            }
            store.schedule_daily(day.date, day.song_id, day.audio_start_at);
        }
        Ok(store)
    }

    /// Read and parse a JSON seed file.
    pub fn load_seed_file(path: &Path) -> Result<Self, SeedError> {
        let display = path.display().to_string();
        let contents = fs::read_to_string(path).map_err(|source| SeedError::Read {
            path: display.clone(),
            source,
        })?;
        let seed = serde_json::from_str::<CatalogSeed>(&contents).map_err(|source| {
            SeedError::Parse {
                path: display,
                source,
            }
        })?;
        Self::from_seed(seed)
    }

    /// Add or replace a catalog entry.
    pub fn insert_song(&self, song: SongEntity) {
        self.inner.songs.insert(song.id, song);
    }

    /// Schedule `song_id` as the pick of `date`.
    pub fn schedule_daily(&self, date: Date, song_id: Uuid, audio_start_at: u32) {
        self.inner.daily.insert(date, (song_id, audio_start_at));
    }

    /// Stored result for a session.
    pub fn result(&self, session_id: &Uuid) -> Option<GameResultEntity> {
        self.inner.results.get(session_id).map(|entry| entry.value().clone())
    }

    /// Current statistics of a player for a mode.
    pub fn statistics(&self, user_id: Uuid, mode: GameMode) -> Option<StatisticsEntity> {
        self.inner
            .statistics
            .get(&(user_id, mode))
            .map(|entry| entry.value().clone())
    }

    /// Wins recorded under a leaderboard key.
    pub fn leaderboard_wins(&self, key: &LeaderboardKey) -> u32 {
        self.inner
            .leaderboards
            .get(key)
            .map(|entry| *entry)
            .unwrap_or(0)
    }

    /// Storage handles served by this store, completion hooks included.
    pub fn backend(&self) -> StorageBackend {
        self.completion_hooks()
            .into_iter()
            .fold(StorageBackend::from_store(self.clone()), StorageBackend::with_hook)
    }

    /// Statistics and leaderboard hooks writing into this store.
    pub fn completion_hooks(&self) -> Vec<Arc<dyn CompletionHook>> {
        vec![
            Arc::new(MemoryStatisticsHook {
                store: self.clone(),
            }),
            Arc::new(MemoryLeaderboardHook {
                store: self.clone(),
            }),
        ]
    }

    fn pick_random(&self) -> Option<SongEntity> {
        let ids: Vec<Uuid> = self.inner.songs.iter().map(|entry| *entry.key()).collect();
        let id = *ids.choose(&mut rand::rng())?;
        self.inner.songs.get(&id).map(|entry| entry.value().clone())
    }

    fn find_daily(&self, date: Date) -> Option<DailyPickEntity> {
        let (song_id, audio_start_at) = *self.inner.daily.get(&date)?;
        let song = self.inner.songs.get(&song_id)?.value().clone();
        Some(DailyPickEntity {
            date,
            song,
            audio_start_at,
        })
    }

    fn sorted_titles(&self) -> Vec<String> {
        let mut titles: Vec<String> = self
            .inner
            .songs
            .iter()
            .map(|entry| entry.title.clone())
            .collect();
        titles.sort();
        titles
    }

    // Lock order: `results` entry first, then `daily_claims`.
    fn insert(&self, result: GameResultEntity) -> InsertOutcome {
        let Entry::Vacant(slot) = self.inner.results.entry(result.session_id) else {
            return InsertOutcome::Duplicate;
        };

        if let Some((user_id, date)) = daily_claim(&result) {
            match self.inner.daily_claims.entry((user_id, date)) {
                Entry::Occupied(_) => return InsertOutcome::DailyAlreadyPlayed(date),
                Entry::Vacant(claim) => {
                    claim.insert(result.session_id);
                }
            }
        }

        slot.insert(result);
        InsertOutcome::Inserted
    }

    fn played_daily(&self, user_id: Uuid, date: Date) -> bool {
        self.inner.daily_claims.contains_key(&(user_id, date))
    }
}

fn daily_claim(result: &GameResultEntity) -> Option<(Uuid, Date)> {
    match (result.mode, result.user_id, result.date) {
        (GameMode::Daily, Some(user_id), Some(date)) => Some((user_id, date)),
        _ => None,
    }
}

impl ContentProvider for MemoryStore {
    fn random_song(&self) -> BoxFuture<'static, StorageResult<Option<SongEntity>>> {
        Box::pin(future::ready(Ok(self.pick_random())))
    }

    fn daily_pick(
        &self,
        date: Date,
    ) -> BoxFuture<'static, StorageResult<Option<DailyPickEntity>>> {
        Box::pin(future::ready(Ok(self.find_daily(date))))
    }

    fn song_metadata(
        &self,
        song_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<SongMetadata>>> {
        let metadata = self.inner.songs.get(&song_id).map(|song| song.metadata());
        Box::pin(future::ready(Ok(metadata)))
    }

    fn song_titles(&self) -> BoxFuture<'static, StorageResult<Vec<String>>> {
        Box::pin(future::ready(Ok(self.sorted_titles())))
    }
}

impl ResultStore for MemoryStore {
    fn result_exists(&self, session_id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let exists = self.inner.results.contains_key(&session_id);
        Box::pin(future::ready(Ok(exists)))
    }

    fn insert_result(
        &self,
        result: GameResultEntity,
    ) -> BoxFuture<'static, StorageResult<InsertOutcome>> {
        Box::pin(future::ready(Ok(self.insert(result))))
    }

    fn daily_already_played(
        &self,
        user_id: Uuid,
        date: Date,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        Box::pin(future::ready(Ok(self.played_daily(user_id, date))))
    }
}

impl HealthProbe for MemoryStore {
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(future::ready(Ok(())))
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(future::ready(Ok(())))
    }
}

struct MemoryStatisticsHook {
    store: MemoryStore,
}

impl CompletionHook for MemoryStatisticsHook {
    fn name(&self) -> &'static str {
        "statistics"
    }

    fn on_game_completed(
        &self,
        completion: GameCompletion,
    ) -> BoxFuture<'static, StorageResult<()>> {
        self.store
            .inner
            .statistics
            .entry((completion.user_id, completion.mode))
            .or_insert_with(|| StatisticsEntity::empty(completion.user_id, completion.mode))
            .record(completion.won, completion.attempts);
        Box::pin(future::ready(Ok(())))
    }
}

struct MemoryLeaderboardHook {
    store: MemoryStore,
}

impl CompletionHook for MemoryLeaderboardHook {
    fn name(&self) -> &'static str {
        "leaderboard"
    }

    fn on_game_completed(
        &self,
        completion: GameCompletion,
    ) -> BoxFuture<'static, StorageResult<()>> {
        if completion.won {
            for key in LeaderboardKey::for_completion(&completion) {
                *self.store.inner.leaderboards.entry(key).or_insert(0) += 1;
            }
        }
        Box::pin(future::ready(Ok(())))
    }
}
