/// Process-local backend.
pub mod memory;
/// MongoDB backend.
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use std::sync::Arc;

use futures::future::BoxFuture;
use time::Date;
use uuid::Uuid;

use crate::dao::models::{
    DailyPickEntity, GameCompletion, GameResultEntity, SongEntity, SongMetadata,
};
use crate::dao::storage::StorageResult;

/// Outcome of persisting a result row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The row was written.
    Inserted,
    /// A row for the same session already existed; nothing was written.
    Duplicate,
    /// The player already has a daily result for this date; nothing was written.
    DailyAlreadyPlayed(Date),
}

/// Read access to the song catalog and the daily schedule.
pub trait ContentProvider: Send + Sync {
    /// Uniformly random song, `None` when the catalog is empty.
    fn random_song(&self) -> BoxFuture<'static, StorageResult<Option<SongEntity>>>;
    /// Song scheduled for `date`, if any.
    fn daily_pick(
        &self,
        date: Date,
    ) -> BoxFuture<'static, StorageResult<Option<DailyPickEntity>>>;
    /// Public details of a song.
    fn song_metadata(
        &self,
        song_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<SongMetadata>>>;
    /// Every song title, sorted alphabetically.
    fn song_titles(&self) -> BoxFuture<'static, StorageResult<Vec<String>>>;
}

/// Durable store of submitted results.
pub trait ResultStore: Send + Sync {
    /// Whether a result was already stored for `session_id`.
    fn result_exists(&self, session_id: Uuid) -> BoxFuture<'static, StorageResult<bool>>;
    /// Write a result once.
    ///
    /// A second write for the same session reports [`InsertOutcome::Duplicate`]. A
    /// second daily result for the same player and date reports
    /// [`InsertOutcome::DailyAlreadyPlayed`], even when both writes race.
    fn insert_result(
        &self,
        result: GameResultEntity,
    ) -> BoxFuture<'static, StorageResult<InsertOutcome>>;
    /// Whether `user_id` already has a daily result for `date`.
    fn daily_already_played(
        &self,
        user_id: Uuid,
        date: Date,
    ) -> BoxFuture<'static, StorageResult<bool>>;
}

/// Side effect run after a result from an authenticated player was stored.
pub trait CompletionHook: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;
    /// Apply the completed game.
    fn on_game_completed(
        &self,
        completion: GameCompletion,
    ) -> BoxFuture<'static, StorageResult<()>>;
}

/// Connectivity checks used by the storage supervisor.
pub trait HealthProbe: Send + Sync {
    /// Cheap round trip to the backend.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Re-establish the connection after a failed health check.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}

/// Storage handles installed into the application state once a backend is reachable.
#[derive(Clone)]
pub struct StorageBackend {
    /// Catalog access.
    pub content: Arc<dyn ContentProvider>,
    /// Result persistence.
    pub results: Arc<dyn ResultStore>,
    /// Connectivity checks.
    pub health: Arc<dyn HealthProbe>,
    /// Hooks run after each stored result.
    pub hooks: Vec<Arc<dyn CompletionHook>>,
}

impl StorageBackend {
    /// Use a single store for catalog, results and health checks.
    pub fn from_store<S>(store: S) -> Self
    where
        S: ContentProvider + ResultStore + HealthProbe + 'static,
    {
        let store = Arc::new(store);
        Self {
            content: store.clone(),
            results: store.clone(),
            health: store,
            hooks: Vec::new(),
        }
    }

    /// Register an additional completion hook.
    pub fn with_hook(mut self, hook: Arc<dyn CompletionHook>) -> Self {
        self.hooks.push(hook);
        self
    }
}
