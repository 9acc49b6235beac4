mod config;
mod connection;
mod error;
mod hooks;
mod models;
mod store;

use std::sync::Arc;

pub use config::MongoConfig;
pub use error::MongoDaoError;
pub use hooks::{MongoLeaderboardHook, MongoStatisticsHook};
pub use store::MongoHeardleStore;

use crate::dao::{heardle_store::StorageBackend, storage::StorageError};

impl From<MongoDaoError> for StorageError {
    fn from(err: MongoDaoError) -> Self {
        match err {
            MongoDaoError::InvalidDocument { .. } => StorageError::invalid_record(err.to_string()),
            other => StorageError::unavailable(other.to_string(), other),
        }
    }
}

/// Connect to MongoDB and wire the statistics and leaderboard hooks.
pub async fn connect_backend(config: MongoConfig) -> Result<StorageBackend, StorageError> {
    let store = MongoHeardleStore::connect(config).await?;
    Ok(StorageBackend::from_store(store.clone())
        .with_hook(Arc::new(MongoStatisticsHook::new(store.clone())))
        .with_hook(Arc::new(MongoLeaderboardHook::new(store))))
}
