use futures::future::BoxFuture;
use mongodb::bson::{Document, doc};

use super::{
    error::{MongoDaoError, MongoResult},
    models::{
        LEADERBOARD_COLLECTION, MongoStatisticsDocument, STATISTICS_COLLECTION, date_key,
        leaderboard_key,
    },
    store::{MongoHeardleStore, is_duplicate_key},
};
use crate::dao::{
    heardle_store::CompletionHook,
    models::{GameCompletion, LeaderboardKey, StatisticsEntity},
    storage::StorageResult,
};

/// Folds each completed round into the player's per-mode statistics document.
#[derive(Clone)]
pub struct MongoStatisticsHook {
    store: MongoHeardleStore,
}

const STATISTICS_WRITE_ATTEMPTS: u32 = 5;

impl MongoStatisticsHook {
    /// Hook writing into `store`'s statistics collection.
    pub fn new(store: MongoHeardleStore) -> Self {
        Self { store }
    }

    async fn apply(&self, completion: GameCompletion) -> MongoResult<()> {
        let collection = self
            .store
            .database()
            .await
            .collection::<MongoStatisticsDocument>(STATISTICS_COLLECTION);
        let id = MongoStatisticsDocument::key(completion.user_id, completion.mode);

        for _ in 0..STATISTICS_WRITE_ATTEMPTS {
            let current = collection
                .find_one(doc! { "_id": id.as_str() })
                .await
                .map_err(MongoDaoError::query(STATISTICS_COLLECTION, "find"))?;

            let Some(current) = current else {
                let document = first_statistics(completion);
                match collection.insert_one(&document).await {
                    Ok(_) => return Ok(()),
                    Err(err) if is_duplicate_key(&err) => continue,
                    Err(source) => {
                        return Err(MongoDaoError::Query {
                            collection: STATISTICS_COLLECTION,
                            operation: "insert",
                            source,
                        });
                    }
                }
            };

            let (filter, document) = next_statistics(current, completion)?;
            let outcome = collection
                .replace_one(filter, document)
                .await
                .map_err(MongoDaoError::query(STATISTICS_COLLECTION, "replace"))?;
            if outcome.matched_count == 1 {
                return Ok(());
            }
        }

        Err(MongoDaoError::WriteConflict {
            collection: STATISTICS_COLLECTION,
            id,
            attempts: STATISTICS_WRITE_ATTEMPTS,
        })
    }
}

/// Statistics document of a player's first completed game in a mode.
fn first_statistics(completion: GameCompletion) -> MongoStatisticsDocument {
    let mut statistics = StatisticsEntity::empty(completion.user_id, completion.mode);
    statistics.record(completion.won, completion.attempts);
    MongoStatisticsDocument {
        version: 1,
        ..MongoStatisticsDocument::from(statistics)
    }
}

/// Conditional replacement of `current`: the filter only matches the version that was read.
fn next_statistics(
    current: MongoStatisticsDocument,
    completion: GameCompletion,
) -> MongoResult<(Document, MongoStatisticsDocument)> {
    let read_version = current.version;
    let filter = doc! { "_id": current.id.as_str(), "version": read_version };

    let mut statistics = StatisticsEntity::try_from(current)?;
    statistics.record(completion.won, completion.attempts);
    let document = MongoStatisticsDocument {
        version: read_version + 1,
        ..MongoStatisticsDocument::from(statistics)
    };
    Ok((filter, document))
}

impl CompletionHook for MongoStatisticsHook {
    fn name(&self) -> &'static str {
        "statistics"
    }

    fn on_game_completed(
        &self,
        completion: GameCompletion,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let hook = self.clone();
        Box::pin(async move { hook.apply(completion).await.map_err(Into::into) })
    }
}

/// Increments the player's win counters for every leaderboard window of the mode.
#[derive(Clone)]
pub struct MongoLeaderboardHook {
    store: MongoHeardleStore,
}

impl MongoLeaderboardHook {
    /// Hook writing into `store`'s leaderboard collection.
    pub fn new(store: MongoHeardleStore) -> Self {
        Self { store }
    }

    async fn apply(&self, completion: GameCompletion) -> MongoResult<()> {
        if !completion.won {
            return Ok(());
        }

        let collection = self
            .store
            .database()
            .await
            .collection::<Document>(LEADERBOARD_COLLECTION);

        for key in LeaderboardKey::for_completion(&completion) {
            collection
                .update_one(
                    doc! { "_id": leaderboard_key(&key) },
                    doc! {
                        "$inc": { "wins": 1 },
                        "$setOnInsert": {
                            "user_id": key.user_id.to_string(),
                            "mode": key.mode.as_str(),
                            "period": key.period.as_str(),
                            "window_start": key.window_start.map(date_key),
                        },
                    },
                )
                .upsert(true)
                .await
                .map_err(MongoDaoError::query(LEADERBOARD_COLLECTION, "update"))?;
        }
        Ok(())
    }
}

impl CompletionHook for MongoLeaderboardHook {
    fn name(&self) -> &'static str {
        "leaderboard"
    }

    fn on_game_completed(
        &self,
        completion: GameCompletion,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let hook = self.clone();
        Box::pin(async move { hook.apply(completion).await.map_err(Into::into) })
    }
}

#[cfg(test)]
mod tests {
    use time::macros::date;
    use uuid::Uuid;

    use super::*;
    use crate::state::mode::GameMode;

    fn completion(won: bool, attempts: u32) -> GameCompletion {
        GameCompletion {
            user_id: Uuid::nil(),
            mode: GameMode::Original,
            won,
            attempts,
            completed_on: date!(2024 - 05 - 10),
        }
    }

    #[test]
    fn first_game_starts_at_version_one() {
        let document = first_statistics(completion(true, 2));
        assert_eq!(document.version, 1);
        assert_eq!(document.games_played, 1);
        assert_eq!(document.guess_distribution[1], 1);
    }

    #[test]
    fn replacement_is_conditional_on_the_version_read() {
        let current = MongoStatisticsDocument {
            version: 7,
            ..first_statistics(completion(true, 2))
        };

        let (filter, document) = next_statistics(current, completion(false, 6)).unwrap();
        assert_eq!(filter.get_i64("version").unwrap(), 7);
        assert_eq!(
            filter.get_str("_id").unwrap(),
            MongoStatisticsDocument::key(Uuid::nil(), GameMode::Original)
        );
        assert_eq!(document.version, 8);
        assert_eq!(document.games_played, 2);
        assert_eq!(document.win_count, 1);
    }
}
