use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Collection, Database, IndexModel,
    bson::{Document, doc},
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::IndexOptions,
};
use time::Date;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{
        DAILY_COLLECTION, MongoDailyDocument, MongoResultDocument, MongoSongDocument,
        MongoTitleDocument, RESULT_COLLECTION, SONG_COLLECTION, date_key, parse_date, parse_uuid,
    },
};
use crate::{
    dao::{
        heardle_store::{ContentProvider, HealthProbe, InsertOutcome, ResultStore},
        models::{DailyPickEntity, GameResultEntity, SongEntity, SongMetadata},
        storage::StorageResult,
    },
    state::mode::GameMode,
};

const DUPLICATE_KEY_CODE: i32 = 11000;
const DAILY_ONCE_INDEX: &str = "result_daily_once_idx";

/// MongoDB implementation of the catalog and result stores.
#[derive(Clone)]
pub struct MongoHeardleStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    database: RwLock<Database>,
    config: MongoConfig,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = self.database.read().await.clone();
        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (_client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        *self.database.write().await = database;
        Ok(())
    }
}

impl MongoHeardleStore {
    /// Connect to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (_client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let store = Self {
            inner: Arc::new(MongoInner {
                database: RwLock::new(database),
                config,
            }),
        };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let database = self.database().await;

        let results = database.collection::<Document>(RESULT_COLLECTION);
        results
            .create_index(daily_once_index())
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: RESULT_COLLECTION,
                index: "user_id,date,mode (daily, unique)",
                source,
            })?;

        let songs = database.collection::<Document>(SONG_COLLECTION);
        let by_title = IndexModel::builder()
            .keys(doc! { "title": 1 })
            .options(
                IndexOptions::builder()
                    .name(Some("song_title_idx".to_owned()))
                    .build(),
            )
            .build();
        songs
            .create_index(by_title)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: SONG_COLLECTION,
                index: "title",
                source,
            })?;

        Ok(())
    }

    pub(super) async fn database(&self) -> Database {
        self.inner.database.read().await.clone()
    }

    async fn songs(&self) -> Collection<MongoSongDocument> {
        self.database().await.collection(SONG_COLLECTION)
    }

    async fn results(&self) -> Collection<MongoResultDocument> {
        self.database().await.collection(RESULT_COLLECTION)
    }

    async fn random_song(&self) -> MongoResult<Option<SongEntity>> {
        let mut cursor = self
            .songs()
            .await
            .aggregate([doc! { "$sample": { "size": 1 } }])
            .with_type::<MongoSongDocument>()
            .await
            .map_err(MongoDaoError::query(SONG_COLLECTION, "sample"))?;

        cursor
            .try_next()
            .await
            .map_err(MongoDaoError::query(SONG_COLLECTION, "sample"))?
            .map(SongEntity::try_from)
            .transpose()
    }

    async fn find_song(&self, id: Uuid) -> MongoResult<Option<SongEntity>> {
        self.songs()
            .await
            .find_one(doc! { "_id": id.to_string() })
            .await
            .map_err(MongoDaoError::query(SONG_COLLECTION, "find"))?
            .map(SongEntity::try_from)
            .transpose()
    }

    async fn daily_pick(&self, date: Date) -> MongoResult<Option<DailyPickEntity>> {
        let daily = self
            .database()
            .await
            .collection::<MongoDailyDocument>(DAILY_COLLECTION)
            .find_one(doc! { "_id": date_key(date) })
            .await
            .map_err(MongoDaoError::query(DAILY_COLLECTION, "find"))?;

        let Some(daily) = daily else {
            return Ok(None);
        };

        let scheduled_on = parse_date(DAILY_COLLECTION, &daily.date)?;
        let song_id = parse_uuid(DAILY_COLLECTION, &daily.date, &daily.song_id)?;
        let Some(song) = self.find_song(song_id).await? else {
            return Err(MongoDaoError::InvalidDocument {
                collection: DAILY_COLLECTION,
                id: daily.date,
                reason: format!("scheduled song `{song_id}` does not exist"),
            });
        };

        Ok(Some(DailyPickEntity {
            date: scheduled_on,
            song,
            audio_start_at: daily.audio_start_at,
        }))
    }

    async fn song_titles(&self) -> MongoResult<Vec<String>> {
        let titles: Vec<MongoTitleDocument> = self
            .database()
            .await
            .collection::<MongoTitleDocument>(SONG_COLLECTION)
            .find(doc! {})
            .projection(doc! { "_id": 0, "title": 1 })
            .sort(doc! { "title": 1 })
            .await
            .map_err(MongoDaoError::query(SONG_COLLECTION, "find"))?
            .try_collect()
            .await
            .map_err(MongoDaoError::query(SONG_COLLECTION, "find"))?;

        Ok(titles.into_iter().map(|document| document.title).collect())
    }

    async fn result_exists(&self, session_id: Uuid) -> MongoResult<bool> {
        let count = self
            .results()
            .await
            .count_documents(doc! { "_id": session_id.to_string() })
            .limit(1)
            .await
            .map_err(MongoDaoError::query(RESULT_COLLECTION, "count"))?;
        Ok(count > 0)
    }

    async fn insert_result(&self, result: GameResultEntity) -> MongoResult<InsertOutcome> {
        let claimed_day = match (result.mode, result.user_id, result.date) {
            (GameMode::Daily, Some(_), Some(date)) => Some(date),
            _ => None,
        };
        let document = MongoResultDocument::from(result);
        let err = match self.results().await.insert_one(&document).await {
            Ok(_) => return Ok(InsertOutcome::Inserted),
            Err(err) => err,
        };

        let on_daily_index =
            duplicate_key_message(&err).map(|message| message.contains(DAILY_ONCE_INDEX));
        match (on_daily_index, claimed_day) {
            (Some(true), Some(date)) => Ok(InsertOutcome::DailyAlreadyPlayed(date)),
            (Some(_), _) => Ok(InsertOutcome::Duplicate),
            (None, _) => Err(MongoDaoError::Query {
                collection: RESULT_COLLECTION,
                operation: "insert",
                source: err,
            }),
        }
    }

    async fn daily_already_played(&self, user_id: Uuid, date: Date) -> MongoResult<bool> {
        let count = self
            .results()
            .await
            .count_documents(doc! {
                "user_id": user_id.to_string(),
                "mode": GameMode::Daily.as_str(),
                "date": date_key(date),
            })
            .limit(1)
            .await
            .map_err(MongoDaoError::query(RESULT_COLLECTION, "count"))?;
        Ok(count > 0)
    }
}

/// At most one daily result per authenticated player and date.
fn daily_once_index() -> IndexModel {
    IndexModel::builder()
        .keys(doc! { "user_id": 1, "date": 1, "mode": 1 })
        .options(
            IndexOptions::builder()
                .name(Some(DAILY_ONCE_INDEX.to_owned()))
                .unique(Some(true))
                .partial_filter_expression(Some(doc! {
                    "mode": GameMode::Daily.as_str(),
                    "user_id": { "$type": "string" },
                }))
                .build(),
        )
        .build()
}

/// Server message of a duplicate-key write error, naming the violated index.
fn duplicate_key_message(err: &MongoError) -> Option<&str> {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error))
            if write_error.code == DUPLICATE_KEY_CODE =>
        {
            Some(write_error.message.as_str())
        }
        _ => None,
    }
}

pub(super) fn is_duplicate_key(err: &MongoError) -> bool {
    duplicate_key_message(err).is_some()
}

impl ContentProvider for MongoHeardleStore {
    fn random_song(&self) -> BoxFuture<'static, StorageResult<Option<SongEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.random_song().await.map_err(Into::into) })
    }

    fn daily_pick(
        &self,
        date: Date,
    ) -> BoxFuture<'static, StorageResult<Option<DailyPickEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.daily_pick(date).await.map_err(Into::into) })
    }

    fn song_metadata(
        &self,
        song_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<SongMetadata>>> {
        let store = self.clone();
        Box::pin(async move {
            let song = store.find_song(song_id).await?;
            Ok(song.map(|song| song.metadata()))
        })
    }

    fn song_titles(&self) -> BoxFuture<'static, StorageResult<Vec<String>>> {
        let store = self.clone();
        Box::pin(async move { store.song_titles().await.map_err(Into::into) })
    }
}

impl ResultStore for MongoHeardleStore {
    fn result_exists(&self, session_id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.result_exists(session_id).await.map_err(Into::into) })
    }

    fn insert_result(
        &self,
        result: GameResultEntity,
    ) -> BoxFuture<'static, StorageResult<InsertOutcome>> {
        let store = self.clone();
        Box::pin(async move { store.insert_result(result).await.map_err(Into::into) })
    }

    fn daily_already_played(
        &self,
        user_id: Uuid,
        date: Date,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .daily_already_played(user_id, date)
                .await
                .map_err(Into::into)
        })
    }
}

impl HealthProbe for MongoHeardleStore {
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
