//! Fixtures shared by the service tests.

use std::sync::Arc;

use time::{Date, OffsetDateTime, macros::datetime};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::{
        audio::PublicAudioSigner,
        heardle_store::memory::MemoryStore,
        models::SongEntity,
    },
    state::{AppState, SharedState, clock::ManualClock},
};

pub const START: OffsetDateTime = datetime!(2024-05-10 12:00 UTC);

pub fn song(title: &str, lyrics: &str, duration_seconds: u32) -> SongEntity {
    SongEntity {
        id: Uuid::new_v4(),
        title: title.to_owned(),
        release_year: 1982,
        album: Some("Toto IV".to_owned()),
        artists: vec!["Toto".to_owned()],
        share_link: format!("https://example.com/{}", title.to_lowercase()),
        audio_path: format!("toto/{}.mp3", title.to_lowercase()),
        lyrics: lyrics.to_owned(),
        duration_seconds,
    }
}

pub struct Harness {
    pub state: SharedState,
    pub store: MemoryStore,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    /// State with an in-memory backend and a clock frozen at [`START`].
    pub async fn new() -> Self {
        let clock = Arc::new(ManualClock::new(START));
        let state = AppState::with_clock(
            AppConfig::default(),
            Arc::new(PublicAudioSigner::new("https://cdn.example.com/audio")),
            clock.clone(),
        );
        let store = MemoryStore::new();
        state.install_storage(store.backend()).await;
        Self {
            state,
            store,
            clock,
        }
    }

    pub fn add_song(&self, song: SongEntity) -> Uuid {
        let id = song.id;
        self.store.insert_song(song);
        id
    }

    pub fn schedule(&self, date: Date, song_id: Uuid, audio_start_at: u32) {
        self.store.schedule_daily(date, song_id, audio_start_at);
    }
}
