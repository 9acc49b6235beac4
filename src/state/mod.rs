/// Time source.
pub mod clock;
/// Lyric window selection and masking.
pub mod lyrics;
/// Game modes and their rules.
pub mod mode;
/// Live round registry.
pub mod session;

use std::sync::Arc;

use time::OffsetDateTime;
use tokio::sync::{RwLock, watch};

use crate::{
    config::AppConfig,
    dao::{audio::AudioUrlSigner, heardle_store::StorageBackend},
    error::ServiceError,
};

use self::{
    clock::{Clock, SystemClock},
    session::SessionStore,
};

/// Application state shared across handlers.
pub type SharedState = Arc<AppState>;

/// Central application state: configuration, live sessions and storage handles.
pub struct AppState {
    config: Arc<AppConfig>,
    sessions: SessionStore,
    storage: RwLock<Option<StorageBackend>>,
    audio: Arc<dyn AudioUrlSigner>,
    degraded: watch::Sender<bool>,
    clock: Arc<dyn Clock>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig, audio: Arc<dyn AudioUrlSigner>) -> SharedState {
        Self::with_clock(config, audio, Arc::new(SystemClock))
    }

    /// Same as [`AppState::new`] with an explicit time source.
    pub fn with_clock(
        config: AppConfig,
        audio: Arc<dyn AudioUrlSigner>,
        clock: Arc<dyn Clock>,
    ) -> SharedState {
        let (degraded, _) = watch::channel(true);
        Arc::new(Self {
            sessions: SessionStore::new(config.session_retention()),
            config: Arc::new(config),
            storage: RwLock::new(None),
            audio,
            degraded,
            clock,
        })
    }

    /// Shared runtime configuration.
    pub fn config(&self) -> Arc<AppConfig> {
        self.config.clone()
    }

    /// Registry of live rounds.
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Signer used for audio prompts.
    pub fn audio(&self) -> Arc<dyn AudioUrlSigner> {
        self.audio.clone()
    }

    /// Current UTC instant according to the configured clock.
    pub fn now(&self) -> OffsetDateTime {
        self.clock.now()
    }

    /// Installed storage handles, if any.
    pub async fn storage(&self) -> Option<StorageBackend> {
        self.storage.read().await.clone()
    }

    /// Storage handles, or [`ServiceError::Degraded`] while the backend is unavailable.
    pub async fn require_storage(&self) -> Result<StorageBackend, ServiceError> {
        if self.is_degraded() {
            return Err(ServiceError::Degraded);
        }
        self.storage().await.ok_or(ServiceError::Degraded)
    }

    /// Install a storage backend and leave degraded mode.
    pub async fn install_storage(&self, backend: StorageBackend) {
        {
            let mut guard = self.storage.write().await;
            *guard = Some(backend);
        }
        self.update_degraded(false);
    }

    /// Drop the storage backend and enter degraded mode.
    pub async fn clear_storage(&self) {
        {
            let mut guard = self.storage.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update the degraded flag, notifying watchers only when it changes.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
    }
}
