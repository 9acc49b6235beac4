//! Heardle Back binary entrypoint wiring REST, WebSocket and storage layers.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use heardle_back::{
    config::AppConfig,
    dao::{
        audio::{AudioUrlSigner, PublicAudioSigner},
        heardle_store::memory::MemoryStore,
        storage::StorageError,
    },
    routes,
    services::{session_sweeper, storage_supervisor},
    state::{AppState, SharedState},
};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let audio = supabase_signer().unwrap_or_else(|| {
        Arc::new(PublicAudioSigner::new(config.audio_base_url())) as Arc<dyn AudioUrlSigner>
    });
    let app_state = AppState::new(config, audio);

    if !spawn_mongo_supervisor(&app_state).await {
        spawn_memory_supervisor(&app_state);
    }
    tokio::spawn(session_sweeper::run(
        app_state.clone(),
        app_state.config().sweep_interval(),
    ));

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Sign audio URLs through Supabase Storage when its credentials are present.
#[cfg(feature = "supabase-audio")]
fn supabase_signer() -> Option<Arc<dyn AudioUrlSigner>> {
    use heardle_back::dao::audio::supabase::{SupabaseAudioSigner, SupabaseConfig};

    let config = match SupabaseConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            info!(reason = %err, "Supabase not configured; serving public audio URLs");
            return None;
        }
    };

    match SupabaseAudioSigner::new(config) {
        Ok(signer) => {
            info!("signing audio URLs with Supabase Storage");
            let signer: Arc<dyn AudioUrlSigner> = Arc::new(signer);
            Some(signer)
        }
        Err(err) => {
            warn!(error = %err, "failed to build Supabase client; serving public audio URLs");
            None
        }
    }
}

#[cfg(not(feature = "supabase-audio"))]
fn supabase_signer() -> Option<Arc<dyn AudioUrlSigner>> {
    None
}

/// Supervise a MongoDB backend when `MONGO_URI` is set. Returns whether one was started.
#[cfg(feature = "mongo-store")]
async fn spawn_mongo_supervisor(state: &SharedState) -> bool {
    use heardle_back::dao::heardle_store::mongodb::{MongoConfig, connect_backend};

    let config = match MongoConfig::from_env().await {
        Ok(config) => config,
        Err(err) => {
            info!(reason = %err, "MongoDB not configured; using the in-memory backend");
            return false;
        }
    };

    info!(database = %config.database_name, "supervising MongoDB backend");
    tokio::spawn(storage_supervisor::run(state.clone(), move || {
        connect_backend(config.clone())
    }));
    true
}

#[cfg(not(feature = "mongo-store"))]
async fn spawn_mongo_supervisor(_state: &SharedState) -> bool {
    false
}

/// Serve the catalog seed from memory; results are lost on restart.
fn spawn_memory_supervisor(state: &SharedState) {
    let store = match state.config().catalog_seed_path() {
        Some(path) => match MemoryStore::load_seed_file(path) {
            Ok(store) => {
                info!(path = %path.display(), "loaded catalog seed");
                store
            }
            Err(err) => {
                warn!(error = %err, "failed to load catalog seed; starting with an empty catalog");
                MemoryStore::new()
            }
        },
        None => MemoryStore::new(),
    };

    let backend = store.backend();
    tokio::spawn(storage_supervisor::run(state.clone(), move || {
        let backend = backend.clone();
        async move { Ok::<_, StorageError>(backend) }
    }));
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler; waiting for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
