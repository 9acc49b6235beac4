use std::sync::Arc;

use axum::{http::StatusCode, response::IntoResponse};
use heardle_back::{
    config::AppConfig,
    dao::{
        audio::PublicAudioSigner,
        heardle_store::memory::{CatalogSeed, DailySeed, MemoryStore},
        models::{GameOutcome, SongEntity},
    },
    dto::{
        round::{RoundPrompt, StartRoundRequest},
        submission::SubmitResultRequest,
        ws::GuessOutboundMessage,
    },
    error::{AppError, ServiceError},
    services::{guess_protocol::GuessConnection, round_service, submission_service},
    state::{AppState, SharedState, clock::ManualClock, mode::GameMode},
};
use time::{
    Duration,
    macros::{date, datetime},
};
use uuid::Uuid;

const AFRICA: &str = "6f1c2a8e-3b4d-4c5e-9f60-718293a4b5c6";

fn africa() -> SongEntity {
    SongEntity {
        id: Uuid::parse_str(AFRICA).unwrap(),
        title: "Africa".into(),
        release_year: 1982,
        album: Some("Toto IV".into()),
        artists: vec!["Toto".into()],
        share_link: "https://example.com/songs/africa".into(),
        audio_path: "toto/africa.mp3".into(),
        lyrics: "I hear the drums echoing tonight;But she hears only whispers".into(),
        duration_seconds: 295,
    }
}

async fn setup() -> (SharedState, MemoryStore, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(datetime!(2024-05-10 20:00 UTC)));
    let state = AppState::with_clock(
        AppConfig::default(),
        Arc::new(PublicAudioSigner::new("https://cdn.example.com/audio")),
        clock.clone(),
    );
    let store = MemoryStore::from_seed(CatalogSeed {
        songs: vec![africa()],
        daily: vec![DailySeed {
            date: date!(2024 - 05 - 10),
            song_id: Uuid::parse_str(AFRICA).unwrap(),
            audio_start_at: 42,
        }],
    })
    .unwrap();
    state.install_storage(store.backend()).await;
    (state, store, clock)
}

fn guess(text: &str) -> String {
    serde_json::json!({ "type": "guess", "guess": text }).to_string()
}

fn connect(state: &SharedState, session_id: Uuid) -> GuessConnection {
    GuessConnection::open(state.sessions(), session_id, state.now()).unwrap()
}

fn result(correct: bool, done: bool, attempts: u32) -> GuessOutboundMessage {
    GuessOutboundMessage::Result {
        correct,
        done,
        attempts,
    }
}

#[tokio::test]
async fn original_round_from_start_to_submission() {
    let (state, store, _clock) = setup().await;

    let round = round_service::start_round(
        &state,
        StartRoundRequest {
            mode: GameMode::Original,
            date: None,
        },
        None,
    )
    .await
    .unwrap();
    assert!(matches!(round.prompt, RoundPrompt::Audio { clip_length_seconds: 16, .. }));

    let mut connection = connect(&state, round.session_id);
    let miss = connection.on_text(state.sessions(), &guess("Rosanna"), state.now());
    assert_eq!(miss.replies, vec![result(false, false, 1)]);
    let hit = connection.on_text(state.sessions(), &guess("  africa"), state.now());
    assert_eq!(hit.replies, vec![result(true, true, 2)]);
    assert_eq!(hit.reveal_song, Some(africa().id));

    state.sessions().release(&round.session_id, state.now());

    let submission = SubmitResultRequest {
        session_id: round.session_id,
        mode: GameMode::Original,
        won: true,
        attempts: 2,
        date: None,
    };
    let stored = submission_service::submit_result(&state, submission.clone(), None)
        .await
        .unwrap();
    assert_eq!(stored.result, GameOutcome::Win);
    assert_eq!(stored.song.unwrap().title, "Africa");
    assert!(store.result(&round.session_id).is_some());

    let err = submission_service::submit_result(&state, submission, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::DuplicateSubmission(_)));
    assert_eq!(
        AppError::from(err).into_response().status(),
        StatusCode::CONFLICT
    );
}

#[tokio::test]
async fn daily_round_is_lost_after_six_misses_and_played_once() {
    let (state, _store, _clock) = setup().await;
    let user_id = Uuid::new_v4();
    let today = date!(2024 - 05 - 10);
    let start = StartRoundRequest {
        mode: GameMode::Daily,
        date: None,
    };

    let round = round_service::start_round(&state, start, Some(user_id))
        .await
        .unwrap();
    assert_eq!(round.date, Some(today));
    assert_eq!(round.expires_in_minutes, 240);
    assert!(matches!(round.prompt, RoundPrompt::Audio { audio_start_at: 42, .. }));

    let mut connection = connect(&state, round.session_id);
    let mut last = None;
    for _ in 0..6 {
        last = Some(connection.on_text(state.sessions(), &guess("Rosanna"), state.now()));
    }
    assert_eq!(last.unwrap().replies, vec![result(false, true, 6)]);

    let lost = SubmitResultRequest {
        session_id: round.session_id,
        mode: GameMode::Daily,
        won: false,
        attempts: 6,
        date: Some(today),
    };
    submission_service::submit_result(&state, lost, Some(user_id))
        .await
        .unwrap();

    let replay = round_service::start_round(
        &state,
        StartRoundRequest {
            mode: GameMode::Daily,
            date: None,
        },
        Some(user_id),
    )
    .await
    .unwrap();
    let err = submission_service::submit_result(
        &state,
        SubmitResultRequest {
            session_id: replay.session_id,
            mode: GameMode::Daily,
            won: true,
            attempts: 1,
            date: Some(today),
        },
        Some(user_id),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServiceError::AlreadyPlayedToday(day) if day == today));
}

#[tokio::test]
async fn expired_rounds_refuse_guesses() {
    let (state, _store, clock) = setup().await;

    let round = round_service::start_round(
        &state,
        StartRoundRequest {
            mode: GameMode::Rapid,
            date: None,
        },
        None,
    )
    .await
    .unwrap();
    let mut connection = connect(&state, round.session_id);

    clock.advance(Duration::minutes(3));
    let reaction = connection.on_text(state.sessions(), &guess("Africa"), state.now());
    assert_eq!(reaction.replies, vec![GuessOutboundMessage::Expired]);
    assert!(reaction.close);
    assert_eq!(state.sessions().get(&round.session_id).unwrap().attempts, 0);
}
