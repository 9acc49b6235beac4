use thiserror::Error;
use time::Date;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dao::{
        heardle_store::{InsertOutcome, StorageBackend},
        models::{GameCompletion, GameOutcome, GameResultEntity},
    },
    dto::{
        submission::{SubmitResultRequest, SubmitResultResponse},
        ws::SongReveal,
    },
    error::ServiceError,
    state::{SharedState, mode::GameMode, session::SessionSnapshot},
};

/// Reasons a submitted result is refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmissionRejection {
    /// Reported attempts fall outside what the mode allows.
    #[error("attempts must be between 1 and {maximum} for the {mode} mode (got {attempts})")]
    AttemptsOutOfRange {
        /// Mode of the submission.
        mode: GameMode,
        /// Reported attempts.
        attempts: u32,
        /// Upper bound for the mode.
        maximum: u32,
    },
    /// Daily and archive results must carry their date.
    #[error("a date is required for the {0} mode")]
    DateRequired(GameMode),
    /// Undated modes must not carry a date.
    #[error("a date cannot be provided for the {0} mode")]
    DateNotAllowed(GameMode),
    /// No live or retained session with this id.
    #[error("session `{0}` not found")]
    SessionNotFound(Uuid),
    /// The submission describes a different round than the session.
    #[error("submission does not match session `{session_id}`: {reason}")]
    SessionMismatch {
        /// Session named by the submission.
        session_id: Uuid,
        /// Which property differs.
        reason: &'static str,
    },
    /// A result was already stored for the session.
    #[error("a result was already submitted for session `{0}`")]
    Duplicate(Uuid),
    /// The player already has a daily result for the date.
    #[error("the daily game of {0} was already played")]
    AlreadyPlayedToday(Date),
}

impl From<SubmissionRejection> for ServiceError {
    fn from(rejection: SubmissionRejection) -> Self {
        match rejection {
            SubmissionRejection::SessionNotFound(id) => ServiceError::SessionNotFound(id),
            SubmissionRejection::Duplicate(id) => ServiceError::DuplicateSubmission(id),
            SubmissionRejection::AlreadyPlayedToday(date) => ServiceError::AlreadyPlayedToday(date),
            other => ServiceError::InvalidRequest(other.to_string()),
        }
    }
}

/// Checks that need neither the session nor storage.
fn check_request(request: &SubmitResultRequest) -> Result<(), SubmissionRejection> {
    let maximum = request.mode.maximum_attempts();
    if !(1..=maximum).contains(&request.attempts) {
        return Err(SubmissionRejection::AttemptsOutOfRange {
            mode: request.mode,
            attempts: request.attempts,
            maximum,
        });
    }

    match (request.mode.is_dated(), request.date) {
        (true, None) => Err(SubmissionRejection::DateRequired(request.mode)),
        (false, Some(_)) => Err(SubmissionRejection::DateNotAllowed(request.mode)),
        _ => Ok(()),
    }
}

/// The submission must describe the round the session was created for.
fn check_session(
    request: &SubmitResultRequest,
    session: &SessionSnapshot,
    user_id: Option<Uuid>,
) -> Result<(), SubmissionRejection> {
    let mismatch = |reason| SubmissionRejection::SessionMismatch {
        session_id: session.id,
        reason,
    };

    if session.mode != request.mode {
        return Err(mismatch("mode differs"));
    }
    if session.date != request.date {
        return Err(mismatch("date differs"));
    }
    if session.user_id != user_id {
        return Err(mismatch("session belongs to another player"));
    }
    if request.attempts > session.maximum_attempts {
        return Err(mismatch("more attempts than the session allows"));
    }
    Ok(())
}

/// Validate a reported outcome against the session and persist it once.
pub async fn submit_result(
    state: &SharedState,
    request: SubmitResultRequest,
    user_id: Option<Uuid>,
) -> Result<SubmitResultResponse, ServiceError> {
    check_request(&request)?;

    let session_id = request.session_id;
    let session = state
        .sessions()
        .resolve(&session_id)
        .ok_or(SubmissionRejection::SessionNotFound(session_id))?;
    check_session(&request, &session, user_id)?;

    let storage = state.require_storage().await?;
    if storage.results.result_exists(session_id).await? {
        return Err(SubmissionRejection::Duplicate(session_id).into());
    }

    if let (GameMode::Daily, Some(user_id), Some(date)) = (request.mode, user_id, request.date) {
        if storage.results.daily_already_played(user_id, date).await? {
            return Err(SubmissionRejection::AlreadyPlayedToday(date).into());
        }
    }

    let now = state.now();
    let result = GameOutcome::from_won(request.won);
    let record = GameResultEntity {
        session_id,
        user_id,
        mode: request.mode,
        result,
        attempts: request.attempts,
        song_id: session.answer_song_id,
        date: request.date,
        submitted_at: now,
    };

    match storage.results.insert_result(record).await? {
        InsertOutcome::Inserted => {}
        InsertOutcome::Duplicate => return Err(SubmissionRejection::Duplicate(session_id).into()),
        InsertOutcome::DailyAlreadyPlayed(date) => {
            return Err(SubmissionRejection::AlreadyPlayedToday(date).into());
        }
    }

    info!(
        session_id = %session_id,
        mode = %request.mode,
        result = ?result,
        attempts = request.attempts,
        "result stored"
    );

    if let Some(user_id) = user_id {
        run_completion_hooks(
            &storage,
            GameCompletion {
                user_id,
                mode: request.mode,
                won: request.won,
                attempts: request.attempts,
                completed_on: now.date(),
            },
        )
        .await;
    }

    let song = match storage.content.song_metadata(session.answer_song_id).await {
        Ok(song) => song.map(SongReveal::from),
        Err(err) => {
            warn!(session_id = %session_id, error = %err, "failed to load song metadata");
            None
        }
    };

    Ok(SubmitResultResponse {
        session_id,
        result,
        attempts: request.attempts,
        song,
    })
}

/// Run every hook; failures are logged and never undo the stored result.
async fn run_completion_hooks(storage: &StorageBackend, completion: GameCompletion) {
    for hook in &storage.hooks {
        if let Err(err) = hook.on_game_completed(completion).await {
            warn!(
                hook = hook.name(),
                user_id = %completion.user_id,
                error = %err,
                "completion hook failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use futures::future::BoxFuture;
    use time::{Duration, macros::date};

    use super::*;
    use crate::{
        dao::{
            heardle_store::{CompletionHook, ResultStore, memory::MemoryStore},
            models::{LeaderboardKey, LeaderboardPeriod},
            storage::{StorageError, StorageResult},
        },
        services::test_support::{Harness, START, song},
        state::session::NewSession,
    };

    fn open_session(
        harness: &Harness,
        mode: GameMode,
        date: Option<Date>,
        user_id: Option<Uuid>,
    ) -> (Uuid, Uuid) {
        let song_id = harness.add_song(song("Africa", "", 200));
        let session_id = harness
            .state
            .sessions()
            .create(NewSession {
                answer: "Africa".into(),
                answer_song_id: song_id,
                user_id,
                mode,
                date,
                created_at: START,
                expires_at: START + Duration::minutes(15),
            })
            .unwrap();
        (session_id, song_id)
    }

    fn request(
        session_id: Uuid,
        mode: GameMode,
        won: bool,
        attempts: u32,
        date: Option<Date>,
    ) -> SubmitResultRequest {
        SubmitResultRequest {
            session_id,
            mode,
            won,
            attempts,
            date,
        }
    }

    #[tokio::test]
    async fn stores_the_result_and_returns_song_details() {
        let harness = Harness::new().await;
        let (session_id, song_id) = open_session(&harness, GameMode::Original, None, None);

        let response = submit_result(
            &harness.state,
            request(session_id, GameMode::Original, true, 3, None),
            None,
        )
        .await
        .unwrap();

        assert_eq!(response.result, GameOutcome::Win);
        assert_eq!(response.song.unwrap().title, "Africa");
        let stored = harness.store.result(&session_id).unwrap();
        assert_eq!(stored.song_id, song_id);
        assert_eq!(stored.attempts, 3);
        assert_eq!(stored.submitted_at, START);
    }

    #[tokio::test]
    async fn validation_runs_in_order() {
        let harness = Harness::new().await;
        let unknown = Uuid::new_v4();

        let err = submit_result(
            &harness.state,
            request(unknown, GameMode::Rapid, false, 2, Some(date!(2024 - 05 - 10))),
            None,
        )
        .await
        .unwrap_err();
        assert!(
            matches!(err, ServiceError::InvalidRequest(message) if message.contains("attempts"))
        );

        let err = submit_result(
            &harness.state,
            request(unknown, GameMode::Rapid, false, 1, Some(date!(2024 - 05 - 10))),
            None,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidRequest(message) if message.contains("date")));

        let err = submit_result(
            &harness.state,
            request(unknown, GameMode::Archive, false, 1, None),
            None,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidRequest(_)));

        let err = submit_result(
            &harness.state,
            request(unknown, GameMode::Rapid, false, 1, None),
            None,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::SessionNotFound(id) if id == unknown));
    }

    #[tokio::test]
    async fn submission_must_match_the_session() {
        let harness = Harness::new().await;
        let (session_id, _) = open_session(&harness, GameMode::Original, None, None);

        let err = submit_result(
            &harness.state,
            request(session_id, GameMode::Rapid, true, 1, None),
            None,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidRequest(_)));

        let err = submit_result(
            &harness.state,
            request(session_id, GameMode::Original, true, 1, None),
            Some(Uuid::new_v4()),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidRequest(_)));
        assert!(harness.store.result(&session_id).is_none());
    }

    #[tokio::test]
    async fn double_submission_is_accepted_once() {
        let harness = Harness::new().await;
        let (session_id, _) = open_session(&harness, GameMode::Original, None, None);
        let body = request(session_id, GameMode::Original, false, 6, None);

        submit_result(&harness.state, body.clone(), None)
            .await
            .unwrap();
        let err = submit_result(&harness.state, body, None).await.unwrap_err();
        assert!(matches!(err, ServiceError::DuplicateSubmission(id) if id == session_id));
    }

    #[tokio::test]
    async fn concurrent_submissions_store_one_row() {
        let harness = Harness::new().await;
        let (session_id, _) = open_session(&harness, GameMode::Original, None, None);
        let body = request(session_id, GameMode::Original, true, 2, None);

        let (first, second) = tokio::join!(
            submit_result(&harness.state, body.clone(), None),
            submit_result(&harness.state, body.clone(), None),
        );
        assert_eq!([first.is_ok(), second.is_ok()].iter().filter(|ok| **ok).count(), 1);
    }

    #[tokio::test]
    async fn retained_sessions_can_still_be_submitted() {
        let harness = Harness::new().await;
        let (session_id, _) = open_session(&harness, GameMode::Original, None, None);
        harness.state.sessions().release(&session_id, START);

        let response = submit_result(
            &harness.state,
            request(session_id, GameMode::Original, true, 1, None),
            None,
        )
        .await;
        assert!(response.is_ok());
    }

    #[tokio::test]
    async fn daily_can_only_be_played_once_per_user() {
        let harness = Harness::new().await;
        let user_id = Uuid::new_v4();
        let today = date!(2024 - 05 - 10);
        let (first, _) = open_session(&harness, GameMode::Daily, Some(today), Some(user_id));
        let (second, _) = open_session(&harness, GameMode::Daily, Some(today), Some(user_id));

        submit_result(
            &harness.state,
            request(first, GameMode::Daily, true, 4, Some(today)),
            Some(user_id),
        )
        .await
        .unwrap();

        let err = submit_result(
            &harness.state,
            request(second, GameMode::Daily, true, 1, Some(today)),
            Some(user_id),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::AlreadyPlayedToday(day) if day == today));
    }

    /// Result store whose daily lookup always misses, as when two submissions race.
    struct RacingDailyCheck(MemoryStore);

    impl ResultStore for RacingDailyCheck {
        fn result_exists(&self, session_id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
            self.0.result_exists(session_id)
        }

        fn insert_result(
            &self,
            result: GameResultEntity,
        ) -> BoxFuture<'static, StorageResult<InsertOutcome>> {
            self.0.insert_result(result)
        }

        fn daily_already_played(
            &self,
            _: Uuid,
            _: Date,
        ) -> BoxFuture<'static, StorageResult<bool>> {
            Box::pin(async { Ok(false) })
        }
    }

    #[tokio::test]
    async fn racing_daily_submissions_of_one_player_store_one_row() {
        let harness = Harness::new().await;
        let mut backend = harness.state.storage().await.unwrap();
        backend.results = Arc::new(RacingDailyCheck(harness.store.clone()));
        harness.state.install_storage(backend).await;

        let user_id = Uuid::new_v4();
        let today = date!(2024 - 05 - 10);
        let (first, _) = open_session(&harness, GameMode::Daily, Some(today), Some(user_id));
        let (second, _) = open_session(&harness, GameMode::Daily, Some(today), Some(user_id));

        let (a, b) = tokio::join!(
            submit_result(
                &harness.state,
                request(first, GameMode::Daily, true, 2, Some(today)),
                Some(user_id),
            ),
            submit_result(
                &harness.state,
                request(second, GameMode::Daily, false, 6, Some(today)),
                Some(user_id),
            ),
        );

        let refused = match (a, b) {
            (Ok(_), Err(err)) | (Err(err), Ok(_)) => err,
            other => panic!("expected exactly one accepted submission, got {other:?}"),
        };
        assert!(matches!(refused, ServiceError::AlreadyPlayedToday(day) if day == today));
        assert_eq!(
            [first, second]
                .iter()
                .filter(|id| harness.store.result(id).is_some())
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn authenticated_results_feed_statistics_and_leaderboards() {
        let harness = Harness::new().await;
        let user_id = Uuid::new_v4();
        let (session_id, _) = open_session(&harness, GameMode::Original, None, Some(user_id));

        submit_result(
            &harness.state,
            request(session_id, GameMode::Original, true, 2, None),
            Some(user_id),
        )
        .await
        .unwrap();

        let stats = harness.store.statistics(user_id, GameMode::Original).unwrap();
        assert_eq!(stats.games_played, 1);
        assert_eq!(stats.guess_distribution[1], 1);
        let all_time = LeaderboardKey {
            user_id,
            mode: GameMode::Original,
            period: LeaderboardPeriod::AllTime,
            window_start: None,
        };
        assert_eq!(harness.store.leaderboard_wins(&all_time), 1);
    }

    #[tokio::test]
    async fn anonymous_results_skip_the_hooks() {
        let harness = Harness::new().await;
        let (session_id, _) = open_session(&harness, GameMode::Rapid, None, None);

        submit_result(
            &harness.state,
            request(session_id, GameMode::Rapid, true, 1, None),
            None,
        )
        .await
        .unwrap();
        assert!(harness.store.result(&session_id).is_some());
    }

    struct FailingHook;

    impl CompletionHook for FailingHook {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn on_game_completed(&self, _: GameCompletion) -> BoxFuture<'static, StorageResult<()>> {
            Box::pin(async { Err(StorageError::invalid_record("boom")) })
        }
    }

    #[tokio::test]
    async fn hook_failures_do_not_undo_the_result() {
        let harness = Harness::new().await;
        let mut backend = harness.state.storage().await.unwrap();
        backend = backend.with_hook(Arc::new(FailingHook));
        harness.state.install_storage(backend).await;

        let user_id = Uuid::new_v4();
        let (session_id, _) = open_session(&harness, GameMode::Original, None, Some(user_id));
        let response = submit_result(
            &harness.state,
            request(session_id, GameMode::Original, false, 6, None),
            Some(user_id),
        )
        .await;

        assert!(response.is_ok());
        assert!(harness.store.result(&session_id).is_some());
    }
}
