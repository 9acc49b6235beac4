use time::Date;
use tracing::info;
use uuid::Uuid;

use crate::{
    dao::{heardle_store::StorageBackend, models::SongEntity},
    dto::round::{RoundPrompt, StartRoundRequest, StartRoundResponse},
    error::ServiceError,
    state::{
        SharedState,
        lyrics::build_puzzle,
        mode::{ContentSource, ModePolicy, PromptKind},
        session::NewSession,
    },
};

/// Song picked for a round, with the stored clip offset for scheduled picks.
struct RoundContent {
    song: SongEntity,
    stored_offset: Option<u32>,
}

/// Resolve the round's content, register a session and describe the prompt.
pub async fn start_round(
    state: &SharedState,
    request: StartRoundRequest,
    user_id: Option<Uuid>,
) -> Result<StartRoundResponse, ServiceError> {
    let mode = request.mode;
    let policy = mode.policy();
    let now = state.now();
    let date = policy.resolve_date(mode, request.date, now.date())?;

    let storage = state.require_storage().await?;
    let content = fetch_content(&storage, &policy, date).await?;

    let lifetime = policy.session_lifetime(now);
    let expires_at = now + lifetime;
    let (answer, prompt) = build_prompt(state, &policy, &content, lifetime).await?;

    let session_id = state
        .sessions()
        .create(NewSession {
            answer,
            answer_song_id: content.song.id,
            user_id,
            mode,
            date,
            created_at: now,
            expires_at,
        })
        .map_err(|err| ServiceError::InternalConsistency(err.to_string()))?;

    info!(
        session_id = %session_id,
        mode = %mode,
        song_id = %content.song.id,
        authenticated = user_id.is_some(),
        "round started"
    );

    Ok(StartRoundResponse {
        session_id,
        ws_url: state.config().ws_url(session_id),
        expires_in_minutes: whole_minutes_rounded_up(lifetime),
        expires_at,
        mode,
        date,
        prompt,
    })
}

async fn fetch_content(
    storage: &StorageBackend,
    policy: &ModePolicy,
    date: Option<Date>,
) -> Result<RoundContent, ServiceError> {
    match (policy.source, date) {
        (ContentSource::RandomSong, _) => {
            let song = storage.content.random_song().await?.ok_or_else(|| {
                ServiceError::ContentUnavailable("the song catalog is empty".into())
            })?;
            Ok(RoundContent {
                song,
                stored_offset: None,
            })
        }
        (ContentSource::PinnedToDate, Some(date)) => {
            let pick = storage
                .content
                .daily_pick(date)
                .await?
                .ok_or_else(|| {
                    ServiceError::ContentUnavailable(format!("no song scheduled for {date}"))
                })?;
            Ok(RoundContent {
                song: pick.song,
                stored_offset: Some(pick.audio_start_at),
            })
        }
        (ContentSource::PinnedToDate, None) => Err(ServiceError::InternalConsistency(
            "dated round resolved without a date".into(),
        )),
    }
}

async fn build_prompt(
    state: &SharedState,
    policy: &ModePolicy,
    content: &RoundContent,
    lifetime: time::Duration,
) -> Result<(String, RoundPrompt), ServiceError> {
    let song = &content.song;
    match policy.prompt {
        PromptKind::AudioClip {
            clip_length_seconds,
        } => {
            let audio_start_at = match content.stored_offset {
                Some(stored) => policy.clamp_clip_start(stored, song.duration_seconds),
                None => {
                    let mut rng = rand::rng();
                    policy.random_clip_start(song.duration_seconds, &mut rng)
                }
            };
            let audio = state.audio().signed_url(&song.audio_path, lifetime).await?;
            Ok((
                song.title.clone(),
                RoundPrompt::Audio {
                    audio,
                    audio_start_at,
                    clip_length_seconds,
                },
            ))
        }
        PromptKind::MaskedLyrics => {
            let puzzle = {
                let mut rng = rand::rng();
                build_puzzle(&song.lyrics, &mut rng)?
            };
            Ok((
                puzzle.answer,
                RoundPrompt::Lyrics {
                    lyrics: puzzle.masked,
                },
            ))
        }
    }
}

fn whole_minutes_rounded_up(lifetime: time::Duration) -> i64 {
    let seconds = lifetime.whole_seconds().max(0);
    (seconds + 59) / 60
}

#[cfg(test)]
mod tests {
    use time::{Duration, macros::date};

    use super::*;
    use crate::{
        services::test_support::{Harness, song},
        state::mode::GameMode,
    };

    fn request(mode: GameMode, date: Option<Date>) -> StartRoundRequest {
        StartRoundRequest { mode, date }
    }

    #[tokio::test]
    async fn original_round_returns_a_fitting_clip_and_ws_url() {
        let harness = Harness::new().await;
        let song_id = harness.add_song(song("Africa", "", 40));

        let response = start_round(&harness.state, request(GameMode::Original, None), None)
            .await
            .unwrap();

        assert_eq!(response.mode, GameMode::Original);
        assert_eq!(response.expires_in_minutes, 15);
        assert!(response.ws_url.ends_with(&format!("/api/v1/ws/{}", response.session_id)));
        let RoundPrompt::Audio {
            audio,
            audio_start_at,
            clip_length_seconds,
        } = response.prompt
        else {
            panic!("expected an audio prompt");
        };
        assert_eq!(clip_length_seconds, 16);
        assert!(audio_start_at + 16 <= 40);
        assert_eq!(audio, "https://cdn.example.com/audio/toto/africa.mp3");

        let session = harness.state.sessions().get(&response.session_id).unwrap();
        assert_eq!(session.answer_song_id, song_id);
        assert_eq!(session.maximum_attempts, 6);
        assert!(!session.done);
    }

    #[tokio::test]
    async fn empty_catalog_is_content_unavailable() {
        let harness = Harness::new().await;
        let err = start_round(&harness.state, request(GameMode::Rapid, None), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::ContentUnavailable(_)));
        assert_eq!(harness.state.sessions().live_count(), 0);
    }

    #[tokio::test]
    async fn date_rules_are_checked_before_any_session_exists() {
        let harness = Harness::new().await;
        harness.add_song(song("Africa", "", 40));

        for (mode, date) in [
            (GameMode::Original, Some(date!(2024 - 05 - 01))),
            (GameMode::Daily, Some(date!(2024 - 05 - 10))),
            (GameMode::Archive, None),
            (GameMode::Archive, Some(date!(2024 - 05 - 10))),
            (GameMode::Archive, Some(date!(2024 - 06 - 01))),
        ] {
            let err = start_round(&harness.state, request(mode, date), None)
                .await
                .unwrap_err();
            assert!(matches!(err, ServiceError::InvalidRequest(_)), "{mode} {date:?}");
        }
        assert_eq!(harness.state.sessions().live_count(), 0);
    }

    #[tokio::test]
    async fn daily_round_uses_todays_pick_and_clamped_offset() {
        let harness = Harness::new().await;
        let song_id = harness.add_song(song("Rosanna", "", 60));
        harness.schedule(date!(2024 - 05 - 10), song_id, 100);

        let response = start_round(&harness.state, request(GameMode::Daily, None), None)
            .await
            .unwrap();

        assert_eq!(response.date, Some(date!(2024 - 05 - 10)));
        // Twelve hours to midnight.
        assert_eq!(response.expires_in_minutes, 720);
        assert!(matches!(
            response.prompt,
            RoundPrompt::Audio {
                audio_start_at: 44,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn unscheduled_archive_day_is_content_unavailable() {
        let harness = Harness::new().await;
        harness.add_song(song("Africa", "", 40));

        let err = start_round(
            &harness.state,
            request(GameMode::Archive, Some(date!(2024 - 05 - 01))),
            None,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::ContentUnavailable(_)));
    }

    #[tokio::test]
    async fn lyrics_round_masks_part_of_the_window() {
        let harness = Harness::new().await;
        harness.add_song(song("Hold the Line", "Hold the line;Love isn't always on time", 200));

        let response = start_round(&harness.state, request(GameMode::Lyrics, None), None)
            .await
            .unwrap();

        assert_eq!(response.expires_in_minutes, 2);
        let RoundPrompt::Lyrics { lyrics } = response.prompt else {
            panic!("expected a lyrics prompt");
        };
        assert!(lyrics.contains('_'));
        assert_eq!(lyrics.split(';').count(), 2);
    }

    #[tokio::test]
    async fn lyrics_without_words_are_content_unavailable() {
        let harness = Harness::new().await;
        harness.add_song(song("Instrumental", "...;!!!", 200));

        let err = start_round(&harness.state, request(GameMode::Lyrics, None), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::ContentUnavailable(_)));
    }

    #[tokio::test]
    async fn degraded_state_refuses_new_rounds() {
        let harness = Harness::new().await;
        harness.add_song(song("Africa", "", 40));
        harness.state.clear_storage().await;

        let err = start_round(&harness.state, request(GameMode::Original, None), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Degraded));
    }

    #[test]
    fn lifetimes_round_up_to_whole_minutes() {
        assert_eq!(whole_minutes_rounded_up(Duration::seconds(61)), 2);
        assert_eq!(whole_minutes_rounded_up(Duration::minutes(15)), 15);
        assert_eq!(whole_minutes_rounded_up(Duration::ZERO), 0);
    }
}
