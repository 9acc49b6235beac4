use crate::{dto::catalog::SongTitlesResponse, error::ServiceError, state::SharedState};

/// Every catalog title, for guess autocompletion.
pub async fn song_titles(state: &SharedState) -> Result<SongTitlesResponse, ServiceError> {
    let storage = state.require_storage().await?;
    let titles = storage.content.song_titles().await?;
    Ok(SongTitlesResponse { titles })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::{Harness, song};

    #[tokio::test]
    async fn titles_come_back_sorted() {
        let harness = Harness::new().await;
        harness.add_song(song("Rosanna", "", 200));
        harness.add_song(song("Africa", "", 200));

        let response = song_titles(&harness.state).await.unwrap();
        assert_eq!(response.titles, vec!["Africa", "Rosanna"]);
    }
}
