use serde::Serialize;
use utoipa::ToSchema;

/// Titles offered for guess autocompletion.
#[derive(Debug, Serialize, ToSchema)]
pub struct SongTitlesResponse {
    /// Every catalog title, sorted alphabetically.
    pub titles: Vec<String>,
}
