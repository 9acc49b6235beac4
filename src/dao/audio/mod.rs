//! Issuing playable URLs for audio files.

#[cfg(feature = "supabase-audio")]
pub mod supabase;

use futures::future::{self, BoxFuture};
use time::Duration;

use crate::dao::storage::StorageResult;

/// Produces time-limited URLs for objects in the audio bucket.
pub trait AudioUrlSigner: Send + Sync {
    /// URL granting access to `audio_path` for at least `expires_in`.
    fn signed_url(
        &self,
        audio_path: &str,
        expires_in: Duration,
    ) -> BoxFuture<'static, StorageResult<String>>;
}

/// Signer for publicly readable buckets: the URL is the object path under a base URL.
#[derive(Debug, Clone)]
pub struct PublicAudioSigner {
    base_url: String,
}

impl PublicAudioSigner {
    /// Serve objects from under `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_owned(),
        }
    }
}

impl AudioUrlSigner for PublicAudioSigner {
    fn signed_url(
        &self,
        audio_path: &str,
        _expires_in: Duration,
    ) -> BoxFuture<'static, StorageResult<String>> {
        let url = format!("{}/{}", self.base_url, audio_path.trim_start_matches('/'));
        Box::pin(future::ready(Ok(url)))
    }
}
