//! Signed URLs from Supabase Storage.

use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::Duration;

use super::AudioUrlSigner;
use crate::dao::storage::{StorageError, StorageResult};

const DEFAULT_BUCKET: &str = "songs";

/// Failures while talking to Supabase Storage.
#[derive(Debug, Error)]
pub enum SupabaseError {
    /// Required environment variable is missing.
    #[error("missing Supabase environment variable `{var}`")]
    MissingEnvVar {
        /// Name of the variable.
        var: &'static str,
    },
    /// The HTTP client could not be constructed.
    #[error("failed to build Supabase HTTP client")]
    ClientBuilder {
        /// Underlying client error.
        #[source]
        source: reqwest::Error,
    },
    /// The signing request never got a response.
    #[error("failed to send signing request for `{path}`")]
    RequestSend {
        /// Object being signed.
        path: String,
        /// Underlying transport error.
        #[source]
        source: reqwest::Error,
    },
    /// Supabase answered with a non-success status.
    #[error("unexpected Supabase response status {status} for `{path}`")]
    RequestStatus {
        /// Object being signed.
        path: String,
        /// Status returned by the API.
        status: StatusCode,
    },
    /// The response body was not the expected JSON.
    #[error("failed to decode Supabase signing response for `{path}`")]
    DecodeResponse {
        /// Object being signed.
        path: String,
        /// Underlying decode error.
        #[source]
        source: reqwest::Error,
    },
}

impl From<SupabaseError> for StorageError {
    fn from(err: SupabaseError) -> Self {
        StorageError::unavailable(err.to_string(), err)
    }
}

/// Connection settings for the storage API.
#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`.
    pub base_url: String,
    /// Service role key sent as bearer token.
    pub service_key: String,
    /// Bucket holding the audio files.
    pub bucket: String,
}

impl SupabaseConfig {
    /// Read `SUPABASE_URL`, `SUPABASE_SERVICE_KEY` and the optional `SUPABASE_BUCKET`.
    pub fn from_env() -> Result<Self, SupabaseError> {
        let base_url = std::env::var("SUPABASE_URL").map_err(|_| SupabaseError::MissingEnvVar {
            var: "SUPABASE_URL",
        })?;
        let service_key =
            std::env::var("SUPABASE_SERVICE_KEY").map_err(|_| SupabaseError::MissingEnvVar {
                var: "SUPABASE_SERVICE_KEY",
            })?;
        let bucket = std::env::var("SUPABASE_BUCKET").unwrap_or_else(|_| DEFAULT_BUCKET.to_owned());

        Ok(Self {
            base_url,
            service_key,
            bucket,
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignRequest {
    expires_in: i64,
}

#[derive(Deserialize)]
struct SignResponse {
    #[serde(rename = "signedURL")]
    signed_url: String,
}

/// Signer backed by the Supabase Storage `object/sign` endpoint.
/// Signer for private buckets, issuing short-lived signed URLs.
#[derive(Clone)]
pub struct SupabaseAudioSigner {
    client: Client,
    base_url: Arc<str>,
    service_key: Arc<str>,
    bucket: Arc<str>,
}

impl SupabaseAudioSigner {
    /// Build the HTTP client for `config`.
    pub fn new(config: SupabaseConfig) -> Result<Self, SupabaseError> {
        let client = Client::builder()
            .build()
            .map_err(|source| SupabaseError::ClientBuilder { source })?;

        Ok(Self {
            client,
            base_url: Arc::from(config.base_url.trim_end_matches('/')),
            service_key: Arc::from(config.service_key),
            bucket: Arc::from(config.bucket),
        })
    }

    fn sign_endpoint(&self, audio_path: &str) -> String {
        format!(
            "{}/storage/v1/object/sign/{}/{}",
            self.base_url,
            self.bucket,
            audio_path.trim_start_matches('/')
        )
    }

    fn absolute(&self, signed_path: &str) -> String {
        format!("{}/storage/v1{}", self.base_url, signed_path)
    }

    async fn sign(
        &self,
        audio_path: String,
        expires_in: Duration,
    ) -> Result<String, SupabaseError> {
        let response = self
            .client
            .post(self.sign_endpoint(&audio_path))
            .bearer_auth(self.service_key.as_ref())
            .header("apikey", self.service_key.as_ref())
            .json(&SignRequest {
                expires_in: expires_in.whole_seconds().max(1),
            })
            .send()
            .await
            .map_err(|source| SupabaseError::RequestSend {
                path: audio_path.clone(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(SupabaseError::RequestStatus {
                path: audio_path,
                status: response.status(),
            });
        }

        let body: SignResponse = response
            .json()
            .await
            .map_err(|source| SupabaseError::DecodeResponse {
                path: audio_path,
                source,
            })?;

        Ok(self.absolute(&body.signed_url))
    }
}

impl AudioUrlSigner for SupabaseAudioSigner {
    fn signed_url(
        &self,
        audio_path: &str,
        expires_in: Duration,
    ) -> BoxFuture<'static, StorageResult<String>> {
        let signer = self.clone();
        let audio_path = audio_path.to_owned();
        Box::pin(async move { signer.sign(audio_path, expires_in).await.map_err(Into::into) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> SupabaseAudioSigner {
        SupabaseAudioSigner::new(SupabaseConfig {
            base_url: "https://project.supabase.co/".into(),
            service_key: "secret".into(),
            bucket: "songs".into(),
        })
        .unwrap()
    }

    #[test]
    fn endpoint_targets_the_bucket_object() {
        assert_eq!(
            signer().sign_endpoint("/queen/bohemian.mp3"),
            "https://project.supabase.co/storage/v1/object/sign/songs/queen/bohemian.mp3"
        );
    }

    #[test]
    fn signed_paths_are_made_absolute() {
        assert_eq!(
            signer().absolute("/object/sign/songs/a.mp3?token=abc"),
            "https://project.supabase.co/storage/v1/object/sign/songs/a.mp3?token=abc"
        );
    }

    #[test]
    fn request_body_uses_camel_case() {
        let body = serde_json::to_value(SignRequest { expires_in: 900 }).unwrap();
        assert_eq!(body, serde_json::json!({ "expiresIn": 900 }));
    }
}
