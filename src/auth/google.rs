use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use crate::error::ApiError;

/// Claims we consume from a verified Google ID token.
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleClaims {
    pub sub: String,
    pub email: Option<String>,
    pub name: Option<String>,
    #[serde(default)]
    pub aud: String,
}

/// Verifies Google ID tokens. Injected into `AppState` so tests can
/// substitute a fake without touching the network.
#[async_trait]
pub trait GoogleTokenVerifier: Send + Sync {
    async fn verify(&self, id_token: &str) -> Result<GoogleClaims, ApiError>;
}

/// Production verifier backed by Google's tokeninfo endpoint.
pub struct GoogleAuth {
    http: reqwest::Client,
    client_id: String,
}

impl GoogleAuth {
    const TOKENINFO_URL: &'static str = "https://oauth2.googleapis.com/tokeninfo";

    pub fn new(client_id: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            client_id: client_id.to_string(),
        }
    }
}

#[async_trait]
impl GoogleTokenVerifier for GoogleAuth {
    async fn verify(&self, id_token: &str) -> Result<GoogleClaims, ApiError> {
        let resp = self
            .http
            .get(Self::TOKENINFO_URL)
            .query(&[("id_token", id_token)])
            .send()
            .await
            .map_err(|e| ApiError::Internal(e.into()))?;

        if !resp.status().is_success() {
            warn!(status = %resp.status(), "google tokeninfo rejected token");
            return Err(ApiError::Unauthorized("Google authentication failed".into()));
        }

        let claims: GoogleClaims = resp
            .json()
            .await
            .map_err(|e| ApiError::Internal(e.into()))?;

        if claims.aud != self.client_id {
            warn!("google token audience mismatch");
            return Err(ApiError::Unauthorized(
                "Google client ID mismatch".into(),
            ));
        }

        Ok(claims)
    }
}
