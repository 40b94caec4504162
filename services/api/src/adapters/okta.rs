//! services/api/src/adapters/okta.rs
//!
//! This module contains the adapter for the Okta authorization server.
//! It implements the `IdentityProvider` port from the `core` crate and also
//! drives the authorization code + PKCE redirect flow that produces the tokens.

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use doc_review_core::domain::IdentityClaims;
use doc_review_core::ports::{IdentityProvider, PortError, PortResult};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info};
use url::Url;
use uuid::Uuid;

const SCOPES: &str = "openid profile email";

/// Where to send the browser, plus what the callback needs to finish the flow.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub url: Url,
    pub state: String,
    pub code_verifier: String,
}

#[derive(Debug, Clone)]
struct TokenSet {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl TokenSet {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Deserialize)]
struct UserInfo {
    sub: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

/// An adapter that implements the `IdentityProvider` port using Okta's OAuth2 endpoints.
pub struct OktaIdentityAdapter {
    client: Client,
    issuer: String,
    client_id: String,
    redirect_uri: String,
    tokens: Mutex<Option<TokenSet>>,
}

impl OktaIdentityAdapter {
    /// Creates a new `OktaIdentityAdapter`. `issuer` has no trailing slash.
    pub fn new(client: Client, issuer: String, client_id: String, redirect_uri: String) -> Self {
        Self {
            client,
            issuer,
            client_id,
            redirect_uri,
            tokens: Mutex::new(None),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/v1/{}", self.issuer, path)
    }

    /// Builds the authorize URL for a fresh sign-in attempt.
    pub fn authorization_request(&self) -> Result<AuthorizationRequest, url::ParseError> {
        let code_verifier = new_code_verifier();
        let state = Uuid::new_v4().simple().to_string();
        let nonce = Uuid::new_v4().simple().to_string();

        let url = Url::parse_with_params(
            &self.endpoint("authorize"),
            &[
                ("client_id", self.client_id.as_str()),
                ("response_type", "code"),
                ("scope", SCOPES),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("state", state.as_str()),
                ("nonce", nonce.as_str()),
                ("code_challenge", code_challenge(&code_verifier).as_str()),
                ("code_challenge_method", "S256"),
            ],
        )?;

        Ok(AuthorizationRequest {
            url,
            state,
            code_verifier,
        })
    }

    /// Exchanges the callback's authorization code for tokens and keeps them.
    pub async fn exchange_code(&self, code: &str, code_verifier: &str) -> PortResult<()> {
        let response = self
            .client
            .post(self.endpoint("token"))
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&[
                ("grant_type", "authorization_code"),
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("code", code),
                ("code_verifier", code_verifier),
            ])
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED => PortError::Unauthorized,
                _ => PortError::Unexpected(format!("Token exchange failed with {}: {}", status, body)),
            });
        }

        let tokens: TokenResponse = response.json().await.map_err(map_transport_error)?;
        self.store_tokens(TokenSet {
            access_token: tokens.access_token,
            expires_at: Utc::now() + Duration::seconds(tokens.expires_in),
        });
        info!("Exchanged authorization code for tokens");
        Ok(())
    }

    fn store_tokens(&self, tokens: TokenSet) {
        *self.tokens.lock().unwrap_or_else(PoisonError::into_inner) = Some(tokens);
    }

    fn take_tokens(&self) -> Option<TokenSet> {
        self.tokens
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// The access token while it is unexpired.
    fn live_token(&self) -> Option<String> {
        self.tokens
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .filter(|tokens| tokens.is_live(Utc::now()))
            .map(|tokens| tokens.access_token.clone())
    }
}

#[async_trait]
impl IdentityProvider for OktaIdentityAdapter {
    async fn is_authenticated(&self) -> bool {
        self.live_token().is_some()
    }

    async fn access_token(&self) -> PortResult<Option<String>> {
        Ok(self.live_token())
    }

    async fn user_claims(&self) -> PortResult<IdentityClaims> {
        let token = self.live_token().ok_or(PortError::Unauthorized)?;
        let response = self
            .client
            .get(self.endpoint("userinfo"))
            .bearer_auth(token)
            .send()
            .await
            .map_err(map_transport_error)?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => return Err(PortError::Unauthorized),
            status if !status.is_success() => {
                return Err(PortError::Unexpected(format!(
                    "Userinfo request failed with {}",
                    status
                )))
            }
            _ => {}
        }

        let info: UserInfo = response.json().await.map_err(map_transport_error)?;
        let email = info.email.unwrap_or_default();
        Ok(IdentityClaims {
            name: info.name.unwrap_or_else(|| email.clone()),
            subject: info.sub,
            email,
        })
    }

    async fn sign_out(&self) -> PortResult<()> {
        let Some(tokens) = self.take_tokens() else {
            debug!("No provider tokens to revoke");
            return Ok(());
        };

        let response = self
            .client
            .post(self.endpoint("revoke"))
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("token", tokens.access_token.as_str()),
                ("token_type_hint", "access_token"),
            ])
            .send()
            .await
            .map_err(map_transport_error)?;

        if !response.status().is_success() {
            return Err(PortError::Unexpected(format!(
                "Token revocation failed with {}",
                response.status()
            )));
        }
        info!("Revoked provider access token");
        Ok(())
    }
}

fn map_transport_error(e: reqwest::Error) -> PortError {
    PortError::Unexpected(format!("Identity provider request failed: {}", e))
}

/// A high-entropy PKCE verifier: 32 random bytes, base64url without padding.
fn new_code_verifier() -> String {
    URL_SAFE_NO_PAD.encode(rand::random::<[u8; 32]>())
}

/// The S256 challenge for `verifier`.
fn code_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn adapter() -> OktaIdentityAdapter {
        OktaIdentityAdapter::new(
            Client::new(),
            "https://example.okta.com/oauth2/default".to_string(),
            "client-123".to_string(),
            "http://localhost:3000/login/callback".to_string(),
        )
    }

    #[test]
    fn challenge_matches_the_published_pkce_vector() {
        assert_eq!(
            code_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn verifiers_are_unique_and_url_safe() {
        let a = new_code_verifier();
        let b = new_code_verifier();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(a
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn authorization_url_carries_the_flow_parameters() {
        let request = adapter().authorization_request().unwrap();
        assert_eq!(
            request.url.as_str().split('?').next(),
            Some("https://example.okta.com/oauth2/default/v1/authorize")
        );

        let params: HashMap<String, String> = request.url.query_pairs().into_owned().collect();
        assert_eq!(params["client_id"], "client-123");
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["scope"], "openid profile email");
        assert_eq!(params["state"], request.state);
        assert_eq!(params["code_challenge_method"], "S256");
        assert_eq!(params["code_challenge"], code_challenge(&request.code_verifier));
    }

    #[tokio::test]
    async fn expired_tokens_do_not_count_as_a_session() {
        let adapter = adapter();
        assert!(!adapter.is_authenticated().await);

        adapter.store_tokens(TokenSet {
            access_token: "old".to_string(),
            expires_at: Utc::now() - Duration::seconds(1),
        });
        assert!(!adapter.is_authenticated().await);
        assert_eq!(adapter.access_token().await.unwrap(), None);

        adapter.store_tokens(TokenSet {
            access_token: "fresh".to_string(),
            expires_at: Utc::now() + Duration::hours(1),
        });
        assert!(adapter.is_authenticated().await);
        assert_eq!(adapter.access_token().await.unwrap().as_deref(), Some("fresh"));
    }

    #[tokio::test]
    async fn sign_out_without_tokens_skips_the_provider() {
        assert!(adapter().sign_out().await.is_ok());
    }
}
