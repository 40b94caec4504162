//! services/api/src/adapters/directory.rs
//!
//! Reqwest-backed adapter for the user-directory service. It owns transport
//! details only: bearer auth, status mapping, and JSON decoding.

use async_trait::async_trait;
use doc_review_core::domain::{DirectoryUser, NewDirectoryUser};
use doc_review_core::ports::{PortError, PortResult, UserDirectory};
use reqwest::{Client, Response, StatusCode};
use tracing::debug;

pub struct HttpUserDirectory {
    client: Client,
    base_url: String,
}

impl HttpUserDirectory {
    /// `base_url` has no trailing slash.
    pub fn new(client: Client, base_url: String) -> Self {
        Self { client, base_url }
    }

    fn user_url(&self, subject_id: Option<&str>) -> String {
        match subject_id {
            Some(id) => format!("{}/user/{}", self.base_url, id),
            None => format!("{}/user", self.base_url),
        }
    }
}

#[async_trait]
impl UserDirectory for HttpUserDirectory {
    async fn get_user(&self, subject_id: &str, access_token: &str) -> PortResult<DirectoryUser> {
        debug!(subject = subject_id, "Looking up directory user");
        let response = self
            .client
            .get(self.user_url(Some(subject_id)))
            .bearer_auth(access_token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(map_transport_error)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(PortError::NotFound(subject_id.to_string()));
        }
        decode(response).await
    }

    async fn create_user(
        &self,
        user: &NewDirectoryUser,
        access_token: &str,
    ) -> PortResult<DirectoryUser> {
        debug!(subject = %user.subject_id, "Creating directory user");
        let response = self
            .client
            .post(self.user_url(None))
            .bearer_auth(access_token)
            .json(user)
            .send()
            .await
            .map_err(map_transport_error)?;
        decode(response).await
    }
}

async fn decode(response: Response) -> PortResult<DirectoryUser> {
    let status = response.status();
    if let Some(err) = map_status(status) {
        return Err(err);
    }
    response.json::<DirectoryUser>().await.map_err(|e| {
        PortError::Unexpected(format!("Invalid user directory payload: {}", e))
    })
}

fn map_status(status: StatusCode) -> Option<PortError> {
    match status {
        s if s.is_success() => None,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Some(PortError::Unauthorized),
        s => Some(PortError::Unexpected(format!(
            "User directory responded with {}",
            s
        ))),
    }
}

fn map_transport_error(e: reqwest::Error) -> PortError {
    PortError::Unexpected(format!("User directory request failed: {}", e))
}
