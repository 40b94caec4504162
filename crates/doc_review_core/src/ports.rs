//! crates/doc_review_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the console's core logic.
//! These traits form the boundary of the hexagonal architecture, keeping the core
//! independent of the identity provider, the user directory, and local storage.

use async_trait::async_trait;
use crate::domain::{Dataset, DirectoryUser, IdentityClaims, NewDirectoryUser};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., network, provider).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// Failure reading or writing the local key/value store.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Storage contents are not valid JSON: {0}")]
    Corrupt(#[from] serde_json::Error),
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// The external OAuth2/OIDC provider, as seen after the redirect flow.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Whether the provider currently holds an unexpired session.
    async fn is_authenticated(&self) -> bool;

    /// The current access token, if any.
    async fn access_token(&self) -> PortResult<Option<String>>;

    /// Identity claims for the signed-in subject.
    async fn user_claims(&self) -> PortResult<IdentityClaims>;

    /// Ends the provider session and forgets held tokens.
    async fn sign_out(&self) -> PortResult<()>;
}

/// The external user-directory service.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Looks up a user by provider subject id. Missing users are `PortError::NotFound`.
    async fn get_user(&self, subject_id: &str, access_token: &str) -> PortResult<DirectoryUser>;

    /// Creates a user record. The directory assigns the `unassigned` role.
    async fn create_user(
        &self,
        user: &NewDirectoryUser,
        access_token: &str,
    ) -> PortResult<DirectoryUser>;
}

/// Source of documents, versions, and pages for a set of states.
#[async_trait]
pub trait DocumentCatalog: Send + Sync {
    async fn load(&self, states: &[String]) -> PortResult<Dataset>;
}

/// Durable string key/value storage that survives a restart.
///
/// A missing key is `Ok(None)`, never an error.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
    fn clear(&self) -> Result<(), StorageError>;
}
