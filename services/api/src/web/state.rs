//! services/api/src/web/state.rs
//!
//! Defines the application's shared state: the one console session this
//! service mirrors, and the pending sign-in attempts waiting for their callback.

use crate::adapters::OktaIdentityAdapter;
use crate::config::Config;
use doc_review_core::ports::{DocumentCatalog, PortResult, UserDirectory};
use doc_review_core::{AppStore, SessionBootstrap, SessionStorage};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::RwLock;
use tracing::{error, warn};

/// Sign-in attempts older than this many are dropped wholesale.
const MAX_PENDING_LOGINS: usize = 64;

//=========================================================================================
// Pending Logins
//=========================================================================================

/// What the callback needs to finish a sign-in started at `/login`.
#[derive(Debug, Clone)]
pub struct PendingLogin {
    pub code_verifier: String,
    pub return_to: Option<String>,
}

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
pub struct AppState {
    pub config: Arc<Config>,
    pub okta: Arc<OktaIdentityAdapter>,
    pub bootstrap: Arc<SessionBootstrap>,
    pub catalog: Arc<dyn DocumentCatalog>,
    pub storage: SessionStorage,
    pub store: Arc<RwLock<AppStore>>,
    pending_logins: Mutex<HashMap<String, PendingLogin>>,
}

impl AppState {
    /// Wires the session around `okta` and restores the last saved snapshot.
    pub fn new(
        config: Arc<Config>,
        okta: Arc<OktaIdentityAdapter>,
        directory: Arc<dyn UserDirectory>,
        catalog: Arc<dyn DocumentCatalog>,
        storage: SessionStorage,
    ) -> Self {
        let bootstrap = Arc::new(SessionBootstrap::new(
            okta.clone(),
            directory,
            storage.clone(),
        ));
        let mut restored = storage.load_snapshot();
        // A load interrupted by a restart is not still running.
        restored.set_is_loading(false);

        Self {
            config,
            okta,
            bootstrap,
            catalog,
            storage,
            store: Arc::new(RwLock::new(restored)),
            pending_logins: Mutex::new(HashMap::new()),
        }
    }

    fn pending(&self) -> MutexGuard<'_, HashMap<String, PendingLogin>> {
        self.pending_logins
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn remember_login(&self, state: String, login: PendingLogin) {
        let mut pending = self.pending();
        if pending.len() >= MAX_PENDING_LOGINS {
            warn!(count = pending.len(), "Too many unfinished sign-ins; dropping them");
            pending.clear();
        }
        pending.insert(state, login);
    }

    /// Removes and returns the attempt for `state`. Each state is usable once.
    pub fn take_login(&self, state: &str) -> Option<PendingLogin> {
        self.pending().remove(state)
    }

    /// Loads the documents, versions, and pages for `states` into the store.
    pub async fn load_catalog(&self, states: &[String]) -> PortResult<()> {
        self.store.write().await.set_is_loading(true);
        let result = self.catalog.load(states).await;

        let mut store = self.store.write().await;
        store.set_is_loading(false);
        match result {
            Ok(dataset) => {
                store.set_documents(dataset.documents);
                store.set_versions(dataset.versions);
                store.set_pages(dataset.pages);
                Ok(())
            }
            Err(e) => {
                store.set_error(Some(e.to_string()));
                Err(e)
            }
        }
    }

    /// Writes the current store to the snapshot key. Failures are logged only.
    ///
    /// The file write runs on the blocking pool, after the store lock is released.
    pub async fn save_snapshot(&self) {
        let snapshot = self.store.read().await.clone();
        let storage = self.storage.clone();
        match tokio::task::spawn_blocking(move || storage.save_snapshot(&snapshot)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("Failed to save state snapshot: {}", e),
            Err(e) => error!("State snapshot task failed: {}", e),
        }
    }
}
