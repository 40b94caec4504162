//! crates/doc_review_core/src/session.rs
//!
//! Turns a provider-asserted identity into the console's `User` and populates
//! the state container, once per authentication event.
//!
//! A run is a straight line: provider claims and token, persist the token,
//! directory lookup (create on miss), role check, populate. Failures are caught
//! here and recorded on the store; the user field is only written on full
//! success. Sign-out bumps a generation counter and cancels any run in flight,
//! and a run only applies its result while its generation is still current.

use crate::domain::{Dataset, DirectoryUser, NewDirectoryUser, Role, User};
use crate::guards::LANDING_PATH;
use crate::persistence::SessionStorage;
use crate::ports::{IdentityProvider, PortError, UserDirectory};
use crate::store::AppStore;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{broadcast, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const EVENT_CAPACITY: usize = 16;

/// Where the session currently stands, as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionPhase {
    SignedOut,
    Bootstrapping,
    Ready,
    /// Terminal for this session; the only way out is signing out.
    RoleRestricted { role: String },
    /// Recoverable with a manual retry.
    Failed { message: String },
}

/// Result of one bootstrap run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapOutcome {
    Ready { user: User, landing: &'static str },
    RoleRestricted { role: String },
    Failed { message: String },
    Unauthenticated,
    /// Another run was already in flight.
    Ignored,
    /// A sign-out or newer sign-in happened first; nothing was applied.
    Superseded,
}

/// Published to subscribers whenever the session changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Authenticated { user: User },
    RoleRestricted { role: String },
    Failed { message: String },
    SignedOut,
}

enum Resolution {
    Unauthenticated,
    Restricted { role: String },
    Resolved(User),
}

/// Resets the in-flight flag however the run ends.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct SessionBootstrap {
    identity: Arc<dyn IdentityProvider>,
    directory: Arc<dyn UserDirectory>,
    storage: SessionStorage,
    events: broadcast::Sender<SessionEvent>,
    generation: AtomicU64,
    in_flight: AtomicBool,
    demo: AtomicBool,
    cancel: Mutex<CancellationToken>,
    phase: Mutex<SessionPhase>,
}

impl SessionBootstrap {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        directory: Arc<dyn UserDirectory>,
        storage: SessionStorage,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            identity,
            directory,
            storage,
            events,
            generation: AtomicU64::new(0),
            in_flight: AtomicBool::new(false),
            demo: AtomicBool::new(false),
            cancel: Mutex::new(CancellationToken::new()),
            phase: Mutex::new(SessionPhase::SignedOut),
        }
    }

    /// Subscribes to session changes. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether guards should treat the session as authenticated.
    ///
    /// Demo sign-ins have no provider session of their own.
    pub async fn session_authenticated(&self) -> bool {
        self.demo.load(Ordering::SeqCst) || self.identity.is_authenticated().await
    }

    /// Runs the bootstrap for the current provider session.
    pub async fn run(&self, store: &RwLock<AppStore>) -> BootstrapOutcome {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            debug!("Session bootstrap already in flight; ignoring trigger");
            return BootstrapOutcome::Ignored;
        }
        let _in_flight = InFlight(&self.in_flight);

        let generation = self.generation.load(Ordering::SeqCst);
        let token = self
            .cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        {
            let mut state = store.write().await;
            if self.generation.load(Ordering::SeqCst) != generation {
                return BootstrapOutcome::Superseded;
            }
            state.set_is_loading(true);
            state.set_error(None);
            self.set_phase(SessionPhase::Bootstrapping);
        }

        let resolution = tokio::select! {
            _ = token.cancelled() => None,
            result = self.resolve() => Some(result),
        };

        let mut state = store.write().await;
        let Some(resolution) = resolution else {
            info!("Session bootstrap cancelled");
            return BootstrapOutcome::Superseded;
        };
        if self.generation.load(Ordering::SeqCst) != generation {
            info!("Session bootstrap superseded; discarding result");
            return BootstrapOutcome::Superseded;
        }
        state.set_is_loading(false);
        // The provider result replaces any demo session.
        self.demo.store(false, Ordering::SeqCst);

        match resolution {
            Ok(Resolution::Resolved(user)) => {
                if let Err(e) = self.storage.set_user_role(user.role.as_str()) {
                    warn!("Failed to persist user role: {}", e);
                }
                state.set_states(user.states.iter().cloned().collect());
                state.set_user(Some(user.clone()));
                info!(user = %user.email, role = %user.role, "Session ready");
                self.set_phase(SessionPhase::Ready);
                self.publish(SessionEvent::Authenticated { user: user.clone() });
                BootstrapOutcome::Ready {
                    user,
                    landing: LANDING_PATH,
                }
            }
            Ok(Resolution::Restricted { role }) => {
                warn!(role = %role, "Signed-in user has no console role");
                if let Err(e) = self.storage.clear_user_role() {
                    warn!("Failed to clear user role: {}", e);
                }
                state.set_user(None);
                self.set_phase(SessionPhase::RoleRestricted { role: role.clone() });
                self.publish(SessionEvent::RoleRestricted { role: role.clone() });
                BootstrapOutcome::RoleRestricted { role }
            }
            Ok(Resolution::Unauthenticated) => {
                if let Err(e) = self.storage.clear_access_token() {
                    warn!("Failed to clear access token: {}", e);
                }
                if let Err(e) = self.storage.clear_user_role() {
                    warn!("Failed to clear user role: {}", e);
                }
                state.set_user(None);
                self.set_phase(SessionPhase::SignedOut);
                BootstrapOutcome::Unauthenticated
            }
            Err(e) => {
                let message = e.to_string();
                error!("Session bootstrap failed: {}", message);
                state.set_error(Some(message.clone()));
                self.set_phase(SessionPhase::Failed {
                    message: message.clone(),
                });
                self.publish(SessionEvent::Failed {
                    message: message.clone(),
                });
                BootstrapOutcome::Failed { message }
            }
        }
    }

    /// The manual "Try Again": starts over from the provider session.
    pub async fn retry(&self, store: &RwLock<AppStore>) -> BootstrapOutcome {
        info!("Retrying session bootstrap");
        self.run(store).await
    }

    /// Starts a demo session with a fixed user and dataset, without the provider.
    pub async fn sign_in_demo(
        &self,
        store: &RwLock<AppStore>,
        user: User,
        states: Vec<String>,
        dataset: Dataset,
    ) {
        self.supersede();
        self.demo.store(true, Ordering::SeqCst);
        if let Err(e) = self.storage.set_user_role(user.role.as_str()) {
            warn!("Failed to persist user role: {}", e);
        }
        {
            let mut state = store.write().await;
            state.load_dataset(user.clone(), states, dataset);
            state.set_is_loading(false);
            state.set_error(None);
        }
        info!(user = %user.email, role = %user.role, "Demo session ready");
        self.set_phase(SessionPhase::Ready);
        self.publish(SessionEvent::Authenticated { user });
    }

    /// Ends the session: provider sign-out, session storage wiped, store reset.
    pub async fn sign_out(&self, store: &RwLock<AppStore>) {
        self.supersede();
        self.demo.store(false, Ordering::SeqCst);

        if let Err(e) = self.identity.sign_out().await {
            warn!("Provider sign-out failed: {}", e);
        }
        if let Err(e) = self.storage.clear_all() {
            warn!("Failed to clear session storage: {}", e);
        }

        store.write().await.reset();
        info!("Signed out");
        self.set_phase(SessionPhase::SignedOut);
        self.publish(SessionEvent::SignedOut);
    }

    /// Invalidates whatever run is in flight.
    fn supersede(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let mut cancel = self.cancel.lock().unwrap_or_else(PoisonError::into_inner);
        cancel.cancel();
        *cancel = CancellationToken::new();
    }

    async fn resolve(&self) -> Result<Resolution, PortError> {
        if !self.identity.is_authenticated().await {
            return Ok(Resolution::Unauthenticated);
        }

        let Some(access_token) = self.identity.access_token().await? else {
            return Ok(Resolution::Unauthenticated);
        };
        let claims = self.identity.user_claims().await?;
        self.storage
            .set_access_token(&access_token)
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let record = match self.directory.get_user(&claims.subject, &access_token).await {
            Ok(record) => record,
            Err(PortError::NotFound(_)) => {
                info!(subject = %claims.subject, "No directory record; creating one");
                self.directory
                    .create_user(&NewDirectoryUser::from(&claims), &access_token)
                    .await?
            }
            Err(e) => return Err(e),
        };

        Ok(match Role::parse(&record.role) {
            Some(role) if role.is_session_role() => Resolution::Resolved(to_user(record, role)),
            _ => Resolution::Restricted { role: record.role },
        })
    }

    fn set_phase(&self, phase: SessionPhase) {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner) = phase;
    }

    fn publish(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

fn to_user(record: DirectoryUser, role: Role) -> User {
    User {
        id: record.subject_id,
        email: record.email,
        name: record.name,
        role,
        states: record.states.into_iter().collect::<BTreeSet<_>>(),
    }
}
