//! Single-flight credential refresh.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::{Deserialize, Serialize};

use super::error::AuthError;
use super::store::SessionStore;
use super::token::AccessToken;

/// The underlying refresh operation.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    /// `Ok(None)` means the operation finished without producing a token.
    async fn refresh(&self) -> Result<Option<AccessToken>, AuthError>;
}

/// Side effect run once per failed attempt (e.g. forced sign-out).
pub type FailureHook = Arc<dyn Fn(&AuthError) + Send + Sync>;

/// Result shared by every caller of one attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RefreshOutcome {
    Refreshed { token: AccessToken },
    Failed { error: String },
}

impl RefreshOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Refreshed { .. })
    }

    pub fn access_token(&self) -> Option<&str> {
        match self {
            Self::Refreshed { token } => Some(&token.access_token),
            Self::Failed { .. } => None,
        }
    }

    pub fn token(&self) -> Option<&AccessToken> {
        match self {
            Self::Refreshed { token } => Some(token),
            Self::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Refreshed { .. } => None,
            Self::Failed { error } => Some(error),
        }
    }
}

type PendingRefresh = Shared<BoxFuture<'static, RefreshOutcome>>;

struct InFlight {
    generation: u64,
    pending: PendingRefresh,
}

#[derive(Default)]
struct RefreshState {
    in_flight: Option<InFlight>,
    next_generation: u64,
}

/// De-duplicates concurrent refresh requests.
///
/// While an attempt is in flight every `refresh()` call awaits that same
/// attempt. Once it settles, success or failure, the coordinator is idle
/// again and the next call starts a fresh attempt. Nothing is cached.
///
/// Attempts run on a spawned tokio task, so callers must be inside a tokio
/// runtime. Dropping every waiter does not cancel the attempt.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use async_trait::async_trait;
/// use chatflow::auth::{AccessToken, AuthError, RefreshCoordinator, TokenRefresher};
///
/// struct Fixed;
///
/// #[async_trait]
/// impl TokenRefresher for Fixed {
///     async fn refresh(&self) -> Result<Option<AccessToken>, AuthError> {
///         Ok(Some(AccessToken::new("fresh")))
///     }
/// }
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let coordinator = RefreshCoordinator::new(Arc::new(Fixed));
/// let (a, b) = tokio::join!(coordinator.refresh(), coordinator.refresh());
/// assert_eq!(a, b);
/// assert_eq!(a.access_token(), Some("fresh"));
/// # }
/// ```
pub struct RefreshCoordinator {
    refresher: Arc<dyn TokenRefresher>,
    store: Option<Arc<dyn SessionStore>>,
    profile: String,
    on_hard_failure: Option<FailureHook>,
    state: Arc<Mutex<RefreshState>>,
}

impl fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("profile", &self.profile)
            .field("store", &self.store.as_ref().map(|_| ".."))
            .field("on_hard_failure", &self.on_hard_failure.as_ref().map(|_| ".."))
            .field("in_flight", &self.is_refreshing())
            .finish()
    }
}

impl RefreshCoordinator {
    pub fn new(refresher: Arc<dyn TokenRefresher>) -> Self {
        Self {
            refresher,
            store: None,
            profile: "default".to_string(),
            on_hard_failure: None,
            state: Arc::new(Mutex::new(RefreshState::default())),
        }
    }

    /// Persist refreshed tokens to `store`.
    pub fn with_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = profile.into();
        self
    }

    pub fn on_hard_failure(mut self, hook: FailureHook) -> Self {
        self.on_hard_failure = Some(hook);
        self
    }

    /// A failure hook that clears the stored session.
    pub fn sign_out_hook(
        store: Arc<dyn SessionStore>,
        profile: impl Into<String>,
    ) -> FailureHook {
        let profile = profile.into();
        Arc::new(move |error: &AuthError| {
            tracing::warn!(error = %error, profile = %profile, "Signing out after failed refresh");
            if let Err(e) = store.clear(&profile) {
                tracing::warn!(error = %e, "Failed to clear session");
            }
        })
    }

    /// Whether an attempt is currently in flight.
    pub fn is_refreshing(&self) -> bool {
        lock(&self.state).in_flight.is_some()
    }

    /// Join the in-flight attempt or start a new one.
    pub async fn refresh(&self) -> RefreshOutcome {
        self.join_or_start().await
    }

    fn join_or_start(&self) -> PendingRefresh {
        let mut state = lock(&self.state);
        if let Some(in_flight) = &state.in_flight {
            tracing::debug!(generation = in_flight.generation, "Joining in-flight refresh");
            return in_flight.pending.clone();
        }

        let generation = state.next_generation;
        state.next_generation += 1;

        let refresher = Arc::clone(&self.refresher);
        let store = self.store.clone();
        let profile = self.profile.clone();
        let on_hard_failure = self.on_hard_failure.clone();
        let slot = Arc::clone(&self.state);
        let task_slot = Arc::clone(&self.state);
        let abort_hook = self.on_hard_failure.clone();

        let attempt = tokio::spawn(async move {
            tracing::debug!(generation, "Starting credential refresh");
            let result = match refresher.refresh().await {
                Ok(Some(token)) if token.is_usable() => Ok(token),
                Ok(_) => Err(AuthError::NoToken),
                Err(e) => Err(e),
            };

            let outcome = match result {
                Ok(token) => {
                    if let Some(store) = &store {
                        if let Err(e) = store.save(&profile, &token) {
                            tracing::warn!(error = %e, "Failed to persist refreshed token");
                        }
                    }
                    RefreshOutcome::Refreshed { token }
                }
                Err(error) => {
                    tracing::warn!(generation, error = %error, "Credential refresh failed");
                    if let Some(hook) = &on_hard_failure {
                        hook(&error);
                    }
                    RefreshOutcome::Failed {
                        error: error.to_string(),
                    }
                }
            };

            settle(&task_slot, generation);
            tracing::debug!(generation, ok = outcome.is_ok(), "Credential refresh settled");
            outcome
        });

        // Waiters only observe the task; dropping all of them leaves it running.
        let pending = async move {
            match attempt.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::warn!(generation, error = %e, "Credential refresh task aborted");
                    settle(&slot, generation);
                    let error = AuthError::Rejected(e.to_string());
                    if let Some(hook) = &abort_hook {
                        hook(&error);
                    }
                    RefreshOutcome::Failed {
                        error: error.to_string(),
                    }
                }
            }
        }
        .boxed()
        .shared();

        state.in_flight = Some(InFlight {
            generation,
            pending: pending.clone(),
        });
        pending
    }
}

/// Clear the in-flight slot if it still holds attempt `generation`.
fn settle(state: &Mutex<RefreshState>, generation: u64) {
    let mut state = lock(state);
    if state.in_flight.as_ref().map(|f| f.generation) == Some(generation) {
        state.in_flight = None;
    }
}

fn lock(state: &Mutex<RefreshState>) -> MutexGuard<'_, RefreshState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
