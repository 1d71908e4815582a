//! Session guard gating protected dashboard content.
//!
//! On every mount the guard decides whether the stored access credential is
//! currently valid, attempts a single silent renewal if it has expired, and
//! only then lets protected content render. The resolution is a tri-state
//! machine: `Unknown` on mount, then exactly one of `Authorized` or
//! `Unauthorized` - nothing protected ever renders while `Unknown`.
//!
//! Unmount safety uses a generation counter: `mount` issues a generation,
//! `unmount` invalidates it, and a resolution landing with a stale
//! generation is discarded without touching state, store, or the
//! diagnostic channel.

// Allow dead code: the rendering/unmount surface is driven by the dashboard
// shell, not by the session-check binary
#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::api::{ApiError, RenewalClient};
use crate::auth::claims;
use crate::auth::store::TokenStore;
use crate::notify::Notifier;

/// Label on the diagnostic emitted when silent renewal fails.
pub const RENEWAL_FAILED_NOTICE: &str = "Session renewal failed";

/// Resolution of a guard mount.
///
/// `Unauthorized` carries its redirect target so "where to send the user"
/// cannot drift apart from "the user is not allowed in".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Initial state on every mount; nothing conclusive rendered yet.
    Unknown,
    /// Protected content may render.
    Authorized,
    /// Protected content must not render; navigate to the sign-in route.
    Unauthorized { redirect_to: String },
}

/// What the shell should render for the current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Render {
    Loading,
    Content,
    Redirect(String),
}

/// How a finished transition lands on the guard.
enum Outcome {
    Allow {
        /// Renewed access credential to persist before authorizing.
        persist: Option<String>,
    },
    Deny {
        /// Whether to clear the whole credential store.
        clear: bool,
        /// Detail for the one user-visible diagnostic, if any.
        notice: Option<String>,
    },
}

/// Mutable per-mount state. A single lock covers state, generation, and the
/// redirect latch so stale resolutions are discarded atomically.
struct Cell {
    state: SessionState,
    generation: u64,
    redirect_fired: bool,
}

pub struct SessionGuard<S, R, N> {
    store: Arc<Mutex<S>>,
    renewal: R,
    notifier: N,
    sign_in_route: String,
    cell: Mutex<Cell>,
}

impl<S, R, N> SessionGuard<S, R, N>
where
    S: TokenStore,
    R: RenewalClient,
    N: Notifier,
{
    pub fn new(
        store: Arc<Mutex<S>>,
        renewal: R,
        notifier: N,
        sign_in_route: impl Into<String>,
    ) -> Self {
        Self {
            store,
            renewal,
            notifier,
            sign_in_route: sign_in_route.into(),
            cell: Mutex::new(Cell {
                state: SessionState::Unknown,
                generation: 0,
                redirect_fired: false,
            }),
        }
    }

    /// Begin a fresh mount: state returns to `Unknown`, the redirect latch
    /// resets, and a new generation is issued for [`Self::resolve`].
    pub async fn mount(&self) -> u64 {
        let mut cell = self.cell.lock().await;
        cell.generation += 1;
        cell.state = SessionState::Unknown;
        cell.redirect_fired = false;
        cell.generation
    }

    /// Invalidate the current mount. An in-flight resolution carrying an
    /// older generation becomes a no-op when it tries to land.
    pub async fn unmount(&self) {
        let mut cell = self.cell.lock().await;
        cell.generation += 1;
    }

    pub async fn state(&self) -> SessionState {
        self.cell.lock().await.state.clone()
    }

    /// Rendering contract for the shell: loading placeholder while
    /// `Unknown`, protected content iff `Authorized`, redirect otherwise.
    pub async fn render(&self) -> Render {
        match self.state().await {
            SessionState::Unknown => Render::Loading,
            SessionState::Authorized => Render::Content,
            SessionState::Unauthorized { redirect_to } => Render::Redirect(redirect_to),
        }
    }

    /// One-shot navigation effect: yields the sign-in route the first time
    /// it is called after the guard resolves `Unauthorized`, then `None`
    /// until the next mount. Repeated re-renders never trigger duplicate
    /// navigations.
    pub async fn take_redirect(&self) -> Option<String> {
        let mut cell = self.cell.lock().await;
        match &cell.state {
            SessionState::Unauthorized { redirect_to } if !cell.redirect_fired => {
                let target = redirect_to.clone();
                cell.redirect_fired = true;
                Some(target)
            }
            _ => None,
        }
    }

    /// Run the transition algorithm once for the given mount generation.
    ///
    /// Makes at most one renewal network call (only when the stored access
    /// credential has expired). Every failure path resolves `Unauthorized`
    /// locally; errors never escape to the caller.
    pub async fn resolve(&self, generation: u64) {
        let outcome = match self.run_transition().await {
            Ok(outcome) => outcome,
            Err(error) => {
                // Fail closed on anything the steps below did not map
                // themselves, e.g. a store read error.
                debug!(%error, "session transition failed, failing closed");
                Outcome::Deny {
                    clear: false,
                    notice: None,
                }
            }
        };

        self.apply(generation, outcome).await;
    }

    async fn run_transition(&self) -> Result<Outcome> {
        let access = { self.store.lock().await.access()? };
        let Some(access) = access else {
            // Normal "never signed in" path: silent, no network call.
            debug!("no access credential stored");
            return Ok(Outcome::Deny {
                clear: false,
                notice: None,
            });
        };

        let expires_at = match claims::expires_at(&access) {
            Ok(exp) => exp,
            Err(error) => {
                debug!(%error, "stored access credential failed to decode");
                return Ok(Outcome::Deny {
                    clear: false,
                    notice: None,
                });
            }
        };

        if !claims::is_expired(expires_at) {
            return Ok(Outcome::Allow { persist: None });
        }

        debug!(expires_at, "access credential expired, attempting renewal");

        let refresh = { self.store.lock().await.refresh()? };
        let Some(refresh) = refresh else {
            // The backend would reject an empty refresh anyway; short-circuit
            // to the same renewal-failure outcome without a network call.
            return Ok(Outcome::Deny {
                clear: true,
                notice: Some(ApiError::MissingRefreshCredential.to_string()),
            });
        };

        match self.renewal.renew(&refresh).await {
            Ok(new_access) => Ok(Outcome::Allow {
                persist: Some(new_access),
            }),
            Err(error) => {
                warn!(%error, "credential renewal failed");
                Ok(Outcome::Deny {
                    clear: true,
                    notice: Some(error.to_string()),
                })
            }
        }
    }

    /// Land an outcome, unless the mount it belongs to is gone.
    async fn apply(&self, generation: u64, outcome: Outcome) {
        let mut cell = self.cell.lock().await;
        if cell.generation != generation {
            debug!(
                generation,
                current = cell.generation,
                "discarding resolution for unmounted guard"
            );
            return;
        }

        match outcome {
            Outcome::Allow { persist } => {
                if let Some(credential) = persist {
                    if let Err(error) = self.store.lock().await.set_access(&credential) {
                        // The renewed credential is still valid for this
                        // mount even if it could not be persisted.
                        warn!(%error, "failed to persist renewed access credential");
                    }
                }
                cell.state = SessionState::Authorized;
            }
            Outcome::Deny { clear, notice } => {
                if clear {
                    if let Err(error) = self.store.lock().await.clear() {
                        warn!(%error, "failed to clear credential store");
                    }
                }
                if let Some(detail) = notice {
                    self.notifier.notify(RENEWAL_FAILED_NOTICE, &detail);
                }
                cell.state = SessionState::Unauthorized {
                    redirect_to: self.sign_in_route.clone(),
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    use tokio::sync::Notify;

    use super::*;
    use crate::auth::claims::{forge_credential, now_secs};
    use crate::auth::store::MemoryTokenStore;

    const SIGN_IN: &str = "/signin";

    enum Reply {
        Access(String),
        Reject(u16),
        Failure(String),
    }

    /// Scripted stand-in for the HTTP renewal client. Counts calls, records
    /// the refresh credentials it was handed, and optionally parks on a
    /// gate so tests can unmount mid-flight.
    #[derive(Clone)]
    struct ScriptedRenewal {
        reply: Arc<Reply>,
        entered: Option<Arc<Notify>>,
        gate: Option<Arc<Notify>>,
        calls: Arc<AtomicUsize>,
        refreshes: Arc<StdMutex<Vec<String>>>,
    }

    impl ScriptedRenewal {
        fn new(reply: Reply) -> Self {
            Self {
                reply: Arc::new(reply),
                entered: None,
                gate: None,
                calls: Arc::new(AtomicUsize::new(0)),
                refreshes: Arc::new(StdMutex::new(Vec::new())),
            }
        }

        fn gated(reply: Reply, entered: Arc<Notify>, gate: Arc<Notify>) -> Self {
            Self {
                entered: Some(entered),
                gate: Some(gate),
                ..Self::new(reply)
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl RenewalClient for ScriptedRenewal {
        async fn renew(&self, refresh: &str) -> Result<String, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.refreshes.lock().unwrap().push(refresh.to_string());

            if let Some(entered) = &self.entered {
                entered.notify_one();
            }
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }

            match &*self.reply {
                Reply::Access(access) => Ok(access.clone()),
                Reply::Reject(status) => Err(ApiError::from_status(
                    reqwest::StatusCode::from_u16(*status).unwrap(),
                    "",
                )),
                Reply::Failure(message) => Err(ApiError::InvalidResponse(message.clone())),
            }
        }
    }

    #[derive(Clone, Default)]
    struct RecordingNotifier {
        records: Arc<StdMutex<Vec<(String, String)>>>,
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, label: &str, detail: &str) {
            self.records
                .lock()
                .unwrap()
                .push((label.to_string(), detail.to_string()));
        }
    }

    impl RecordingNotifier {
        fn records(&self) -> Vec<(String, String)> {
            self.records.lock().unwrap().clone()
        }
    }

    type TestGuard = SessionGuard<MemoryTokenStore, ScriptedRenewal, RecordingNotifier>;

    struct Fixture {
        guard: Arc<TestGuard>,
        store: Arc<Mutex<MemoryTokenStore>>,
        renewal: ScriptedRenewal,
        notifier: RecordingNotifier,
    }

    fn fixture(store: MemoryTokenStore, renewal: ScriptedRenewal) -> Fixture {
        let store = Arc::new(Mutex::new(store));
        let notifier = RecordingNotifier::default();
        let guard = Arc::new(SessionGuard::new(
            Arc::clone(&store),
            renewal.clone(),
            notifier.clone(),
            SIGN_IN,
        ));
        Fixture {
            guard,
            store,
            renewal,
            notifier,
        }
    }

    fn seeded_store(access: Option<&str>, refresh: Option<&str>) -> MemoryTokenStore {
        let mut store = MemoryTokenStore::new();
        if let Some(access) = access {
            store.set_access(access).unwrap();
        }
        if let Some(refresh) = refresh {
            store.set_refresh(refresh).unwrap();
        }
        store
    }

    // An empty store resolves unauthorized without any renewal call.
    #[tokio::test]
    async fn test_no_credential_redirects_without_network() {
        let f = fixture(
            MemoryTokenStore::new(),
            ScriptedRenewal::new(Reply::Access("unused".into())),
        );

        let generation = f.guard.mount().await;
        assert_eq!(f.guard.state().await, SessionState::Unknown);
        assert_eq!(f.guard.render().await, Render::Loading);

        f.guard.resolve(generation).await;

        assert_eq!(
            f.guard.state().await,
            SessionState::Unauthorized {
                redirect_to: SIGN_IN.to_string()
            }
        );
        assert_eq!(f.renewal.calls(), 0);
        assert!(f.notifier.records().is_empty());
    }

    // An unexpired credential authorizes without any renewal call.
    #[tokio::test]
    async fn test_valid_credential_authorizes_without_network() {
        let access = forge_credential(now_secs() + 3600.0);
        let store = seeded_store(Some(&access), Some("valid-refresh-token"));
        let f = fixture(store, ScriptedRenewal::new(Reply::Access("unused".into())));

        let generation = f.guard.mount().await;
        f.guard.resolve(generation).await;

        assert_eq!(f.guard.state().await, SessionState::Authorized);
        assert_eq!(f.guard.render().await, Render::Content);
        assert_eq!(f.renewal.calls(), 0);
        assert_eq!(f.guard.take_redirect().await, None);
    }

    // An expired credential triggers exactly one renewal with the stored
    // refresh credential; the new access credential is persisted.
    #[tokio::test]
    async fn test_expired_credential_renews_and_persists() {
        let access = forge_credential(now_secs() - 10.0);
        let store = seeded_store(Some(&access), Some("valid-refresh-token"));
        let f = fixture(
            store,
            ScriptedRenewal::new(Reply::Access("new-access-token".into())),
        );

        let generation = f.guard.mount().await;
        f.guard.resolve(generation).await;

        assert_eq!(f.guard.state().await, SessionState::Authorized);
        assert_eq!(f.renewal.calls(), 1);
        assert_eq!(
            *f.renewal.refreshes.lock().unwrap(),
            vec!["valid-refresh-token"]
        );
        assert_eq!(
            f.store.lock().await.access().unwrap().as_deref(),
            Some("new-access-token")
        );
    }

    // A renewal rejection clears the store, emits one diagnostic carrying
    // the underlying message, and redirects.
    #[tokio::test]
    async fn test_renewal_failure_clears_store_and_notifies() {
        let access = forge_credential(now_secs() - 10.0);
        let store = seeded_store(Some(&access), Some("valid-refresh-token"));
        let f = fixture(
            store,
            ScriptedRenewal::new(Reply::Failure("Token refresh failed".into())),
        );

        let generation = f.guard.mount().await;
        f.guard.resolve(generation).await;

        assert_eq!(
            f.guard.state().await,
            SessionState::Unauthorized {
                redirect_to: SIGN_IN.to_string()
            }
        );
        assert_eq!(f.guard.take_redirect().await, Some(SIGN_IN.to_string()));

        let records = f.notifier.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].0, RENEWAL_FAILED_NOTICE);
        assert!(records[0].1.contains("Token refresh failed"));

        assert_eq!(f.store.lock().await.access().unwrap(), None);
        assert_eq!(f.store.lock().await.refresh().unwrap(), None);
    }

    // A non-2xx renewal response lands in the same place as a rejection.
    #[tokio::test]
    async fn test_renewal_non_success_status_redirects() {
        let access = forge_credential(now_secs() - 10.0);
        let store = seeded_store(Some(&access), Some("valid-refresh-token"));
        let f = fixture(store, ScriptedRenewal::new(Reply::Reject(401)));

        let generation = f.guard.mount().await;
        f.guard.resolve(generation).await;

        assert_eq!(
            f.guard.state().await,
            SessionState::Unauthorized {
                redirect_to: SIGN_IN.to_string()
            }
        );
        assert_eq!(f.guard.render().await, Render::Redirect(SIGN_IN.to_string()));
        assert_eq!(f.renewal.calls(), 1);
        assert_eq!(f.store.lock().await.access().unwrap(), None);
    }

    // Repeated re-renders after resolving unauthorized navigate once.
    #[tokio::test]
    async fn test_redirect_fires_once_per_mount() {
        let f = fixture(
            MemoryTokenStore::new(),
            ScriptedRenewal::new(Reply::Access("unused".into())),
        );

        let generation = f.guard.mount().await;
        f.guard.resolve(generation).await;

        assert_eq!(f.guard.take_redirect().await, Some(SIGN_IN.to_string()));
        assert_eq!(f.guard.take_redirect().await, None);
        assert_eq!(f.guard.take_redirect().await, None);

        // A re-resolution on the same mount (re-render) must not re-arm it.
        f.guard.resolve(generation).await;
        assert_eq!(f.guard.take_redirect().await, None);

        // A fresh mount does.
        let generation = f.guard.mount().await;
        f.guard.resolve(generation).await;
        assert_eq!(f.guard.take_redirect().await, Some(SIGN_IN.to_string()));
    }

    // A resolution landing after unmount mutates nothing - no state
    // transition, no store write, no diagnostic.
    #[tokio::test]
    async fn test_unmount_discards_in_flight_resolution() {
        let access = forge_credential(now_secs() - 10.0);
        let store = seeded_store(Some(&access), Some("valid-refresh-token"));

        let entered = Arc::new(Notify::new());
        let gate = Arc::new(Notify::new());
        let renewal = ScriptedRenewal::gated(
            Reply::Access("stale-access-token".into()),
            Arc::clone(&entered),
            Arc::clone(&gate),
        );
        let f = fixture(store, renewal);

        let generation = f.guard.mount().await;
        let task = tokio::spawn({
            let guard = Arc::clone(&f.guard);
            async move { guard.resolve(generation).await }
        });

        // Wait until the renewal call is parked mid-flight, then unmount.
        entered.notified().await;
        f.guard.unmount().await;
        gate.notify_one();
        task.await.unwrap();

        assert_eq!(f.guard.state().await, SessionState::Unknown);
        assert_eq!(
            f.store.lock().await.access().unwrap().as_deref(),
            Some(access.as_str()),
            "stale resolution must not overwrite the store"
        );
        assert!(f.notifier.records().is_empty());
        assert_eq!(f.renewal.calls(), 1);
    }

    // An unparsable credential fails closed, silently, without
    // touching the store or the network.
    #[tokio::test]
    async fn test_malformed_credential_fails_closed() {
        let store = seeded_store(Some("not-a-jwt"), Some("valid-refresh-token"));
        let f = fixture(store, ScriptedRenewal::new(Reply::Access("unused".into())));

        let generation = f.guard.mount().await;
        f.guard.resolve(generation).await;

        assert_eq!(
            f.guard.state().await,
            SessionState::Unauthorized {
                redirect_to: SIGN_IN.to_string()
            }
        );
        assert_eq!(f.renewal.calls(), 0);
        assert!(f.notifier.records().is_empty());
        assert_eq!(
            f.store.lock().await.access().unwrap().as_deref(),
            Some("not-a-jwt")
        );
    }

    // Expired credential with no refresh slot short-circuits to the
    // renewal-failure outcome without a network call.
    #[tokio::test]
    async fn test_expired_without_refresh_clears_and_redirects() {
        let access = forge_credential(now_secs() - 10.0);
        let store = seeded_store(Some(&access), None);
        let f = fixture(store, ScriptedRenewal::new(Reply::Access("unused".into())));

        let generation = f.guard.mount().await;
        f.guard.resolve(generation).await;

        assert_eq!(
            f.guard.state().await,
            SessionState::Unauthorized {
                redirect_to: SIGN_IN.to_string()
            }
        );
        assert_eq!(f.renewal.calls(), 0);
        assert_eq!(f.store.lock().await.access().unwrap(), None);
        assert_eq!(f.notifier.records().len(), 1);
    }

    // Session state is created fresh per mount, never cached across mounts.
    #[tokio::test]
    async fn test_mount_resets_to_unknown() {
        let access = forge_credential(now_secs() + 3600.0);
        let store = seeded_store(Some(&access), None);
        let f = fixture(store, ScriptedRenewal::new(Reply::Access("unused".into())));

        let generation = f.guard.mount().await;
        f.guard.resolve(generation).await;
        assert_eq!(f.guard.state().await, SessionState::Authorized);

        f.guard.mount().await;
        assert_eq!(f.guard.state().await, SessionState::Unknown);
        assert_eq!(f.guard.render().await, Render::Loading);
    }
}
