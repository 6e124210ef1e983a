//! Session manager: live sessions, id minting, expiry sweep and shutdown.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::admission::Admission;
use crate::config::ManagerConfig;
use crate::error::{Error, Result};
use crate::id::SessionId;
use crate::lru::LruIndex;
use crate::registry;
use crate::store::{Store, StoreFactory};

/// Live sessions. `sessions` and `lru` always hold the same ids.
struct Inner {
    sessions: HashMap<String, Box<dyn Store>>,
    lru: LruIndex<String, DateTime<Utc>>,
}

impl Inner {
    /// Draw random ids until one is not live. Caller holds the write lock.
    fn mint_id(&self) -> SessionId {
        loop {
            let sid = SessionId::random();
            if !self.sessions.contains_key(sid.as_str()) {
                return sid;
            }
        }
    }

    fn insert(&mut self, sid: String, store: Box<dyn Store>, touched: DateTime<Utc>) {
        self.lru.put(sid.clone(), touched);
        self.sessions.insert(sid, store);
    }

    fn remove(&mut self, sid: &str) -> Option<Box<dyn Store>> {
        self.lru.remove([sid]);
        self.sessions.remove(sid)
    }
}

/// State shared between the manager and its sweep task.
struct Shared {
    state: RwLock<Inner>,
    factory: StoreFactory,
    config: ManagerConfig,
    admission: Admission,
    /// Stops the sweep task.
    shutdown: CancellationToken,
    /// Cancelled once the first `close` has finished tearing down.
    torn_down: CancellationToken,
}

impl Shared {
    /// Expire every session idle for longer than the configured lifetime.
    ///
    /// Sessions are dropped from the live map even when the backend fails to
    /// expire them; the failure is logged since there is no caller to return it to.
    async fn sweep(&self) -> usize {
        let lifetime = TimeDelta::from_std(self.config.max_lifetime).unwrap_or(TimeDelta::MAX);
        let mut state = self.state.write().await;
        let now = Utc::now();

        let expired = state.lru.find_expired_items(|touched| now - *touched > lifetime);
        for sid in &expired {
            if let Some(store) = state.remove(sid)
                && let Err(e) = store.expire()
            {
                warn!(session_id = %sid, error = %e, "Failed to expire idle session");
            }
        }

        if !expired.is_empty() {
            debug!(
                count = expired.len(),
                live = state.sessions.len(),
                "Swept idle sessions"
            );
        }
        expired.len()
    }
}

/// Snapshot of manager state.
#[derive(Debug, Clone)]
pub struct ManagerStats {
    /// Registered name of the backend in use.
    pub backend: String,

    /// Number of live sessions.
    pub live_sessions: usize,

    /// Operations currently executing.
    pub in_flight: usize,

    /// Whether [`SessionManager::close`] has been called.
    pub closed: bool,
}

/// Concurrent session manager.
///
/// Owns one backend [`Store`] handle per live session, a recency index used
/// to find idle sessions, and a background task that expires them.
///
/// Operations addressed to an empty or unknown id are no-ops. Once
/// [`close`](Self::close) has been called every operation is a no-op.
///
/// # Example
///
/// ```rust,ignore
/// use std::time::Duration;
/// use tessel_session::{ManagerConfig, SessionManager};
///
/// let manager = SessionManager::new(
///     ManagerConfig::new()
///         .with_backend("memory")
///         .with_max_lifetime(Duration::from_secs(1800)),
/// );
///
/// let sid = manager.set("", "user", "ada".into()).await?;
/// assert_eq!(manager.get(&sid, "user").await, Some("ada".into()));
/// manager.close().await;
/// ```
pub struct SessionManager {
    shared: Arc<Shared>,
    sweeper: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl SessionManager {
    /// Create a manager, recovering existing sessions from the backend.
    ///
    /// # Panics
    ///
    /// Panics on any configuration error (see [`try_new`](Self::try_new)).
    pub fn new(config: ManagerConfig) -> Self {
        Self::try_new(config).unwrap_or_else(|e| panic!("can not create session manager: {}", e))
    }

    /// Create a manager, returning configuration errors instead of panicking.
    ///
    /// Fails if the backend is not registered, its configuration payload is
    /// rejected, recovery through [`Store::init`] fails, or the sweep task is
    /// enabled outside a Tokio runtime.
    pub fn try_new(config: ManagerConfig) -> Result<Self> {
        let factory = registry::lookup(&config.backend)
            .ok_or_else(|| Error::UnknownBackend(config.backend.clone()))?;

        if config.enable_sweep {
            if config.sweep_interval.is_zero() {
                return Err(Error::Config("sweep interval must be non-zero".to_string()));
            }
            if tokio::runtime::Handle::try_current().is_err() {
                return Err(Error::Config(
                    "session sweep requires a Tokio runtime".to_string(),
                ));
            }
        }

        let scanner = factory("", &config.backend_config)?;
        let mut recovered: Vec<(String, DateTime<Utc>)> = scanner.init()?.into_iter().collect();
        recovered.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

        let mut inner = Inner {
            sessions: HashMap::with_capacity(recovered.len()),
            lru: LruIndex::new(),
        };
        for (sid, last_update) in recovered {
            let store = factory(&sid, &config.backend_config)?;
            inner.insert(sid, store, last_update);
        }

        debug!(
            backend = %config.backend,
            recovered = inner.sessions.len(),
            "Session manager started"
        );

        let shared = Arc::new(Shared {
            state: RwLock::new(inner),
            factory,
            config,
            admission: Admission::new(),
            shutdown: CancellationToken::new(),
            torn_down: CancellationToken::new(),
        });

        let sweeper = shared
            .config
            .enable_sweep
            .then(|| tokio::spawn(run_sweeper(shared.clone())));

        Ok(Self {
            shared,
            sweeper: parking_lot::Mutex::new(sweeper),
        })
    }

    /// Get the manager configuration.
    pub fn config(&self) -> &ManagerConfig {
        &self.shared.config
    }

    /// Read `key` from session `sid`.
    pub async fn get(&self, sid: impl AsRef<str>, key: &str) -> Option<Value> {
        let sid = sid.as_ref();
        if sid.is_empty() {
            return None;
        }
        let _guard = self.shared.admission.admit()?;

        let state = self.shared.state.read().await;
        let value = state.sessions.get(sid)?.get(key);
        trace!(session_id = %sid, key = %key, found = value.is_some(), "Session get");
        value
    }

    /// Read `key` from session `sid` and deserialize it.
    ///
    /// Returns `Ok(None)` if absent and [`Error::Codec`] if the stored value
    /// does not have the shape of `T`.
    pub async fn get_as<T: DeserializeOwned>(
        &self,
        sid: impl AsRef<str>,
        key: &str,
    ) -> Result<Option<T>> {
        match self.get(sid, key).await {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Store `value` under `key`.
    ///
    /// If `sid` is empty or not live a new session is created and its id is
    /// returned; otherwise `sid` is returned. Either way the session's recency
    /// is refreshed. Returns the empty id once the manager is closed.
    ///
    /// Backend errors are returned unchanged. When the write that would have
    /// created a session fails, that session is discarded.
    pub async fn set(&self, sid: impl AsRef<str>, key: &str, value: Value) -> Result<SessionId> {
        let sid = sid.as_ref();
        let Some(_guard) = self.shared.admission.admit() else {
            return Ok(SessionId::none());
        };

        if !sid.is_empty() {
            let state = self.shared.state.read().await;
            if let Some(store) = state.sessions.get(sid) {
                state.lru.put_with(sid.to_string(), Utc::now);
                store.set(key, value)?;
                trace!(session_id = %sid, key = %key, "Session set");
                return Ok(SessionId::from(sid));
            }
        }

        let mut state = self.shared.state.write().await;
        let new_sid = state.mint_id();
        let store = (self.shared.factory)(new_sid.as_str(), &self.shared.config.backend_config)?;
        // A session whose first write fails is never published.
        if let Err(e) = store.set(key, value) {
            if let Err(cleanup) = store.expire() {
                warn!(session_id = %new_sid, error = %cleanup, "Failed to discard new session");
            }
            return Err(e);
        }
        state.insert(new_sid.to_string(), store, Utc::now());

        debug!(
            session_id = %new_sid,
            live = state.sessions.len(),
            "Session created"
        );
        Ok(new_sid)
    }

    /// Serialize `value` and store it under `key`. See [`set`](Self::set).
    pub async fn set_as<T: Serialize + ?Sized>(
        &self,
        sid: impl AsRef<str>,
        key: &str,
        value: &T,
    ) -> Result<SessionId> {
        let value = serde_json::to_value(value)?;
        self.set(sid, key, value).await
    }

    /// Remove `key` from session `sid`.
    pub async fn delete(&self, sid: impl AsRef<str>, key: &str) -> Result<()> {
        let sid = sid.as_ref();
        if sid.is_empty() {
            return Ok(());
        }
        let Some(_guard) = self.shared.admission.admit() else {
            return Ok(());
        };

        let state = self.shared.state.read().await;
        if let Some(store) = state.sessions.get(sid) {
            store.delete(key)?;
            trace!(session_id = %sid, key = %key, "Session key deleted");
        }
        Ok(())
    }

    /// Refresh the session's liveness, both in the backend and in the recency index.
    pub async fn update(&self, sid: impl AsRef<str>) -> Result<()> {
        let sid = sid.as_ref();
        if sid.is_empty() {
            return Ok(());
        }
        let Some(_guard) = self.shared.admission.admit() else {
            return Ok(());
        };

        let state = self.shared.state.read().await;
        if let Some(store) = state.sessions.get(sid) {
            state.lru.put_with(sid.to_string(), Utc::now);
            store.update()?;
        }
        Ok(())
    }

    /// Destroy session `sid` now.
    ///
    /// The session is forgotten even if the backend fails to expire it; the
    /// backend error is still returned.
    pub async fn expire(&self, sid: impl AsRef<str>) -> Result<()> {
        let sid = sid.as_ref();
        if sid.is_empty() {
            return Ok(());
        }
        let Some(_guard) = self.shared.admission.admit() else {
            return Ok(());
        };

        let mut state = self.shared.state.write().await;
        match state.remove(sid) {
            Some(store) => {
                debug!(session_id = %sid, "Session expired");
                store.expire()
            }
            None => Ok(()),
        }
    }

    /// Expire every live session, least recently used first.
    ///
    /// Stops at the first backend error and returns it. Sessions expired
    /// before the failure stay gone; the failing session and those after it
    /// stay live.
    pub async fn flush(&self) -> Result<()> {
        let Some(_guard) = self.shared.admission.admit() else {
            return Ok(());
        };

        let mut state = self.shared.state.write().await;
        let mut flushed = 0usize;
        for sid in state.lru.keys() {
            if let Some(store) = state.sessions.get(&sid)
                && let Err(e) = store.expire()
            {
                warn!(session_id = %sid, error = %e, flushed, "Flush stopped");
                return Err(e);
            }
            state.remove(&sid);
            flushed += 1;
        }

        debug!(count = flushed, "Flushed all sessions");
        Ok(())
    }

    /// Run one expiry sweep now. Returns the number of sessions expired.
    pub async fn sweep_now(&self) -> usize {
        let Some(_guard) = self.shared.admission.admit() else {
            return 0;
        };
        self.shared.sweep().await
    }

    /// Visit every live session.
    pub async fn iterate<F>(&self, mut f: F)
    where
        F: FnMut(&str, &dyn Store),
    {
        let Some(_guard) = self.shared.admission.admit() else {
            return;
        };

        let state = self.shared.state.read().await;
        for (sid, store) in &state.sessions {
            f(sid, store.as_ref());
        }
    }

    /// Whether `sid` is a live session.
    pub async fn contains(&self, sid: impl AsRef<str>) -> bool {
        let sid = sid.as_ref();
        if sid.is_empty() {
            return false;
        }
        self.shared.state.read().await.sessions.contains_key(sid)
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        self.shared.state.read().await.sessions.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub fn is_closed(&self) -> bool {
        self.shared.admission.is_closed()
    }

    /// Get manager statistics.
    pub async fn stats(&self) -> ManagerStats {
        let state = self.shared.state.read().await;
        ManagerStats {
            backend: self.shared.config.backend.clone(),
            live_sessions: state.sessions.len(),
            in_flight: self.shared.admission.in_flight(),
            closed: self.shared.admission.is_closed(),
        }
    }

    /// Shut the manager down.
    ///
    /// Marks the manager closed, waits for every operation admitted before
    /// the mark to finish, stops the sweep task and releases the live
    /// sessions. Backend data is left in place, so persistent backends can
    /// recover it on the next start.
    ///
    /// Concurrent or repeated calls all wait for the drain and for the first
    /// caller's teardown before returning.
    pub async fn close(&self) {
        if !self.shared.admission.close() {
            self.shared.admission.drained().await;
            self.shared.torn_down.cancelled().await;
            return;
        }
        // Released on every exit, so later callers never wait forever.
        let _torn_down = self.shared.torn_down.clone().drop_guard();

        self.shared.admission.drained().await;
        self.shared.shutdown.cancel();

        let sweeper = self.sweeper.lock().take();
        if let Some(handle) = sweeper
            && let Err(e) = handle.await
        {
            warn!(error = %e, "Session sweeper ended abnormally");
        }

        let mut state = self.shared.state.write().await;
        let released = state.sessions.len();
        state.sessions.clear();
        state.lru.clear();

        debug!(released, "Session manager closed");
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.shared.shutdown.cancel();
    }
}

/// Background expiry loop. Exits on cancellation or once the manager is closed.
async fn run_sweeper(shared: Arc<Shared>) {
    let mut ticker = tokio::time::interval(shared.config.sweep_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = shared.shutdown.cancelled() => break,
            _ = ticker.tick() => {
                let Some(_guard) = shared.admission.admit() else {
                    break;
                };
                shared.sweep().await;
            }
        }
    }

    trace!("Session sweeper stopped");
}
