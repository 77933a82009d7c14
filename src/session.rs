//! Session-scoped memoization of the loaded table and the trained model.
//!
//! Each browser session owns a [`Session`]. The table is cached per data
//! source and the model per dataset fingerprint, so page reruns inside one
//! session neither refetch nor retrain. [`Session::refresh`] drops both.
//!
//! Loading and training block, so they run on the tokio blocking pool. A
//! per-session async mutex serializes reruns within one session while other
//! sessions proceed independently.

use crate::config::DashboardConfig;
use crate::error::{DashboardError, Result};
use crate::loader::{self, LoadedData};
use crate::trainer::{self, TrainedModel};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Cookie carrying the session id.
pub const SESSION_COOKIE: &str = "hd_session";

#[derive(Debug, Default)]
struct SessionState {
    /// Table keyed by source display string
    data: Option<(String, Arc<LoadedData>)>,
    /// Model keyed by dataset fingerprint
    model: Option<(String, Arc<TrainedModel>)>,
}

/// Counters for cache behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionStats {
    /// Number of fetches performed
    pub loads: usize,
    /// Number of forests fitted
    pub trainings: usize,
}

/// One browser session's cached pipeline.
#[derive(Debug)]
pub struct Session {
    config: Arc<DashboardConfig>,
    state: Mutex<SessionState>,
    loads: AtomicUsize,
    trainings: AtomicUsize,
}

impl Session {
    /// Creates an empty session.
    #[must_use]
    pub fn new(config: Arc<DashboardConfig>) -> Self {
        Self {
            config,
            state: Mutex::new(SessionState::default()),
            loads: AtomicUsize::new(0),
            trainings: AtomicUsize::new(0),
        }
    }

    /// Configuration this session runs with.
    #[must_use]
    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    /// Returns the cached table, loading it on first use.
    ///
    /// # Errors
    ///
    /// Propagates loader errors. Failures are not cached.
    pub async fn data(&self) -> Result<Arc<LoadedData>> {
        let mut state = self.state.lock().await;
        self.data_locked(&mut state).await
    }

    /// Returns the cached table and the model trained on it.
    ///
    /// A new fingerprint (after [`refresh`](Self::refresh)) retrains.
    ///
    /// # Errors
    ///
    /// Propagates loader and training errors. Failures are not cached.
    pub async fn model(&self) -> Result<(Arc<LoadedData>, Arc<TrainedModel>)> {
        let mut state = self.state.lock().await;
        let data = self.data_locked(&mut state).await?;

        if let Some((fingerprint, model)) = &state.model {
            if *fingerprint == data.fingerprint {
                return Ok((data, Arc::clone(model)));
            }
        }

        let options = self.config.trainer.clone();
        let training_data = Arc::clone(&data);
        let model = run_blocking(move || trainer::train_model(&training_data.frame, &options))
            .await?;
        self.trainings.fetch_add(1, Ordering::Relaxed);

        let model = Arc::new(model);
        state.model = Some((data.fingerprint.clone(), Arc::clone(&model)));
        Ok((data, model))
    }

    /// Drops the cached table and model.
    pub async fn refresh(&self) {
        let mut state = self.state.lock().await;
        state.data = None;
        state.model = None;
        tracing::info!(source = %self.config.source, "session caches cleared");
    }

    /// Cache counters.
    #[must_use]
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            loads: self.loads.load(Ordering::Relaxed),
            trainings: self.trainings.load(Ordering::Relaxed),
        }
    }

    async fn data_locked(&self, state: &mut SessionState) -> Result<Arc<LoadedData>> {
        let key = self.config.source.to_string();
        if let Some((cached_key, data)) = &state.data {
            if *cached_key == key {
                tracing::debug!(source = %key, "data cache hit");
                return Ok(Arc::clone(data));
            }
        }

        let source = self.config.source.clone();
        let fetch = self.config.fetch;
        let loaded = run_blocking(move || loader::get_data(&source, &fetch)).await?;
        self.loads.fetch_add(1, Ordering::Relaxed);

        let loaded = Arc::new(loaded);
        state.data = Some((key, Arc::clone(&loaded)));
        Ok(loaded)
    }
}

async fn run_blocking<T, F>(work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| DashboardError::TrainingFailure(format!("background task failed: {e}")))?
}

#[derive(Debug, Default)]
struct StoreInner {
    sessions: HashMap<String, (Arc<Session>, u64)>,
    clock: u64,
}

/// Maps session ids to sessions, evicting the least recently used when full.
///
/// Requests without a cookie that must not start a session (the JSON API)
/// use the [`shared`](Self::shared) session instead, which never counts
/// against `max_sessions`.
#[derive(Debug)]
pub struct SessionStore {
    config: Arc<DashboardConfig>,
    inner: Mutex<StoreInner>,
    shared: Arc<Session>,
}

impl SessionStore {
    /// Creates an empty store bounded by `config.max_sessions`.
    #[must_use]
    pub fn new(config: Arc<DashboardConfig>) -> Self {
        Self {
            shared: Arc::new(Session::new(Arc::clone(&config))),
            config,
            inner: Mutex::new(StoreInner::default()),
        }
    }

    /// Session for cookieless clients, keyed only by the configured source.
    #[must_use]
    pub fn shared(&self) -> Arc<Session> {
        Arc::clone(&self.shared)
    }

    /// Looks up a live session without ever starting one.
    ///
    /// A hit counts as a use for eviction order.
    pub async fn existing(&self, id: Option<&str>) -> Option<Arc<Session>> {
        let id = id?;
        let mut inner = self.inner.lock().await;
        inner.clock += 1;
        let now = inner.clock;
        let (session, last_used) = inner.sessions.get_mut(id)?;
        *last_used = now;
        Some(Arc::clone(session))
    }

    /// Looks up `id`, or starts a new session when it is absent or unknown.
    ///
    /// Returns the id to hand back to the browser and the session.
    pub async fn get_or_create(&self, id: Option<&str>) -> (String, Arc<Session>) {
        let mut inner = self.inner.lock().await;
        inner.clock += 1;
        let now = inner.clock;

        if let Some(id) = id {
            if let Some((session, last_used)) = inner.sessions.get_mut(id) {
                *last_used = now;
                return (id.to_string(), Arc::clone(session));
            }
        }

        let capacity = self.config.max_sessions.max(1);
        while inner.sessions.len() >= capacity {
            let Some(oldest) = inner
                .sessions
                .iter()
                .min_by_key(|(_, (_, last_used))| *last_used)
                .map(|(key, _)| key.clone())
            else {
                break;
            };
            inner.sessions.remove(&oldest);
            tracing::debug!(session = %oldest, "evicted least recently used session");
        }

        let mut new_id = new_session_id();
        while inner.sessions.contains_key(&new_id) {
            new_id = new_session_id();
        }
        let session = Arc::new(Session::new(Arc::clone(&self.config)));
        inner
            .sessions
            .insert(new_id.clone(), (Arc::clone(&session), now));
        tracing::debug!(session = %new_id, live = inner.sessions.len(), "session started");
        (new_id, session)
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.sessions.len()
    }

    /// True if no session is live.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn new_session_id() -> String {
    format!("{:016x}", rand::random::<u64>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::DataSource;
    use crate::trainer::{FeatureSelection, TrainerOptions};
    use std::io::Write;

    const FIXTURE: &str = "CRIM,INDUS,CHAS,NOX,RM,PTRATIO,MEDV\n\
                           1,1,0,0.5,6,15,20\n\
                           2,2,1,0.5,7,16,25\n\
                           3,3,0,0.5,8,17,30\n";

    fn file_config(file: &tempfile::NamedTempFile) -> Arc<DashboardConfig> {
        Arc::new(DashboardConfig {
            source: DataSource::File(file.path().to_path_buf()),
            trainer: TrainerOptions {
                n_estimators: 5,
                random_state: Some(1),
                feature_selection: FeatureSelection::Solicited,
                ..TrainerOptions::default()
            },
            max_sessions: 2,
            ..DashboardConfig::default()
        })
    }

    fn fixture_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(contents.as_bytes()).expect("write fixture");
        file
    }

    #[tokio::test]
    async fn test_reruns_hit_cache() {
        let file = fixture_file(FIXTURE);
        let session = Session::new(file_config(&file));

        let (_, first) = session.model().await.expect("load and train");
        let (_, second) = session.model().await.expect("cached");
        let _ = session.data().await.expect("cached");

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(
            session.stats(),
            SessionStats {
                loads: 1,
                trainings: 1
            }
        );
    }

    #[tokio::test]
    async fn test_refresh_reloads_and_retrains_on_new_fingerprint() {
        let file = fixture_file(FIXTURE);
        let session = Session::new(file_config(&file));
        let (data, _) = session.model().await.expect("load and train");
        let old_fingerprint = data.fingerprint.clone();

        std::fs::write(file.path(), format!("{FIXTURE}4,4,1,0.5,9,18,35\n")).expect("rewrite");

        // Still cached until refresh
        let (cached, _) = session.model().await.expect("cached");
        assert_eq!(cached.frame.n_rows(), 3);

        session.refresh().await;
        let (fresh, model) = session.model().await.expect("reload and retrain");
        assert_eq!(fresh.frame.n_rows(), 4);
        assert_ne!(fresh.fingerprint, old_fingerprint);
        assert_eq!(model.n_samples(), 4);
        assert_eq!(session.stats().loads, 2);
        assert_eq!(session.stats().trainings, 2);
    }

    #[tokio::test]
    async fn test_refresh_retrains_even_for_same_bytes() {
        let file = fixture_file(FIXTURE);
        let session = Session::new(file_config(&file));
        let (_, before) = session.model().await.expect("load and train");
        session.refresh().await;
        let (_, after) = session.model().await.expect("reload and retrain");
        assert_eq!(session.stats().loads, 2);
        assert_eq!(session.stats().trainings, 2);
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(before.feature_names(), after.feature_names());
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let file = fixture_file("RM,MEDV\n6,abc\n");
        let session = Session::new(file_config(&file));
        assert!(session.data().await.is_err());

        std::fs::write(file.path(), FIXTURE).expect("rewrite");
        session.data().await.expect("second attempt loads");
        assert_eq!(session.stats().loads, 1);
    }

    #[tokio::test]
    async fn test_training_failure_keeps_data() {
        let file = fixture_file("RM,MEDV\n6,20\n7,25\n");
        let session = Session::new(file_config(&file));
        let err = session.model().await.unwrap_err();
        assert!(matches!(err, DashboardError::MissingColumn { .. }));
        session.data().await.expect("table is still cached");
        assert_eq!(session.stats().loads, 1);
    }

    #[tokio::test]
    async fn test_store_reuses_known_id() {
        let file = fixture_file(FIXTURE);
        let store = SessionStore::new(file_config(&file));
        let (id, first) = store.get_or_create(None).await;
        assert_eq!(id.len(), 16);
        let (same_id, second) = store.get_or_create(Some(&id)).await;
        assert_eq!(id, same_id);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_store_unknown_id_starts_new_session() {
        let file = fixture_file(FIXTURE);
        let store = SessionStore::new(file_config(&file));
        let (id, _) = store.get_or_create(Some("not-a-session")).await;
        assert_ne!(id, "not-a-session");
        assert!(!store.is_empty().await);
    }

    #[tokio::test]
    async fn test_store_evicts_least_recently_used() {
        let file = fixture_file(FIXTURE);
        let store = SessionStore::new(file_config(&file));
        let (a, _) = store.get_or_create(None).await;
        let (b, _) = store.get_or_create(None).await;
        // Touch a so b becomes the oldest
        let _ = store.get_or_create(Some(&a)).await;
        let (_c, _) = store.get_or_create(None).await;

        assert_eq!(store.len().await, 2);
        let (a_again, _) = store.get_or_create(Some(&a)).await;
        assert_eq!(a_again, a);
        let (b_again, _) = store.get_or_create(Some(&b)).await;
        assert_ne!(b_again, b);
    }

    #[tokio::test]
    async fn test_existing_never_starts_a_session() {
        let file = fixture_file(FIXTURE);
        let store = SessionStore::new(file_config(&file));
        assert!(store.existing(None).await.is_none());
        assert!(store.existing(Some("not-a-session")).await.is_none());
        assert!(store.is_empty().await);

        let (id, session) = store.get_or_create(None).await;
        let found = store.existing(Some(&id)).await.expect("live session");
        assert!(Arc::ptr_eq(&session, &found));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_existing_lookup_refreshes_eviction_order() {
        let file = fixture_file(FIXTURE);
        let store = SessionStore::new(file_config(&file));
        let (a, _) = store.get_or_create(None).await;
        let (b, _) = store.get_or_create(None).await;
        let _ = store.existing(Some(&a)).await;
        let _ = store.get_or_create(None).await;

        assert!(store.existing(Some(&a)).await.is_some());
        assert!(store.existing(Some(&b)).await.is_none());
    }

    #[tokio::test]
    async fn test_shared_session_is_stable_and_outside_the_bound() {
        let file = fixture_file(FIXTURE);
        let store = SessionStore::new(file_config(&file));
        let first = store.shared();
        first.data().await.expect("load");
        let second = store.shared();
        second.data().await.expect("cached");

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.stats().loads, 1);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let file = fixture_file(FIXTURE);
        let store = SessionStore::new(file_config(&file));
        let (_, one) = store.get_or_create(None).await;
        let (_, two) = store.get_or_create(None).await;
        one.data().await.expect("load");
        assert_eq!(one.stats().loads, 1);
        assert_eq!(two.stats().loads, 0);
    }
}
