//! Process-wide table of live crop sessions.
//!
//! A session is created by the crop node before it publishes its preview
//! and destroyed by the node when it stops waiting. Callback handlers look
//! sessions up by id to deliver results. Sessions whose node has gone
//! away are purged after a time-to-live on the next `create`.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use cutout_pipeline::{CropParams, ImageBatch, MaskBatch};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use web_time::Instant;

use crate::config::HostConfig;
use crate::error::SessionError;
use crate::signal::{CompletionSignal, Resolution, WaitOutcome};

/// Opaque session key, unique among live sessions.
///
/// The host assigns one per node execution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Wrap an id string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Result slots a handler fills before firing the signal.
#[derive(Debug, Default)]
pub struct SessionResult {
    /// Processed image batch.
    pub image: Option<ImageBatch>,
    /// Mask aligned with `image`.
    pub mask: Option<MaskBatch>,
}

/// One pending interaction: the node's input, its parameters, and the
/// slot the handler answers into.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    created: Instant,
    source: Arc<ImageBatch>,
    params: CropParams,
    signal: CompletionSignal<SessionResult>,
}

impl Session {
    fn new(id: SessionId, created: Instant, source: Arc<ImageBatch>, params: CropParams) -> Self {
        Self {
            id,
            created,
            source,
            params,
            signal: CompletionSignal::new(),
        }
    }

    /// The session's key.
    #[must_use]
    pub const fn id(&self) -> &SessionId {
        &self.id
    }

    /// When the session was created.
    #[must_use]
    pub const fn created(&self) -> Instant {
        self.created
    }

    /// The batch the node is waiting to crop, shared with the node.
    #[must_use]
    pub const fn source(&self) -> &Arc<ImageBatch> {
        &self.source
    }

    /// Parameters the node was run with.
    #[must_use]
    pub const fn params(&self) -> &CropParams {
        &self.params
    }

    /// The completion signal and its result slots.
    #[must_use]
    pub const fn signal(&self) -> &CompletionSignal<SessionResult> {
        &self.signal
    }
}

static GLOBAL: Lazy<Arc<SessionStore>> =
    Lazy::new(|| Arc::new(SessionStore::new(HostConfig::DEFAULT_SESSION_TTL)));

/// Concurrent map from [`SessionId`] to [`Session`].
///
/// Lookups hand out `Arc<Session>` so nobody blocks on the table while
/// waiting on a session's signal.
#[derive(Debug)]
pub struct SessionStore {
    sessions: Mutex<HashMap<SessionId, Arc<Session>>>,
    ttl: Duration,
}

impl SessionStore {
    /// Empty store purging sessions older than `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// The process-wide store, created on first use.
    #[must_use]
    pub fn global() -> Arc<Self> {
        Arc::clone(&GLOBAL)
    }

    fn table(&self) -> MutexGuard<'_, HashMap<SessionId, Arc<Session>>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new session, purging expired ones first.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::AlreadyExists`] if `id` is live; the
    /// existing session is left untouched.
    pub fn create(
        &self,
        id: SessionId,
        source: impl Into<Arc<ImageBatch>>,
        params: CropParams,
    ) -> Result<Arc<Session>, SessionError> {
        let source = source.into();
        let now = Instant::now();
        self.sweep_expired(now);

        let mut table = self.table();
        if table.contains_key(&id) {
            return Err(SessionError::AlreadyExists(id));
        }
        let session = Arc::new(Session::new(id.clone(), now, source, params));
        table.insert(id.clone(), Arc::clone(&session));
        drop(table);

        tracing::debug!(session_id = %id, "session created");
        Ok(session)
    }

    /// Look up a live session.
    #[must_use]
    pub fn get(&self, id: &SessionId) -> Option<Arc<Session>> {
        self.table().get(id).cloned()
    }

    /// Returns `true` if `id` is live.
    #[must_use]
    pub fn contains(&self, id: &SessionId) -> bool {
        self.table().contains_key(id)
    }

    /// Number of live sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table().len()
    }

    /// Returns `true` if no session is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table().is_empty()
    }

    /// Store results for a session without firing its signal.
    ///
    /// Results for a session that is gone (the node timed out or was
    /// cancelled) or already completed are dropped with a warning.
    pub fn publish_result(&self, id: &SessionId, image: ImageBatch, mask: MaskBatch) {
        let Some(session) = self.get(id) else {
            tracing::warn!(session_id = %id, "session gone; result dropped");
            return;
        };
        let stored = session.signal.publish(|slot| {
            slot.image = Some(image);
            slot.mask = Some(mask);
        });
        if !stored {
            tracing::warn!(session_id = %id, "session already completed; result dropped");
        }
    }

    /// Fire a session's signal. Later calls for the same session are
    /// ignored.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotFound`] if the session is gone.
    pub fn signal_complete(
        &self,
        id: &SessionId,
        resolution: Resolution,
    ) -> Result<(), SessionError> {
        let session = self.get(id).ok_or_else(|| {
            tracing::warn!(session_id = %id, "no such session");
            SessionError::NotFound(id.clone())
        })?;
        if session.signal.resolve(resolution) {
            tracing::debug!(
                session_id = %id,
                resolution = resolution.as_str(),
                "session completed"
            );
        } else {
            tracing::debug!(session_id = %id, "duplicate completion ignored");
        }
        Ok(())
    }

    /// Block until the session completes or `timeout` passes.
    ///
    /// A session that no longer exists reports `Completed(Expired)`.
    #[must_use]
    pub fn wait(&self, id: &SessionId, timeout: Duration) -> WaitOutcome {
        match self.get(id) {
            Some(session) => session.signal.wait(timeout),
            None => {
                tracing::warn!(session_id = %id, "waited on missing session");
                WaitOutcome::Completed(Resolution::Expired)
            }
        }
    }

    /// Remove the session and hand back whatever results it holds.
    ///
    /// Returns `(None, None)` for unknown ids.
    pub fn take_and_destroy(&self, id: &SessionId) -> (Option<ImageBatch>, Option<MaskBatch>) {
        let Some(session) = self.table().remove(id) else {
            return (None, None);
        };
        tracing::debug!(session_id = %id, "session destroyed");
        let result = session.signal.take();
        (result.image, result.mask)
    }

    /// Purge every session older than the store's ttl as of `now`.
    ///
    /// Purged sessions are resolved as [`Resolution::Expired`] so a waiter
    /// still parked on one wakes up. Returns the number purged.
    pub fn sweep_expired(&self, now: Instant) -> usize {
        let expired: Vec<Arc<Session>> = {
            let mut table = self.table();
            let stale: Vec<SessionId> = table
                .values()
                .filter(|s| now.duration_since(s.created) >= self.ttl)
                .map(|s| s.id.clone())
                .collect();
            stale.iter().filter_map(|id| table.remove(id)).collect()
        };

        for session in &expired {
            session.signal.resolve(Resolution::Expired);
            tracing::warn!(session_id = %session.id, "expired session purged");
        }
        expired.len()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(HostConfig::DEFAULT_SESSION_TTL)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::thread;

    use cutout_pipeline::{Dimensions, Frame};
    use cutout_pipeline::types::Rgb32FImage;

    use super::*;

    fn batch() -> ImageBatch {
        ImageBatch::single(Frame::Rgb(Rgb32FImage::new(4, 4)))
    }

    fn id(s: &str) -> SessionId {
        SessionId::from(s)
    }

    #[test]
    fn create_rejects_live_duplicate() {
        let store = SessionStore::default();
        store.create(id("a"), batch(), CropParams::default()).unwrap();
        assert_eq!(
            store.create(id("a"), batch(), CropParams::default()).unwrap_err(),
            SessionError::AlreadyExists(id("a"))
        );
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn publish_then_signal_then_take() {
        let store = SessionStore::default();
        store.create(id("s"), batch(), CropParams::default()).unwrap();
        store.publish_result(&id("s"), batch(), MaskBatch::ones(Dimensions::new(4, 4)));
        store.signal_complete(&id("s"), Resolution::Applied).unwrap();
        assert_eq!(
            store.wait(&id("s"), Duration::from_secs(1)),
            WaitOutcome::Completed(Resolution::Applied)
        );
        let (image, mask) = store.take_and_destroy(&id("s"));
        assert!(image.is_some() && mask.is_some());
        assert!(!store.contains(&id("s")));
    }

    #[test]
    fn take_and_destroy_twice_yields_nothing() {
        let store = SessionStore::default();
        store.create(id("t"), batch(), CropParams::default()).unwrap();
        store.take_and_destroy(&id("t"));
        let (image, mask) = store.take_and_destroy(&id("t"));
        assert!(image.is_none() && mask.is_none());
    }

    #[test]
    fn missing_session_reports_not_found() {
        let store = SessionStore::default();
        assert_eq!(
            store.signal_complete(&id("ghost"), Resolution::Cancelled),
            Err(SessionError::NotFound(id("ghost")))
        );
        assert_eq!(
            store.wait(&id("ghost"), Duration::from_secs(5)),
            WaitOutcome::Completed(Resolution::Expired)
        );
    }

    #[test]
    fn result_for_missing_session_is_dropped_quietly() {
        let store = SessionStore::default();
        store.publish_result(&id("gone"), batch(), MaskBatch::ones(Dimensions::new(4, 4)));
        assert!(store.is_empty());
    }

    #[test]
    fn session_shares_the_callers_batch() {
        let store = SessionStore::default();
        let source = Arc::new(batch());
        let session = store
            .create(id("shared"), Arc::clone(&source), CropParams::default())
            .unwrap();
        assert!(Arc::ptr_eq(session.source(), &source));
        assert_eq!(
            session.source().frames()[0].samples().as_ptr(),
            source.frames()[0].samples().as_ptr()
        );
    }

    #[test]
    fn result_after_completion_is_dropped() {
        let store = SessionStore::default();
        store.create(id("late"), batch(), CropParams::default()).unwrap();
        store.signal_complete(&id("late"), Resolution::Cancelled).unwrap();
        store.publish_result(&id("late"), batch(), MaskBatch::ones(Dimensions::new(4, 4)));
        let (image, mask) = store.take_and_destroy(&id("late"));
        assert!(image.is_none() && mask.is_none());
    }

    #[test]
    fn sweep_purges_only_stale_sessions() {
        let store = SessionStore::new(Duration::from_secs(300));
        store.create(id("old"), batch(), CropParams::default()).unwrap();
        let old = store.get(&id("old")).unwrap();
        assert_eq!(store.sweep_expired(Instant::now()), 0);
        assert_eq!(store.sweep_expired(old.created() + Duration::from_secs(301)), 1);
        assert!(store.is_empty());
        assert_eq!(old.signal().resolution(), Some(Resolution::Expired));
    }

    #[test]
    fn concurrent_create_and_destroy() {
        let store = Arc::new(SessionStore::default());
        let workers: Vec<_> = (0..8)
            .map(|t| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for n in 0..50 {
                        let sid = SessionId::new(format!("{t}-{n}"));
                        store.create(sid.clone(), batch(), CropParams::default()).unwrap();
                        assert!(store.get(&sid).is_some());
                        store.take_and_destroy(&sid);
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }
        assert!(store.is_empty());
    }
}
