//! Shared, observable session state.
//!
//! Wraps the pure [`Session`] reducers in a mutex and publishes a snapshot
//! through a watch channel after every mutation, so collaborators (the
//! progress driver, view glue) can react to transitions without polling.
//!
//! The store also carries a channel epoch for the streaming controller:
//! opening or closing a channel bumps the epoch, and frame-driven
//! mutations are applied only when their epoch is still current. A frame
//! that raced with supersession or disconnect therefore mutates nothing.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;

use sitequiz_core::model::Session;

struct Inner {
    session: Session,
    epoch: u64,
}

#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Mutex<Inner>>,
    tx: watch::Sender<Session>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    #[must_use]
    pub fn new() -> Self {
        let session = Session::new();
        let (tx, _rx) = watch::channel(session.clone());
        Self {
            inner: Arc::new(Mutex::new(Inner { session, epoch: 0 })),
            tx,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Reducers are total and never panic, so a poisoned lock still
        // holds a consistent session.
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn mutate(&self, f: impl FnOnce(&mut Session)) {
        let snapshot = {
            let mut guard = self.lock();
            f(&mut guard.session);
            guard.session.clone()
        };
        self.tx.send_replace(snapshot);
    }

    /// Current session state, cloned.
    #[must_use]
    pub fn snapshot(&self) -> Session {
        self.lock().session.clone()
    }

    /// Subscribe to session snapshots published after each mutation.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.tx.subscribe()
    }

    /// Reset derived state and record the new URL. Runs synchronously, so
    /// callers can guarantee the reset lands before any network effect.
    pub fn start_session(&self, url: impl Into<String>) {
        let url = url.into();
        self.mutate(|s| s.start_session(url));
    }

    pub fn set_session_id(&self, id: impl Into<String>) {
        let id = id.into();
        self.mutate(|s| s.set_session_id(id));
    }

    pub fn set_links(&self, links: Vec<String>) {
        self.mutate(|s| s.set_links(links));
    }

    pub fn upsert_answer(&self, question_index: usize, answer: impl Into<String>) {
        let answer = answer.into();
        self.mutate(|s| s.upsert_answer(question_index, answer));
    }

    /// Open a streaming channel: bumps the epoch (invalidating any prior
    /// channel) and raises the generating flag in the same transition.
    /// Returns the new epoch for use with [`SessionStore::apply_if_open`].
    pub(crate) fn open_channel(&self) -> u64 {
        let (snapshot, epoch) = {
            let mut guard = self.lock();
            guard.epoch += 1;
            guard.session.set_generating(true);
            (guard.session.clone(), guard.epoch)
        };
        self.tx.send_replace(snapshot);
        epoch
    }

    /// Invalidate the current channel epoch without touching session
    /// state. Idempotent; safe when no channel is open.
    pub(crate) fn close_channel(&self) {
        self.lock().epoch += 1;
    }

    /// Close the channel only if `epoch` is still current.
    ///
    /// Used by the channel task's own exit path: a task whose channel has
    /// already been superseded must not invalidate its successor's epoch.
    pub(crate) fn close_channel_if(&self, epoch: u64) {
        let mut guard = self.lock();
        if guard.epoch == epoch {
            guard.epoch += 1;
        }
    }

    /// Apply a frame-driven mutation only if `epoch` is still the current
    /// channel. Returns whether the mutation was applied.
    pub(crate) fn apply_if_open(&self, epoch: u64, f: impl FnOnce(&mut Session)) -> bool {
        let snapshot = {
            let mut guard = self.lock();
            if guard.epoch != epoch {
                return false;
            }
            f(&mut guard.session);
            guard.session.clone()
        };
        self.tx.send_replace(snapshot);
        true
    }
}
