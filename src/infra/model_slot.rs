// ============================================================
// Layer 6 — Model Slot (background loading)
// ============================================================
// The model is loaded once on a background thread so the server
// can accept connections immediately. The slot is a small state
// machine behind a mutex + condvar:
//
//   NotStarted ──spawn_loader──▶ Loading ──ok──▶ Ready
//                                   │
//                                   └──err/panic──▶ Failed
//
// Requests call `wait_ready(timeout)`: they block until the
// state leaves Loading or the timeout expires, and get a clear
// "timed out" vs "failed to load" distinction.

use std::{
    panic::{catch_unwind, AssertUnwindSafe},
    sync::Arc,
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use anyhow::Result;
use parking_lot::{Condvar, Mutex};
use thiserror::Error;

/// Default bound on how long a request waits for the model.
pub const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelStateError {
    #[error("Model loading timed out")]
    TimedOut,
    #[error("Model failed to load: {0}")]
    LoadFailed(String),
}

enum SlotState<T> {
    NotStarted,
    Loading,
    Ready(Arc<T>),
    Failed(String),
}

/// Snapshot reported by the health endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelStatus {
    pub loaded:  bool,
    pub loading: bool,
    pub error:   Option<String>,
}

pub struct ModelSlot<T> {
    state: Mutex<SlotState<T>>,
    ready: Condvar,
}

impl<T: Send + Sync + 'static> ModelSlot<T> {
    pub fn new() -> Self {
        Self { state: Mutex::new(SlotState::NotStarted), ready: Condvar::new() }
    }

    /// NotStarted → Loading. Returns false if loading already began.
    pub fn begin_loading(&self) -> bool {
        let mut state = self.state.lock();
        match *state {
            SlotState::NotStarted => {
                *state = SlotState::Loading;
                true
            }
            _ => false,
        }
    }

    /// Loading → Ready / Failed, waking every waiter.
    pub fn finish(&self, result: Result<T>) {
        let next = match result {
            Ok(value) => {
                tracing::info!("Model ready");
                SlotState::Ready(Arc::new(value))
            }
            Err(e) => {
                tracing::error!("Model failed to load: {e:#}");
                SlotState::Failed(format!("{e:#}"))
            }
        };
        *self.state.lock() = next;
        self.ready.notify_all();
    }

    /// Run `load` on a dedicated thread. A panic inside `load` is
    /// recorded as a load failure.
    pub fn spawn_loader<F>(self: &Arc<Self>, load: F) -> Result<Option<JoinHandle<()>>>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        if !self.begin_loading() {
            tracing::warn!("Model loading already started");
            return Ok(None);
        }

        let slot = Arc::clone(self);
        let handle = thread::Builder::new()
            .name("model-loader".to_string())
            .spawn(move || {
                tracing::info!("Loading model in background");
                let result = catch_unwind(AssertUnwindSafe(load))
                    .unwrap_or_else(|_| Err(anyhow::anyhow!("model loader panicked")));
                slot.finish(result);
            })?;
        Ok(Some(handle))
    }

    /// Block until the model is ready, loading failed, or `timeout`
    /// elapses.
    pub fn wait_ready(&self, timeout: Duration) -> Result<Arc<T>, ModelStateError> {
        let deadline  = Instant::now() + timeout;
        let mut state = self.state.lock();
        loop {
            match &*state {
                SlotState::Ready(model) => return Ok(Arc::clone(model)),
                SlotState::Failed(e)    => return Err(ModelStateError::LoadFailed(e.clone())),
                SlotState::NotStarted | SlotState::Loading => {}
            }
            if self.ready.wait_until(&mut state, deadline).timed_out() {
                return match &*state {
                    SlotState::Ready(model) => Ok(Arc::clone(model)),
                    SlotState::Failed(e)    => Err(ModelStateError::LoadFailed(e.clone())),
                    _                       => Err(ModelStateError::TimedOut),
                };
            }
        }
    }

    pub fn status(&self) -> ModelStatus {
        match &*self.state.lock() {
            SlotState::NotStarted => ModelStatus { loaded: false, loading: false, error: None },
            SlotState::Loading    => ModelStatus { loaded: false, loading: true,  error: None },
            SlotState::Ready(_)   => ModelStatus { loaded: true,  loading: false, error: None },
            SlotState::Failed(e)  => ModelStatus { loaded: false, loading: false, error: Some(e.clone()) },
        }
    }
}

impl<T: Send + Sync + 'static> Default for ModelSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}
