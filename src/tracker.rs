use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::TrackerConfig;
use crate::error::{Result, TrackerError};
use crate::events::ProgressSink;
use crate::form::{FormSnapshot, SessionFormCache};
use crate::poller::{Poller, PollerState};
use crate::registry::HandleStore;
use crate::types::{GenerationParams, TaskHandle};
use crate::GenerationBackend;

/// View-model tying submission, registry, poller, and reconciliation together.
///
/// Constructed with injected dependencies (backend, registry, event sink)
/// rather than looked up globally; hosts keep one instance per view and pass
/// it by reference.
///
/// The registry is the single source of truth for "is a task in flight":
/// [`is_tracking`](Self::is_tracking) reads it alone, and a freshly loaded
/// page calls [`reattach`](Self::reattach) to resume polling a still-running
/// job without re-submitting.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use zimage_client::{
///     FileHandleStore, GenerationParams, GenerationTracker, TrackerConfig, ZImageClient,
/// };
/// # use zimage_client::{ProgressSink, ProgressEvent, CompletedEvent, FailedEvent, DeferredNoticeEvent};
/// # struct Ui;
/// # impl ProgressSink for Ui {
/// #     fn on_progress(&self, _: ProgressEvent) {}
/// #     fn on_completed(&self, _: CompletedEvent) {}
/// #     fn on_failed(&self, _: FailedEvent) {}
/// #     fn on_deferred(&self, _: DeferredNoticeEvent) {}
/// # }
///
/// # async fn example() -> zimage_client::Result<()> {
/// let tracker = GenerationTracker::new(
///     ZImageClient::new("http://127.0.0.1:5000"),
///     Arc::new(FileHandleStore::new("current_task.json")),
///     Arc::new(Ui),
///     TrackerConfig::default(),
/// );
///
/// // Resume a task left over from a previous page, if any.
/// if tracker.reattach()?.is_none() {
///     tracker.set_model_loaded(true);
///     let params = GenerationParams::builder().build()?;
///     tracker.submit("a lighthouse at dusk", &params).await?;
/// }
/// # Ok(())
/// # }
/// ```
pub struct GenerationTracker<B>
where
    B: GenerationBackend + 'static,
{
    backend: Arc<B>,
    registry: Arc<dyn HandleStore>,
    sink: Arc<dyn ProgressSink>,
    config: TrackerConfig,
    model_loaded: AtomicBool,
    surface_live: Arc<AtomicBool>,
    forms: SessionFormCache,
    poller: Mutex<Option<Poller>>,
}

impl<B> GenerationTracker<B>
where
    B: GenerationBackend + 'static,
{
    /// Create a tracker with injected dependencies.
    pub fn new(
        backend: B,
        registry: Arc<dyn HandleStore>,
        sink: Arc<dyn ProgressSink>,
        config: TrackerConfig,
    ) -> Self {
        Self {
            backend: Arc::new(backend),
            registry,
            sink,
            config,
            model_loaded: AtomicBool::new(false),
            surface_live: Arc::new(AtomicBool::new(true)),
            forms: SessionFormCache::new(),
            poller: Mutex::new(None),
        }
    }

    /// Record whether the service currently has a model loaded. Submission
    /// is rejected client-side while this is false.
    pub fn set_model_loaded(&self, loaded: bool) {
        self.model_loaded.store(loaded, Ordering::Relaxed);
    }

    pub fn model_loaded(&self) -> bool {
        self.model_loaded.load(Ordering::Relaxed)
    }

    /// Record whether the active view has a live progress surface. Affects
    /// how terminal outcomes are delivered (in place vs. deferred notice).
    pub fn set_surface_live(&self, live: bool) {
        self.surface_live.store(live, Ordering::Relaxed);
    }

    /// Expected duration for a request with these parameters. Display only;
    /// never used as a deadline.
    pub fn estimate(&self, params: &GenerationParams) -> Duration {
        self.config.estimator.estimate(
            params.width,
            params.height,
            params.steps,
            params.optimization_mode,
        )
    }

    /// Submit a generation job and begin tracking it.
    ///
    /// The prompt and model-loaded preconditions are checked before any
    /// network call; on any failure the registry is untouched and no poller
    /// exists. On success the handle is persisted and a poller started as a
    /// single step; there is no window where one exists without the other.
    ///
    /// Submitting while another task is tracked replaces the old tracking
    /// (the old task keeps running server-side but becomes untrackable).
    pub async fn submit(&self, prompt: &str, params: &GenerationParams) -> Result<TaskHandle> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(TrackerError::EmptyPrompt);
        }
        if !self.model_loaded() {
            return Err(TrackerError::ModelNotLoaded);
        }

        // Captured on every attempt so a reload restores what was typed,
        // whether or not the submission goes through.
        self.forms.save(FormSnapshot::capture(prompt, params));

        let handle = self.backend.submit(prompt, params).await?;

        self.registry.save(&handle)?;
        self.start_poller(handle.clone());
        Ok(handle)
    }

    /// Resume tracking of a previously submitted task after a reload.
    ///
    /// Reads the registry and, if a handle is present, starts polling it
    /// directly; no submission call is made. Returns the handle being
    /// tracked, or `None` when nothing is in flight.
    ///
    /// Must be called from within a tokio runtime.
    pub fn reattach(&self) -> Result<Option<TaskHandle>> {
        let Some(handle) = self.registry.load()? else {
            return Ok(None);
        };
        eprintln!("[zimage-client] Re-attaching to in-flight task {}", handle);
        self.start_poller(handle.clone());
        Ok(Some(handle))
    }

    /// Stop observing the current task. Client-local only: the server-side
    /// job runs on, and the registry entry is kept so a later page can
    /// re-attach.
    pub fn stop(&self) {
        if let Ok(poller) = self.poller.lock() {
            if let Some(p) = poller.as_ref() {
                p.stop();
            }
        }
    }

    /// Whether a task is in flight, judged by the registry alone.
    pub fn is_tracking(&self) -> Result<bool> {
        Ok(self.registry.load()?.is_some())
    }

    /// State of the current poller, `Idle` when none has been started.
    pub fn poller_state(&self) -> PollerState {
        match self.poller.lock() {
            Ok(poller) => poller.as_ref().map(|p| p.state()).unwrap_or(PollerState::Idle),
            Err(_) => PollerState::Idle,
        }
    }

    /// The last form snapshot written by a submission attempt, if any.
    pub fn restore_form(&self) -> Option<FormSnapshot> {
        self.forms.load()
    }

    fn start_poller(&self, handle: TaskHandle) {
        match self.poller.lock() {
            Ok(mut poller) => {
                // Single-task design: a replaced poller is torn down first.
                if let Some(old) = poller.take() {
                    old.stop();
                }
                *poller = Some(Poller::spawn(
                    Arc::clone(&self.backend),
                    Arc::clone(&self.registry),
                    Arc::clone(&self.sink),
                    Arc::clone(&self.surface_live),
                    handle,
                    self.config.poll_interval,
                ));
            }
            Err(e) => {
                eprintln!("[zimage-client] WARNING: poller mutex poisoned: {}", e);
            }
        }
    }
}
