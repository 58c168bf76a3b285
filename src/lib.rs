//! # zimage-client
//!
//! Async Rust client for a Z-Image generation web service: job submission,
//! durable task tracking, and polled progress reconciliation.
//!
//! The service runs generation jobs server-side and exposes only
//! request/response endpoints: nothing is pushed to the client. This crate
//! implements the client half of that protocol reliably:
//!
//! - submission returning an opaque [`TaskHandle`]
//! - a durable registry so a restart or navigation can re-attach to a
//!   still-running job
//! - a fixed-interval [`Poller`](poller::Poller) that tolerates slow,
//!   overlapping, and out-of-order status responses
//! - a [`Reconciler`](reconciler::Reconciler) guaranteeing the terminal
//!   notification (success or failure) fires exactly once per handle
//! - a pure [`DurationEstimator`] for setting user expectations
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use zimage_client::{
//!     FileHandleStore, GenerationParams, GenerationTracker, OptimizationMode,
//!     TrackerConfig, ZImageClient,
//! };
//! # use zimage_client::{ProgressSink, ProgressEvent, CompletedEvent, FailedEvent, DeferredNoticeEvent};
//! # struct Ui;
//! # impl ProgressSink for Ui {
//! #     fn on_progress(&self, e: ProgressEvent) { println!("{}% {}", e.percent, e.stage); }
//! #     fn on_completed(&self, e: CompletedEvent) { println!("done: {}", e.result.artifact_url); }
//! #     fn on_failed(&self, e: FailedEvent) { eprintln!("failed: {}", e.message); }
//! #     fn on_deferred(&self, e: DeferredNoticeEvent) { println!("{}", e.message); }
//! # }
//!
//! # async fn example() -> zimage_client::Result<()> {
//! let client = ZImageClient::new("http://127.0.0.1:5000");
//! let tracker = GenerationTracker::new(
//!     client,
//!     Arc::new(FileHandleStore::new("current_task.json")),
//!     Arc::new(Ui),
//!     TrackerConfig::default(),
//! );
//!
//! tracker.set_model_loaded(true);
//! let params = GenerationParams::builder()
//!     .size(1024, 1024)
//!     .steps(9)
//!     .optimization_mode(OptimizationMode::Basic)
//!     .build()?;
//!
//! println!("expected: {:?}", tracker.estimate(&params));
//! let handle = tracker.submit("a lighthouse at dusk", &params).await?;
//! println!("tracking {}", handle);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod estimator;
pub mod events;
pub mod form;
pub mod poller;
pub mod reconciler;
pub mod registry;
pub mod tracker;
pub mod types;

pub use client::ZImageClient;
pub use config::{TrackerConfig, TrackerConfigBuilder};
pub use error::{Result, TrackerError};
pub use estimator::DurationEstimator;
pub use events::{
    CompletedEvent, DeferredNoticeEvent, FailedEvent, ProgressEvent, ProgressSink,
};
pub use form::{FormSnapshot, SessionFormCache};
pub use poller::{Poller, PollerState};
pub use reconciler::{ReconcileOutcome, Reconciler, ViewContext};
pub use registry::{FileHandleStore, HandleStore, MemoryHandleStore};
pub use tracker::GenerationTracker;
pub use types::{
    GenerationParams, GenerationParamsBuilder, GenerationResult, GenerationStatus,
    OptimizationMode, StatusSnapshot, TaskHandle,
};

/// The two endpoints a generation service must answer for tracking to work.
///
/// [`ZImageClient`] is the HTTP implementation; tests substitute scripted
/// backends. Implementations must be cheap to share behind an `Arc`.
pub trait GenerationBackend: Send + Sync {
    /// Submit a job. Returns the server-assigned handle on success; on any
    /// failure no handle exists and nothing must be persisted.
    fn submit(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> impl std::future::Future<Output = Result<TaskHandle>> + Send;

    /// Fetch the current status snapshot for a handle.
    fn fetch_status(
        &self,
        handle: &TaskHandle,
    ) -> impl std::future::Future<Output = Result<StatusSnapshot>> + Send;
}
