use std::sync::Arc;

use crate::events::{
    CompletedEvent, DeferredNoticeEvent, FailedEvent, ProgressEvent, ProgressSink,
};
use crate::types::{GenerationStatus, StatusSnapshot, TaskHandle};

/// Whether the currently active view has a live progress surface.
///
/// When the surface is live, updates render in place. When it is not (the
/// task was started elsewhere, or the page has since navigated), terminal
/// outcomes become deferred notices instead; the reconciler never mutates
/// a surface it has not been told exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewContext {
    pub live_surface: bool,
}

impl ViewContext {
    pub fn live() -> Self {
        Self { live_surface: true }
    }

    pub fn background() -> Self {
        Self {
            live_surface: false,
        }
    }
}

/// What the reconciler did with a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Dropped: older than the last applied response, or the terminal
    /// notification has already fired for this handle.
    Stale,
    /// Applied a non-terminal update.
    Progress,
    /// Applied a terminal snapshot and fired the terminal notification.
    Terminal,
}

const DEFERRED_SUCCESS_TEXT: &str =
    "Generation finished. Return to the generator view to see the result";
const DEFERRED_FAILURE_TEXT: &str =
    "Generation failed. Return to the generator view for details";
const TRANSPORT_FAILURE_TEXT: &str = "Lost contact with the generation service";
const MISSING_RESULT_TEXT: &str = "Generation completed but no artifact was returned";

/// Maps status snapshots onto UI side effects for one task handle.
///
/// Each polled response carries the sequence number of the request that
/// produced it. Responses may arrive out of order; the reconciler applies
/// only responses at least as new as the last applied one, so a stale late
/// arrival can never overwrite fresher state. The terminal branch fires at
/// most once per handle regardless of how many times it is invoked.
pub struct Reconciler {
    handle: TaskHandle,
    sink: Arc<dyn ProgressSink>,
    last_applied_seq: Option<u64>,
    terminal_fired: bool,
}

impl Reconciler {
    pub fn new(handle: TaskHandle, sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            handle,
            sink,
            last_applied_seq: None,
            terminal_fired: false,
        }
    }

    /// True once a terminal notification (success, failure, or transport
    /// failure) has been emitted for this handle.
    pub fn terminal_fired(&self) -> bool {
        self.terminal_fired
    }

    /// Whether a response with this sequence number would be dropped.
    pub fn is_stale(&self, seq: u64) -> bool {
        if self.terminal_fired {
            return true;
        }
        matches!(self.last_applied_seq, Some(last) if seq < last)
    }

    /// Apply one polled snapshot under the given view context.
    pub fn reconcile(
        &mut self,
        seq: u64,
        snapshot: &StatusSnapshot,
        ctx: &ViewContext,
    ) -> ReconcileOutcome {
        if self.is_stale(seq) {
            return ReconcileOutcome::Stale;
        }
        self.last_applied_seq = Some(seq);

        match snapshot.status {
            GenerationStatus::Completed => {
                self.terminal_fired = true;
                if !ctx.live_surface {
                    self.sink.on_deferred(DeferredNoticeEvent {
                        handle: self.handle.clone(),
                        succeeded: true,
                        message: DEFERRED_SUCCESS_TEXT.to_string(),
                    });
                } else if let Some(result) = &snapshot.result {
                    self.sink.on_completed(CompletedEvent {
                        handle: self.handle.clone(),
                        result: result.clone(),
                        message: snapshot.message.clone(),
                    });
                } else {
                    // Completed without a payload is unrenderable; surface it
                    // through the failure path rather than invent an artifact.
                    self.sink.on_failed(FailedEvent {
                        handle: self.handle.clone(),
                        message: MISSING_RESULT_TEXT.to_string(),
                    });
                }
                ReconcileOutcome::Terminal
            }
            GenerationStatus::Failed => {
                self.terminal_fired = true;
                let message = snapshot
                    .message
                    .clone()
                    .unwrap_or_else(|| "Generation failed".to_string());
                if ctx.live_surface {
                    self.sink.on_failed(FailedEvent {
                        handle: self.handle.clone(),
                        message,
                    });
                } else {
                    self.sink.on_deferred(DeferredNoticeEvent {
                        handle: self.handle.clone(),
                        succeeded: false,
                        message: DEFERRED_FAILURE_TEXT.to_string(),
                    });
                }
                ReconcileOutcome::Terminal
            }
            _ => {
                if ctx.live_surface {
                    self.sink.on_progress(ProgressEvent {
                        handle: self.handle.clone(),
                        percent: snapshot.progress.min(100),
                        stage: snapshot.stage.clone(),
                    });
                }
                ReconcileOutcome::Progress
            }
        }
    }

    /// Surface a generic failure after a transport error ended polling.
    /// No-op if a terminal notification already fired.
    pub fn report_transport_failure(&mut self, ctx: &ViewContext) {
        if self.terminal_fired {
            return;
        }
        self.terminal_fired = true;
        if ctx.live_surface {
            self.sink.on_failed(FailedEvent {
                handle: self.handle.clone(),
                message: TRANSPORT_FAILURE_TEXT.to_string(),
            });
        } else {
            self.sink.on_deferred(DeferredNoticeEvent {
                handle: self.handle.clone(),
                succeeded: false,
                message: DEFERRED_FAILURE_TEXT.to_string(),
            });
        }
    }
}
