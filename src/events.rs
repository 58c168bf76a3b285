use serde::{Deserialize, Serialize};

use crate::types::{GenerationResult, TaskHandle};

/// Emitted on each applied (non-stale) progress update.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub handle: TaskHandle,
    /// Percentage in 0..=100.
    pub percent: u8,
    /// Server-provided stage description.
    pub stage: String,
}

/// Emitted exactly once when a task completes on a live progress surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedEvent {
    pub handle: TaskHandle,
    pub result: GenerationResult,
    pub message: Option<String>,
}

/// Emitted exactly once when a task fails (server-reported or transport).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedEvent {
    pub handle: TaskHandle,
    /// Server failure message verbatim, or a generic transport-error text.
    pub message: String,
}

/// Emitted instead of [`CompletedEvent`]/[`FailedEvent`] when the active view
/// has no live progress surface. Directs the user back to the originating view.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeferredNoticeEvent {
    pub handle: TaskHandle,
    pub succeeded: bool,
    pub message: String,
}

/// Receiver for UI side effects produced by the reconciler.
///
/// Implementations render into whatever surface the host application
/// provides. The reconciler guarantees the
/// terminal callbacks fire at most once per handle and never assumes a
/// surface it has not been told is live.
pub trait ProgressSink: Send + Sync {
    /// Non-terminal update on a live surface.
    fn on_progress(&self, event: ProgressEvent);

    /// Terminal success on a live surface: render the artifact and unlock
    /// the action affordances.
    fn on_completed(&self, event: CompletedEvent);

    /// Terminal failure on a live surface: render the message.
    fn on_failed(&self, event: FailedEvent);

    /// Terminal outcome observed while no surface is live.
    fn on_deferred(&self, event: DeferredNoticeEvent);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = ProgressEvent {
            handle: TaskHandle::new("t-1"),
            percent: 42,
            stage: "generating: 4/9".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"handle\":\"t-1\""));
        assert!(json.contains("\"percent\":42"));
    }

    #[test]
    fn test_deferred_notice_serialization() {
        let event = DeferredNoticeEvent {
            handle: TaskHandle::new("t-2"),
            succeeded: true,
            message: "Generation finished. Return to the generator view".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"succeeded\":true"));
    }
}
