
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use test_helpers::*;
use zimage_client::{
    FileHandleStore, GenerationParams, GenerationTracker, HandleStore, MemoryHandleStore,
    PollerState, TaskHandle, TrackerConfig, TrackerError,
};

fn fast_config() -> TrackerConfig {
    TrackerConfig::builder()
        .with_poll_interval(Duration::from_millis(10))
        .build()
}

fn tracker_with(
    backend: ScriptedBackend,
) -> (
    GenerationTracker<ScriptedBackend>,
    Arc<MemoryHandleStore>,
    Arc<RecordingSink>,
) {
    let registry = Arc::new(MemoryHandleStore::new());
    let sink = Arc::new(RecordingSink::default());
    let tracker = GenerationTracker::new(
        backend,
        Arc::clone(&registry) as Arc<dyn HandleStore>,
        Arc::clone(&sink) as Arc<dyn zimage_client::ProgressSink>,
        fast_config(),
    );
    (tracker, registry, sink)
}

fn params() -> GenerationParams {
    GenerationParams::builder().build().unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn test_empty_prompt_never_touches_registry_or_poller() {
    let (tracker, registry, _sink) = tracker_with(ScriptedBackend::accepting("h1", vec![]));
    tracker.set_model_loaded(true);

    let err = tracker.submit("   ", &params()).await.unwrap_err();
    assert!(matches!(err, TrackerError::EmptyPrompt));

    assert_eq!(registry.load().unwrap(), None);
    assert_eq!(tracker.poller_state(), PollerState::Idle);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_model_not_loaded_rejected_before_network() {
    let (tracker, registry, _sink) = tracker_with(ScriptedBackend::accepting("h1", vec![]));

    let err = tracker.submit("a prompt", &params()).await.unwrap_err();
    assert!(matches!(err, TrackerError::ModelNotLoaded));
    assert_eq!(registry.load().unwrap(), None);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_submission_failure_leaves_registry_untouched() {
    let (tracker, registry, _sink) = tracker_with(ScriptedBackend::rejecting("backend busy"));
    tracker.set_model_loaded(true);

    let err = tracker.submit("a prompt", &params()).await.unwrap_err();
    match err {
        TrackerError::Submission(msg) => assert_eq!(msg, "backend busy"),
        other => panic!("expected Submission error, got {:?}", other),
    }
    assert_eq!(registry.load().unwrap(), None);
    assert_eq!(tracker.poller_state(), PollerState::Idle);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_successful_run_to_completion() {
    let backend = ScriptedBackend::accepting(
        "task-1",
        vec![
            Step::Status(running(15, "initializing")),
            Step::Status(running(50, "generating: 4/9")),
            Step::Status(running(92, "saving")),
            Step::Status(completed("/gallery/out.png")),
        ],
    );
    let (tracker, registry, sink) = tracker_with(backend);
    tracker.set_model_loaded(true);

    let handle = tracker.submit("a cat", &params()).await.unwrap();
    assert_eq!(handle, TaskHandle::new("task-1"));

    // Until a terminal snapshot is observed, every read returns the handle.
    assert_eq!(registry.load().unwrap(), Some(handle.clone()));
    assert!(tracker.is_tracking().unwrap());

    wait_for("completion event", || {
        sink.events().contains(&Emitted::Completed("/gallery/out.png".into()))
    })
    .await;

    wait_for("registry cleared", || registry.load().unwrap().is_none()).await;
    assert!(!tracker.is_tracking().unwrap());
    assert_eq!(tracker.poller_state(), PollerState::Completed);

    // Exactly one terminal notification, after some progress.
    assert_eq!(sink.terminal_count(), 1);
    assert!(sink
        .events()
        .iter()
        .any(|e| matches!(e, Emitted::Progress(_, _))));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_failed_task_surfaces_message_once_and_clears_registry() {
    let backend = ScriptedBackend::accepting(
        "task-oom",
        vec![
            Step::Status(running(30, "generating: 2/9")),
            Step::Status(failed("out of memory")),
        ],
    );
    let (tracker, registry, sink) = tracker_with(backend);
    tracker.set_model_loaded(true);

    tracker.submit("a huge render", &params()).await.unwrap();

    wait_for("failure event", || {
        sink.events().contains(&Emitted::Failed("out of memory".into()))
    })
    .await;

    assert_eq!(registry.load().unwrap(), None);
    assert_eq!(tracker.poller_state(), PollerState::Failed);
    assert_eq!(sink.terminal_count(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_transport_error_is_terminal_by_policy() {
    let backend = ScriptedBackend::accepting(
        "task-2",
        vec![Step::Status(running(10, "preparing")), Step::Transport],
    );
    let (tracker, registry, sink) = tracker_with(backend);
    tracker.set_model_loaded(true);

    tracker.submit("a prompt", &params()).await.unwrap();

    wait_for("generic failure", || {
        sink.events()
            .iter()
            .any(|e| matches!(e, Emitted::Failed(_)))
    })
    .await;

    // Fail-fast: registry cleared, no retry, one notification.
    assert_eq!(registry.load().unwrap(), None);
    assert_eq!(tracker.poller_state(), PollerState::Errored);
    assert_eq!(sink.terminal_count(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_reattach_polls_without_submission() {
    let backend = ScriptedBackend::accepting(
        "unused",
        vec![
            Step::Status(running(70, "generating: 6/9")),
            Step::Status(completed("/gallery/resumed.png")),
        ],
    );
    let submits = backend.submit_counter();
    let registry = Arc::new(MemoryHandleStore::new());
    registry.save(&TaskHandle::new("task-from-last-page")).unwrap();

    let sink = Arc::new(RecordingSink::default());
    let tracker = GenerationTracker::new(
        backend,
        Arc::clone(&registry) as Arc<dyn HandleStore>,
        Arc::clone(&sink) as Arc<dyn zimage_client::ProgressSink>,
        fast_config(),
    );

    let resumed = tracker.reattach().unwrap();
    assert_eq!(resumed, Some(TaskHandle::new("task-from-last-page")));

    wait_for("resumed completion", || {
        sink.events()
            .contains(&Emitted::Completed("/gallery/resumed.png".into()))
    })
    .await;

    assert_eq!(registry.load().unwrap(), None);
    // Re-attach polls the existing handle and never re-submits the job.
    assert_eq!(submits.load(Ordering::Relaxed), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_reattach_with_empty_registry_is_noop() {
    let (tracker, _registry, sink) = tracker_with(ScriptedBackend::accepting("h", vec![]));
    assert_eq!(tracker.reattach().unwrap(), None);
    assert_eq!(tracker.poller_state(), PollerState::Idle);
    assert!(sink.events().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_background_completion_emits_deferred_notice() {
    let backend =
        ScriptedBackend::accepting("task-bg", vec![Step::Status(completed("/gallery/bg.png"))]);
    let (tracker, _registry, sink) = tracker_with(backend);
    tracker.set_model_loaded(true);
    tracker.set_surface_live(false);

    tracker.submit("a prompt", &params()).await.unwrap();

    wait_for("deferred notice", || {
        sink.events()
            .iter()
            .any(|e| matches!(e, Emitted::Deferred(true, _)))
    })
    .await;

    // No direct rendering happened without a live surface.
    assert!(!sink
        .events()
        .iter()
        .any(|e| matches!(e, Emitted::Completed(_) | Emitted::Progress(_, _))));
    assert_eq!(sink.terminal_count(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_stop_is_client_local_and_keeps_registry() {
    let backend = ScriptedBackend::accepting(
        "task-long",
        vec![Step::Status(running(20, "generating: 1/9"))],
    );
    let (tracker, registry, _sink) = tracker_with(backend);
    tracker.set_model_loaded(true);

    let handle = tracker.submit("a prompt", &params()).await.unwrap();
    tracker.stop();

    wait_for("poller idle", || tracker.poller_state() == PollerState::Idle).await;

    // Observation stopped, but the task stays registered for re-attach.
    assert_eq!(registry.load().unwrap(), Some(handle));
    assert!(tracker.is_tracking().unwrap());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_form_snapshot_written_on_attempt() {
    let (tracker, _registry, _sink) = tracker_with(ScriptedBackend::rejecting("down"));
    tracker.set_model_loaded(true);

    let p = GenerationParams::builder().steps(20).build().unwrap();
    let _ = tracker.submit("draft prompt", &p).await;

    // Even a failed attempt leaves the form restorable.
    let form = tracker.restore_form().unwrap();
    assert_eq!(form.prompt, "draft prompt");
    assert_eq!(form.params.steps, 20);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_second_submission_replaces_tracking() {
    let backend = ScriptedBackend::accepting(
        "task-new",
        vec![Step::Status(running(5, "preparing"))],
    );
    let registry = Arc::new(MemoryHandleStore::new());
    registry.save(&TaskHandle::new("task-old")).unwrap();

    let sink = Arc::new(RecordingSink::default());
    let tracker = GenerationTracker::new(
        backend,
        Arc::clone(&registry) as Arc<dyn HandleStore>,
        Arc::clone(&sink) as Arc<dyn zimage_client::ProgressSink>,
        fast_config(),
    );
    tracker.set_model_loaded(true);

    let handle = tracker.submit("another prompt", &params()).await.unwrap();
    assert_eq!(handle, TaskHandle::new("task-new"));
    // Last write wins; the old task is no longer trackable from here.
    assert_eq!(registry.load().unwrap(), Some(TaskHandle::new("task-new")));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_file_registry_reattach_across_instances() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("current_task.json");

    // First "page" saves a handle and goes away without clearing.
    FileHandleStore::new(&path)
        .save(&TaskHandle::new("task-durable"))
        .unwrap();

    let backend = ScriptedBackend::accepting(
        "unused",
        vec![Step::Status(completed("/gallery/durable.png"))],
    );
    let submits = backend.submit_counter();
    let sink = Arc::new(RecordingSink::default());
    let tracker = GenerationTracker::new(
        backend,
        Arc::new(FileHandleStore::new(&path)),
        Arc::clone(&sink) as Arc<dyn zimage_client::ProgressSink>,
        fast_config(),
    );

    assert_eq!(
        tracker.reattach().unwrap(),
        Some(TaskHandle::new("task-durable"))
    );

    wait_for("durable completion", || {
        sink.events()
            .contains(&Emitted::Completed("/gallery/durable.png".into()))
    })
    .await;

    assert_eq!(FileHandleStore::new(&path).load().unwrap(), None);
    assert_eq!(submits.load(Ordering::Relaxed), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_estimate_reference_configuration() {
    let (tracker, _registry, _sink) = tracker_with(ScriptedBackend::accepting("h", vec![]));
    let p = GenerationParams::builder()
        .size(1024, 1024)
        .steps(9)
        .build()
        .unwrap();
    assert_eq!(tracker.estimate(&p), TrackerConfig::default().estimator.base());
}
