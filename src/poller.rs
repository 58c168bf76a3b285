use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::error::Result;
use crate::events::ProgressSink;
use crate::reconciler::{Reconciler, ViewContext};
use crate::registry::HandleStore;
use crate::types::{GenerationStatus, StatusSnapshot, TaskHandle};
use crate::GenerationBackend;

/// Lifecycle of a poller: `Idle → Polling → {Completed, Failed, Errored} → Idle`.
///
/// A spawned poller starts in `Polling`. The closing edge back to `Idle` is
/// deliberately deferred: a terminal state records how the last cycle ended
/// and stays readable by the host until the next poller replaces this one or
/// an explicit [`Poller::stop`] returns the state to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Idle,
    Polling,
    Completed,
    Failed,
    Errored,
}

/// Timer-driven status poller for one task handle.
///
/// Every tick of a fixed-interval timer issues one status fetch, tagged with
/// a monotonically increasing sequence number. Ticks are interval-driven, not
/// completion-driven: a slow fetch does not delay the next tick, so multiple
/// fetches for the same handle can be in flight at once. The reconciler drops
/// whatever arrives out of order.
///
/// One transport error ends polling: the timer stops, the registry is
/// cleared, and a generic failure is surfaced. There is no retry or backoff.
///
/// Stopping a poller only stops this client's observation; there is no
/// operation to cancel the server-side job.
pub struct Poller {
    stop: Arc<AtomicBool>,
    state: Arc<Mutex<PollerState>>,
}

impl Poller {
    /// Spawn a polling loop for `handle` on the current tokio runtime.
    pub fn spawn<B>(
        backend: Arc<B>,
        registry: Arc<dyn HandleStore>,
        sink: Arc<dyn ProgressSink>,
        surface_live: Arc<AtomicBool>,
        handle: TaskHandle,
        interval: Duration,
    ) -> Self
    where
        B: GenerationBackend + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let state = Arc::new(Mutex::new(PollerState::Polling));

        let reconciler = Reconciler::new(handle.clone(), sink);
        tokio::spawn(run_loop(
            backend,
            registry,
            reconciler,
            surface_live,
            handle,
            interval,
            Arc::clone(&stop),
            Arc::clone(&state),
        ));

        Self { stop, state }
    }

    /// Current state. `Polling` while the loop runs, a terminal value after
    /// the task ended, `Idle` after an explicit stop.
    pub fn state(&self) -> PollerState {
        match self.state.lock() {
            Ok(state) => *state,
            Err(e) => *e.into_inner(),
        }
    }

    /// Stop observing. The loop exits on its next tick or response; the
    /// server-side job is unaffected and the registry entry is kept so a
    /// later page can re-attach.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

fn set_state(state: &Mutex<PollerState>, next: PollerState) {
    match state.lock() {
        Ok(mut s) => *s = next,
        Err(e) => *e.into_inner() = next,
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_loop<B>(
    backend: Arc<B>,
    registry: Arc<dyn HandleStore>,
    mut reconciler: Reconciler,
    surface_live: Arc<AtomicBool>,
    handle: TaskHandle,
    interval: Duration,
    stop: Arc<AtomicBool>,
    state: Arc<Mutex<PollerState>>,
) where
    B: GenerationBackend + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<(u64, Result<StatusSnapshot>)>();
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut seq: u64 = 0;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if stop.load(Ordering::Relaxed) {
                    set_state(&state, PollerState::Idle);
                    return;
                }
                seq += 1;
                let backend = Arc::clone(&backend);
                let handle = handle.clone();
                let tx = tx.clone();
                // Fetches run detached so a slow response never delays the
                // next tick; overlap is resolved by sequence number.
                tokio::spawn(async move {
                    let result = backend.fetch_status(&handle).await;
                    let _ = tx.send((seq, result));
                });
            }
            Some((resp_seq, result)) = rx.recv() => {
                if stop.load(Ordering::Relaxed) {
                    set_state(&state, PollerState::Idle);
                    return;
                }
                if reconciler.is_stale(resp_seq) {
                    continue;
                }

                let ctx = if surface_live.load(Ordering::Relaxed) {
                    ViewContext::live()
                } else {
                    ViewContext::background()
                };

                match result {
                    Ok(snapshot) if !snapshot.status.is_terminal() => {
                        reconciler.reconcile(resp_seq, &snapshot, &ctx);
                    }
                    Ok(snapshot) => {
                        // Leave Polling and clear the registry strictly before
                        // the terminal notification, so a duplicate late tick
                        // can never re-enter this branch.
                        let next = if snapshot.status == GenerationStatus::Completed {
                            PollerState::Completed
                        } else {
                            PollerState::Failed
                        };
                        set_state(&state, next);
                        if let Err(e) = registry.clear() {
                            eprintln!(
                                "[zimage-client] Failed to clear task registry for {}: {}",
                                handle, e
                            );
                        }
                        reconciler.reconcile(resp_seq, &snapshot, &ctx);
                        return;
                    }
                    Err(e) => {
                        // Fail-fast on transport errors: no retry, no backoff.
                        eprintln!(
                            "[zimage-client] Status poll for task {} failed: {}",
                            handle, e
                        );
                        set_state(&state, PollerState::Errored);
                        if let Err(e) = registry.clear() {
                            eprintln!(
                                "[zimage-client] Failed to clear task registry for {}: {}",
                                handle, e
                            );
                        }
                        reconciler.report_transport_failure(&ctx);
                        return;
                    }
                }
            }
        }
    }
}
