//! Fixed-period sample timer and its coalescing wakeup slot.
//!
//! The slot has capacity one and `notify` never blocks: a tick arriving
//! while the previous one is still pending is absorbed, not queued. Under
//! overload the control task therefore skips samples instead of building a
//! backlog. This is a correctness property of the loop and must not be
//! upgraded to a queue.

use crossbeam_channel as xch;
use plantbench_traits::Clock;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Producer half of the wakeup slot.
#[derive(Debug, Clone)]
pub struct TickNotifier {
    tx: xch::Sender<()>,
}

impl TickNotifier {
    /// Signal the slot. A no-op if a wakeup is already pending.
    pub fn notify(&self) {
        // Full means a tick is pending and coalesces; disconnected means the
        // consumer is gone and there is nobody left to wake.
        let _ = self.tx.try_send(());
    }
}

/// Consumer half of the wakeup slot.
#[derive(Debug)]
pub struct TickWaiter {
    rx: xch::Receiver<()>,
}

impl TickWaiter {
    /// Block until a wakeup is pending. `false` once every notifier is gone.
    pub fn wait(&self) -> bool {
        self.rx.recv().is_ok()
    }

    /// Consume a pending wakeup without blocking.
    pub fn try_wait(&self) -> bool {
        self.rx.try_recv().is_ok()
    }
}

/// Create the single-slot wakeup pair.
pub fn tick_slot() -> (TickNotifier, TickWaiter) {
    let (tx, rx) = xch::bounded(1);
    (TickNotifier { tx }, TickWaiter { rx })
}

/// Thread that notifies the slot every `period`.
///
/// The thread shuts down when the handle is dropped; the join can lag by up
/// to one period while the thread finishes its current sleep.
pub struct SampleTimer {
    shutdown: Arc<AtomicBool>,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl SampleTimer {
    pub fn spawn<C: Clock + Send + Sync + 'static>(
        clock: C,
        period: Duration,
        notifier: TickNotifier,
    ) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();

        let join_handle = std::thread::spawn(move || {
            loop {
                clock.sleep(period);
                if shutdown_clone.load(Ordering::Relaxed) {
                    break;
                }
                notifier.notify();
            }
            tracing::trace!("sample timer exiting");
        });

        Self {
            shutdown,
            join_handle: Some(join_handle),
        }
    }
}

impl Drop for SampleTimer {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.join_handle.take()
            && let Err(e) = handle.join()
        {
            tracing::warn!(?e, "sample timer thread panicked during shutdown");
        }
    }
}
