//! Periodic telemetry readers.
//!
//! Each task snapshots `{sp, y}` under the lock, then formats and publishes
//! outside it, so an arbitrarily slow sink never holds up the control loop.
//! Nothing in the system depends on a telemetry task completing.

use crate::conversions::code_to_volts;
use crate::state::SharedState;
use crossbeam_channel as xch;
use plantbench_traits::{Clock, TelemetryFrame, TelemetrySink};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Independent periodic reader publishing [`TelemetryFrame`]s to one sink.
///
/// A sink reporting zero subscribers causes the whole output step to be
/// skipped for that period. The thread exits when the handle drops; the
/// join can lag by up to one period.
pub struct TelemetryTask {
    shutdown: Arc<AtomicBool>,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl TelemetryTask {
    pub fn spawn<S, C>(
        state: Arc<SharedState>,
        mut sink: S,
        period: Duration,
        clock: C,
        epoch: Instant,
    ) -> Self
    where
        S: TelemetrySink + Send + 'static,
        C: Clock + Send + Sync + 'static,
    {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();

        let join_handle = std::thread::spawn(move || {
            loop {
                clock.sleep(period);
                if shutdown_clone.load(Ordering::Relaxed) {
                    break;
                }
                if sink.subscriber_count() == 0 {
                    continue;
                }
                let (sp, y) = state.with(|s| (s.sp, s.y));
                let frame = TelemetryFrame {
                    timestamp_ms: clock.ms_since(epoch),
                    sp_volts: code_to_volts(sp),
                    y_volts: code_to_volts(y),
                };
                if let Err(e) = sink.publish(&frame) {
                    tracing::warn!(error = %e, "telemetry publish failed");
                }
            }
            tracing::trace!("telemetry task exiting");
        });

        Self {
            shutdown,
            join_handle: Some(join_handle),
        }
    }
}

impl Drop for TelemetryTask {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.join_handle.take()
            && let Err(e) = handle.join()
        {
            tracing::warn!(?e, "telemetry task thread panicked during shutdown");
        }
    }
}

/// Capacity of each subscriber's frame buffer; a slow subscriber loses
/// frames rather than stalling the publisher.
const SUBSCRIBER_BUFFER: usize = 32;

/// In-process broadcast sink: frames fan out to every live subscriber.
///
/// Subscribers that dropped their receiver are pruned on the next publish,
/// so `subscriber_count` may briefly overcount after a disconnect.
#[derive(Debug, Clone, Default)]
pub struct ChannelBroadcast {
    subscribers: Arc<Mutex<Vec<xch::Sender<TelemetryFrame>>>>,
}

impl ChannelBroadcast {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> xch::Receiver<TelemetryFrame> {
        let (tx, rx) = xch::bounded(SUBSCRIBER_BUFFER);
        let mut subs = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subs.push(tx);
        rx
    }
}

impl TelemetrySink for ChannelBroadcast {
    fn publish(
        &mut self,
        frame: &TelemetryFrame,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut subs = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subs.retain(|tx| match tx.try_send(*frame) {
            Ok(()) => true,
            // Full: the subscriber is slow, drop this frame for them only.
            Err(xch::TrySendError::Full(_)) => true,
            Err(xch::TrySendError::Disconnected(_)) => false,
        });
        Ok(())
    }

    fn subscriber_count(&self) -> usize {
        let subs = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(ms: u64) -> TelemetryFrame {
        TelemetryFrame {
            timestamp_ms: ms,
            sp_volts: 1.65,
            y_volts: 0.0,
        }
    }

    #[test]
    fn broadcast_fans_out_to_all_subscribers() {
        let mut bc = ChannelBroadcast::new();
        let a = bc.subscribe();
        let b = bc.subscribe();
        assert_eq!(bc.subscriber_count(), 2);
        bc.publish(&frame(10)).expect("publish");
        assert_eq!(a.try_recv().expect("a").timestamp_ms, 10);
        assert_eq!(b.try_recv().expect("b").timestamp_ms, 10);
    }

    #[test]
    fn dropped_subscribers_are_pruned_on_publish() {
        let mut bc = ChannelBroadcast::new();
        let a = bc.subscribe();
        drop(bc.subscribe());
        assert_eq!(bc.subscriber_count(), 2);
        bc.publish(&frame(1)).expect("publish");
        assert_eq!(bc.subscriber_count(), 1);
        assert_eq!(a.try_recv().expect("a").timestamp_ms, 1);
    }

    #[test]
    fn slow_subscriber_loses_frames_without_blocking() {
        let mut bc = ChannelBroadcast::new();
        let rx = bc.subscribe();
        for i in 0..(SUBSCRIBER_BUFFER as u64 + 5) {
            bc.publish(&frame(i)).expect("publish");
        }
        assert_eq!(bc.subscriber_count(), 1, "slow subscriber stays connected");
        let received: Vec<_> = rx.try_iter().collect();
        assert_eq!(received.len(), SUBSCRIBER_BUFFER);
    }
}
