//! The real-time consumer: one control cycle per timer wakeup.

use crate::conversions::{duty_from_control, volts_to_code};
use crate::error::Result;
use crate::hw_error::map_hw_error_dyn;
use crate::mux;
use crate::state::SharedState;
use crate::timer::{TickNotifier, TickWaiter};
use eyre::WrapErr;
use plantbench_traits::{Clock, MuxPins, PlantIo};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Wait for the mux to stabilize after re-driving its lines.
pub const SETTLE_DELAY: Duration = Duration::from_millis(1);

/// One control cycle over the shared state and the hardware collaborators.
///
/// The cycle touches the lock twice: once to snapshot the selection, once to
/// store the measurement and run the PID step. The mux settle delay and both
/// plant I/O calls happen outside the lock, so slow hardware never extends a
/// critical section.
pub struct ControlLoop<P, X, C> {
    state: Arc<SharedState>,
    plant: P,
    mux: X,
    clock: C,
}

impl<P, X, C> ControlLoop<P, X, C>
where
    P: PlantIo,
    X: MuxPins,
    C: Clock,
{
    pub fn new(state: Arc<SharedState>, plant: P, mux: X, clock: C) -> Self {
        Self {
            state,
            plant,
            mux,
            clock,
        }
    }

    /// Run one cycle: select, settle, sample, compute, actuate.
    ///
    /// A reconfiguration landing between the two lock acquisitions applies
    /// its selection change to the next cycle, while its gain/setpoint
    /// change is already visible to this cycle's compute.
    pub fn run_cycle(&mut self) -> Result<()> {
        let sel = self.state.selection();

        mux::select_lines(&mut self.mux, sel.plant.as_raw(), sel.combination)?;
        self.clock.sleep(SETTLE_DELAY);

        let volts = self
            .plant
            .read_voltage(sel.plant)
            .map_err(|e| eyre::Report::new(map_hw_error_dyn(&*e)))
            .wrap_err("reading plant voltage")?;

        let u = self.state.with(|s| {
            s.y = volts_to_code(volts);
            s.compute();
            s.u
        });

        self.plant
            .write_control(sel.plant, duty_from_control(u))
            .map_err(|e| eyre::Report::new(map_hw_error_dyn(&*e)))
            .wrap_err("writing control output")?;

        Ok(())
    }
}

/// Thread that runs [`ControlLoop::run_cycle`] once per timer wakeup.
///
/// A failed cycle is logged and abandoned; the loop keeps running on the
/// next tick. The thread exits when the handle drops (the handle keeps a
/// notifier so the blocked wait can be released promptly) or when every
/// notifier disappears.
pub struct ControlTask {
    shutdown: Arc<AtomicBool>,
    wake: TickNotifier,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl ControlTask {
    /// `wake` must be a notifier for the same slot `waiter` consumes; the
    /// handle uses it to release the blocked wait on shutdown.
    pub fn spawn<P, X, C>(
        mut cycle: ControlLoop<P, X, C>,
        waiter: TickWaiter,
        wake: TickNotifier,
    ) -> Self
    where
        P: PlantIo + Send + 'static,
        X: MuxPins + Send + 'static,
        C: Clock + Send + Sync + 'static,
    {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();

        let join_handle = std::thread::spawn(move || {
            while waiter.wait() {
                if shutdown_clone.load(Ordering::Relaxed) {
                    break;
                }
                if let Err(e) = cycle.run_cycle() {
                    tracing::warn!(error = %e, "control cycle abandoned");
                }
            }
            tracing::trace!("control task exiting");
        });

        Self {
            shutdown,
            wake,
            join_handle: Some(join_handle),
        }
    }
}

impl Drop for ControlTask {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        // Release the thread if it is parked on the slot.
        self.wake.notify();
        if let Some(handle) = self.join_handle.take()
            && let Err(e) = handle.join()
        {
            tracing::warn!(?e, "control task thread panicked during shutdown");
        }
    }
}
