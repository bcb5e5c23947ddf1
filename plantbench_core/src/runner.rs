//! System bring-up: assemble collaborators, discharge the plants, spawn the
//! task set, and hand back a handle that tears everything down in order.

use crate::control_task::{ControlLoop, ControlTask};
use crate::error::{BuildError, Result};
use crate::hw_error::map_hw_error_dyn;
use crate::mux::{advance_selection, report_selection, select_lines};
use crate::pid::Gains;
use crate::setpoint::{SetpointProfile, SetpointTask};
use crate::state::{ControlState, PlantSelection, SharedState};
use crate::telemetry::{ChannelBroadcast, TelemetryTask};
use crate::timer::{SampleTimer, tick_slot};
use eyre::WrapErr;
use plantbench_config::Config;
use plantbench_traits::{Clock, MonotonicClock, MuxPins, PlantId, PlantIo, TelemetrySink};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

type BoxedPlant = Box<dyn PlantIo + Send>;
type BoxedMux = Box<dyn MuxPins + Send>;
type BoxedSink = Box<dyn TelemetrySink + Send>;
type SharedClock = Arc<dyn Clock + Send + Sync>;

/// Assembles a [`System`]. Plant I/O and mux are mandatory; everything else
/// has defaults (real clock, default config, no telemetry, no demo tasks).
#[derive(Default)]
pub struct SystemBuilder {
    plant: Option<BoxedPlant>,
    mux: Option<BoxedMux>,
    clock: Option<SharedClock>,
    config: Option<Config>,
    plotter_sink: Option<BoxedSink>,
    broadcast: Option<ChannelBroadcast>,
    cycle_selection: Option<Duration>,
}

impl SystemBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_plant(mut self, plant: impl PlantIo + Send + 'static) -> Self {
        self.plant = Some(Box::new(plant));
        self
    }

    pub fn with_mux(mut self, mux: impl MuxPins + Send + 'static) -> Self {
        self.mux = Some(Box::new(mux));
        self
    }

    /// Provide a custom clock; defaults to the real monotonic clock.
    pub fn with_clock(mut self, clock: impl Clock + Send + Sync + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Attach the plotter-style telemetry reader (fixed cadence, always on).
    pub fn with_plotter_sink(mut self, sink: impl TelemetrySink + Send + 'static) -> Self {
        self.plotter_sink = Some(Box::new(sink));
        self
    }

    /// Attach the broadcast-style telemetry reader; it skips its output
    /// entirely while the broadcast has no subscribers.
    pub fn with_broadcast(mut self, broadcast: ChannelBroadcast) -> Self {
        self.broadcast = Some(broadcast);
        self
    }

    /// Enable the demo selection cycler with the given period.
    pub fn with_selection_cycler(mut self, period: Duration) -> Self {
        self.cycle_selection = Some(period);
        self
    }

    /// Validate, run the startup sequence, and spawn the task set.
    pub fn start(self) -> Result<System> {
        let mut plant = self
            .plant
            .ok_or_else(|| eyre::Report::new(BuildError::MissingPlant))?;
        let mut mux = self
            .mux
            .ok_or_else(|| eyre::Report::new(BuildError::MissingMux))?;
        let clock: SharedClock = self
            .clock
            .unwrap_or_else(|| Arc::new(MonotonicClock::new()));
        let config = self.config.unwrap_or_default();
        config.validate().wrap_err("system config")?;

        let sample_time = Duration::from_millis(config.control.sample_time_ms);
        let selection = PlantSelection::from_raw(config.startup.plant, config.startup.combination)
            .ok_or_else(|| eyre::Report::new(BuildError::InvalidConfig("startup selection")))?;

        let epoch = clock.now();
        let state = Arc::new(SharedState::new(ControlState::new(sample_time, selection)));
        state.with(|s| {
            s.init_controller(Gains {
                kp: config.control.kp,
                ki: config.control.ki,
                kd: config.control.kd,
            });
        });
        if let Some(line) = report_selection(selection.plant.as_raw(), selection.combination) {
            tracing::info!("{line}");
        }

        discharge(
            &mut plant,
            &mut mux,
            &clock,
            Duration::from_millis(config.startup.discharge_ms),
        )?;

        let (notifier, waiter) = tick_slot();
        let timer = SampleTimer::spawn(clock.clone(), sample_time, notifier.clone());
        let control = ControlTask::spawn(
            ControlLoop::new(state.clone(), plant, mux, clock.clone()),
            waiter,
            notifier,
        );

        let plotter = self.plotter_sink.map(|sink| {
            TelemetryTask::spawn(
                state.clone(),
                sink,
                Duration::from_millis(config.telemetry.plotter_period_ms),
                clock.clone(),
                epoch,
            )
        });
        let broadcast = self.broadcast.map(|sink| {
            TelemetryTask::spawn(
                state.clone(),
                sink,
                Duration::from_millis(config.telemetry.broadcast_period_ms),
                clock.clone(),
                epoch,
            )
        });

        let setpoint = config.setpoint.enabled.then(|| {
            let profile = if config.setpoint.steps.is_empty() {
                SetpointProfile::demo(config.startup.discharge_ms)
            } else {
                SetpointProfile::new(config.setpoint.steps.clone())
            };
            SetpointTask::spawn(state.clone(), profile, clock.clone(), epoch)
        });

        let cycler = self
            .cycle_selection
            .map(|period| SelectionCycler::spawn(state.clone(), clock.clone(), period));

        tracing::info!(
            sample_time_ms = config.control.sample_time_ms,
            "system started"
        );

        Ok(System {
            timer,
            control,
            plotter,
            broadcast,
            setpoint,
            cycler,
            state,
            epoch,
        })
    }
}

/// Hold both plant inputs at zero through mux combination 0 so the output
/// capacitors drain before control begins.
fn discharge(
    plant: &mut BoxedPlant,
    mux: &mut BoxedMux,
    clock: &SharedClock,
    wait: Duration,
) -> Result<()> {
    for id in [PlantId::Plant1, PlantId::Plant2] {
        select_lines(mux, id.as_raw(), 0)?;
        plant
            .write_control(id, 0)
            .map_err(|e| eyre::Report::new(map_hw_error_dyn(&*e)))
            .wrap_err("zeroing plant output")?;
    }
    tracing::info!(wait_ms = wait.as_millis() as u64, "discharging plants");
    clock.sleep(wait);
    Ok(())
}

/// The running system. Dropping it stops everything: fields drop in
/// declaration order, so the timer goes first (no further wakeups), then the
/// control task (released promptly via its spare notifier), then the
/// readers.
pub struct System {
    timer: SampleTimer,
    control: ControlTask,
    plotter: Option<TelemetryTask>,
    broadcast: Option<TelemetryTask>,
    setpoint: Option<SetpointTask>,
    cycler: Option<SelectionCycler>,
    state: Arc<SharedState>,
    epoch: Instant,
}

impl std::fmt::Debug for System {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("System").finish_non_exhaustive()
    }
}

impl System {
    pub fn builder() -> SystemBuilder {
        SystemBuilder::new()
    }

    /// The shared record; the entry point for remote reconfiguration.
    pub fn state(&self) -> &Arc<SharedState> {
        &self.state
    }

    pub fn epoch(&self) -> Instant {
        self.epoch
    }

    /// Stop all tasks and join their threads.
    pub fn stop(self) {
        drop(self);
    }
}

/// Demo task stepping the plant/mux selection through its full cycle.
pub struct SelectionCycler {
    shutdown: Arc<AtomicBool>,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl SelectionCycler {
    pub fn spawn<C: Clock + Send + Sync + 'static>(
        state: Arc<SharedState>,
        clock: C,
        period: Duration,
    ) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();

        let join_handle = std::thread::spawn(move || {
            loop {
                clock.sleep(period);
                if shutdown_clone.load(Ordering::Relaxed) {
                    break;
                }
                let sel = state.with(|s| {
                    s.selection = advance_selection(s.selection);
                    s.selection
                });
                if let Some(line) = report_selection(sel.plant.as_raw(), sel.combination) {
                    tracing::info!("{line}");
                }
            }
            tracing::trace!("selection cycler exiting");
        });

        Self {
            shutdown,
            join_handle: Some(join_handle),
        }
    }
}

impl Drop for SelectionCycler {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.join_handle.take()
            && let Err(e) = handle.join()
        {
            tracing::warn!(?e, "selection cycler thread panicked during shutdown");
        }
    }
}
