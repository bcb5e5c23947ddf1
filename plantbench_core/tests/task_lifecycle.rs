//! Task thread lifecycle and cleanup.
//!
//! Verifies that timer, control, and telemetry threads exit when their
//! handles drop, that repeated spawn/drop does not accumulate threads, and
//! that shutdown stays prompt even while a task is parked on its wakeup.

use plantbench_core::mocks::{CollectingSink, ManualClock, RecordingMux, ScriptedPlant};
use plantbench_core::state::{ControlState, PlantSelection};
use plantbench_core::{ControlLoop, ControlTask, SampleTimer, SharedState, TelemetryTask, tick_slot};
use plantbench_traits::MonotonicClock;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn shared_state() -> Arc<SharedState> {
    let sel = PlantSelection::from_raw(1, 0).expect("valid selection");
    Arc::new(SharedState::new(ControlState::new(
        Duration::from_millis(200),
        sel,
    )))
}

#[test]
fn sample_timer_exits_on_drop() {
    let (notifier, waiter) = tick_slot();
    let timer = SampleTimer::spawn(MonotonicClock::new(), Duration::from_millis(10), notifier);

    std::thread::sleep(Duration::from_millis(50));
    assert!(waiter.try_wait(), "timer must have ticked by now");

    drop(timer);
}

#[test]
fn multiple_timers_dont_leak_threads() {
    for _ in 0..10 {
        let (notifier, waiter) = tick_slot();
        let timer = SampleTimer::spawn(MonotonicClock::new(), Duration::from_millis(5), notifier);
        std::thread::sleep(Duration::from_millis(10));
        let _ = waiter.try_wait();
        drop(timer);
    }
}

#[test]
fn control_task_shutdown_is_prompt_while_parked() {
    let (notifier, waiter) = tick_slot();
    let task = ControlTask::spawn(
        ControlLoop::new(
            shared_state(),
            ScriptedPlant::new([0.0]),
            RecordingMux::new(),
            ManualClock::new(),
        ),
        waiter,
        notifier,
    );
    // No timer exists, so the task is parked on the empty slot.
    std::thread::sleep(Duration::from_millis(20));

    let start = Instant::now();
    drop(task);
    let shutdown_time = start.elapsed();
    assert!(
        shutdown_time < Duration::from_millis(200),
        "shutdown took {shutdown_time:?}, expected the spare notifier to release the wait"
    );
}

#[test]
fn control_task_exits_when_all_notifiers_disappear() {
    let (notifier, waiter) = tick_slot();
    let task = ControlTask::spawn(
        ControlLoop::new(
            shared_state(),
            ScriptedPlant::new([0.0]),
            RecordingMux::new(),
            ManualClock::new(),
        ),
        waiter,
        notifier.clone(),
    );

    // Dropping the external notifier leaves only the task's own spare; the
    // Drop impl uses it and then joins.
    drop(notifier);
    drop(task);
}

#[test]
fn telemetry_task_exits_on_drop() {
    let task = TelemetryTask::spawn(
        shared_state(),
        CollectingSink::new(1),
        Duration::from_millis(5),
        MonotonicClock::new(),
        Instant::now(),
    );
    std::thread::sleep(Duration::from_millis(20));
    drop(task);
}

#[test]
fn timer_feeds_control_task_end_to_end() {
    let plant = ScriptedPlant::new([0.0]);
    let (notifier, waiter) = tick_slot();
    let timer = SampleTimer::spawn(
        MonotonicClock::new(),
        Duration::from_millis(10),
        notifier.clone(),
    );
    let task = ControlTask::spawn(
        ControlLoop::new(
            shared_state(),
            plant.clone(),
            RecordingMux::new(),
            ManualClock::new(),
        ),
        waiter,
        notifier,
    );

    std::thread::sleep(Duration::from_millis(100));
    drop(timer);
    drop(task);

    let cycles = plant.writes().len();
    assert!(cycles >= 3, "expected several cycles, got {cycles}");
}
