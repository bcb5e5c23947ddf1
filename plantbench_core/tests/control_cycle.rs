use plantbench_core::mocks::{ManualClock, NoopPlant, RecordingMux, ScriptedPlant};
use plantbench_core::state::{ControlState, PlantSelection};
use plantbench_core::{ControlLoop, ControlTask, Gains, SharedState, tick_slot};
use plantbench_traits::{Clock, PlantId};
use std::sync::Arc;
use std::time::Duration;

fn shared_state(plant: u8, combination: u8) -> Arc<SharedState> {
    let sel = PlantSelection::from_raw(plant, combination).expect("valid selection");
    let shared = Arc::new(SharedState::new(ControlState::new(
        Duration::from_millis(200),
        sel,
    )));
    shared.with(|s| {
        s.init_controller(Gains {
            kp: 0.05,
            ki: 0.1,
            kd: 0.0,
        });
    });
    shared
}

#[test]
fn cycle_selects_samples_computes_and_actuates() {
    let state = shared_state(1, 2);
    let plant = ScriptedPlant::new([0.0]);
    let mux = RecordingMux::new();
    let clock = ManualClock::new();
    let mut cycle = ControlLoop::new(state.clone(), plant.clone(), mux.clone(), clock);

    cycle.run_cycle().expect("cycle");

    // Selection (1, 2) drives IN_A high, IN_B low.
    assert_eq!(mux.sets(), vec![(true, false)]);
    assert_eq!(plant.reads(), vec![PlantId::Plant1]);

    // y = 0 V, sp = 2047.5 -> u = 143.325, truncated to duty 143.
    assert_eq!(plant.writes(), vec![(PlantId::Plant1, 143)]);
    let s = state.snapshot();
    assert_eq!(s.y, 0.0);
    assert!((s.i_term - 40.95).abs() < 1e-9);
    assert!((s.u - 143.325).abs() < 1e-9);
}

#[test]
fn measured_volts_convert_to_sensor_code() {
    let state = shared_state(1, 0);
    let plant = ScriptedPlant::new([3.3]);
    let mut cycle = ControlLoop::new(
        state.clone(),
        plant.clone(),
        RecordingMux::new(),
        ManualClock::new(),
    );

    cycle.run_cycle().expect("cycle");

    let s = state.snapshot();
    assert!((s.y - 4095.0).abs() < 1e-9, "3.3 V is full scale");
    // Error is negative: integral clamps at zero, output clamps at zero.
    assert_eq!(s.i_term, 0.0);
    assert_eq!(s.u, 0.0);
    assert_eq!(plant.writes(), vec![(PlantId::Plant1, 0)]);
}

#[test]
fn settle_delay_elapses_between_select_and_sample() {
    let state = shared_state(1, 0);
    let clock = ManualClock::new();
    let epoch = clock.now();
    let mut cycle = ControlLoop::new(
        state,
        ScriptedPlant::new([0.0]),
        RecordingMux::new(),
        clock.clone(),
    );

    cycle.run_cycle().expect("cycle");
    assert_eq!(clock.ms_since(epoch), 1, "one settle delay per cycle");
}

#[test]
fn selection_change_applies_to_the_next_cycle() {
    let state = shared_state(1, 3);
    let plant = ScriptedPlant::new([0.0]);
    let mux = RecordingMux::new();
    let mut cycle = ControlLoop::new(state.clone(), plant.clone(), mux.clone(), ManualClock::new());

    cycle.run_cycle().expect("cycle");
    state.with(|s| {
        s.selection = PlantSelection::from_raw(2, 1).expect("valid selection");
    });
    cycle.run_cycle().expect("cycle");

    assert_eq!(mux.sets(), vec![(true, true), (false, true)]);
    assert_eq!(plant.reads(), vec![PlantId::Plant1, PlantId::Plant2]);
}

#[test]
fn sensor_failure_abandons_the_cycle() {
    let state = shared_state(1, 0);
    let mut cycle = ControlLoop::new(
        state.clone(),
        NoopPlant,
        RecordingMux::new(),
        ManualClock::new(),
    );

    let err = cycle.run_cycle().expect_err("sensor failure must surface");
    let msg = format!("{err:#}");
    assert!(msg.contains("reading plant voltage"), "msg: {msg}");

    // Nothing was written to the state after the failure point.
    let s = state.snapshot();
    assert_eq!(s.y, 0.0);
    assert_eq!(s.u, 0.0);
}

#[test]
fn two_pending_ticks_run_exactly_one_cycle() {
    let state = shared_state(1, 0);
    let plant = ScriptedPlant::new([0.0]);
    let (notifier, waiter) = tick_slot();

    // Two timer firings land before the task consumes either.
    notifier.notify();
    notifier.notify();

    let task = ControlTask::spawn(
        ControlLoop::new(
            state,
            plant.clone(),
            RecordingMux::new(),
            ManualClock::new(),
        ),
        waiter,
        notifier,
    );
    std::thread::sleep(Duration::from_millis(80));
    drop(task);

    assert_eq!(
        plant.writes().len(),
        1,
        "coalesced ticks must not double-execute"
    );
}

#[test]
fn control_task_runs_once_per_notify() {
    let state = shared_state(1, 0);
    let plant = ScriptedPlant::new([0.0]);
    let (notifier, waiter) = tick_slot();
    let task = ControlTask::spawn(
        ControlLoop::new(
            state,
            plant.clone(),
            RecordingMux::new(),
            ManualClock::new(),
        ),
        waiter,
        notifier.clone(),
    );

    for _ in 0..3 {
        notifier.notify();
        std::thread::sleep(Duration::from_millis(30));
    }
    drop(task);

    assert_eq!(plant.writes().len(), 3);
}
