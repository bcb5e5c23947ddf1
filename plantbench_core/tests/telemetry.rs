use plantbench_core::mocks::CollectingSink;
use plantbench_core::state::{ControlState, PlantSelection};
use plantbench_core::{ChannelBroadcast, SharedState, TelemetryTask};
use plantbench_traits::MonotonicClock;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn shared_state() -> Arc<SharedState> {
    let sel = PlantSelection::from_raw(1, 0).expect("valid selection");
    let shared = Arc::new(SharedState::new(ControlState::new(
        Duration::from_millis(200),
        sel,
    )));
    shared.with(|s| {
        s.sp = 2047.5;
        s.y = 4095.0;
    });
    shared
}

#[test]
fn frames_carry_volts_not_codes() {
    let state = shared_state();
    let sink = CollectingSink::new(1);
    let task = TelemetryTask::spawn(
        state,
        sink.clone(),
        Duration::from_millis(5),
        MonotonicClock::new(),
        Instant::now(),
    );

    std::thread::sleep(Duration::from_millis(60));
    drop(task);

    let frames = sink.frames();
    assert!(!frames.is_empty(), "reader must have published");
    let f = frames[0];
    assert!((f.sp_volts - 1.65).abs() < 1e-9, "sp_volts = {}", f.sp_volts);
    assert!((f.y_volts - 3.3).abs() < 1e-9, "y_volts = {}", f.y_volts);
}

#[test]
fn publishing_skips_entirely_without_subscribers() {
    let state = shared_state();
    let sink = CollectingSink::new(0);
    let task = TelemetryTask::spawn(
        state,
        sink.clone(),
        Duration::from_millis(5),
        MonotonicClock::new(),
        Instant::now(),
    );

    std::thread::sleep(Duration::from_millis(50));
    assert!(sink.frames().is_empty(), "no subscriber, no output");

    sink.set_subscribers(1);
    std::thread::sleep(Duration::from_millis(50));
    drop(task);
    assert!(!sink.frames().is_empty(), "output resumes with a subscriber");
}

#[test]
fn broadcast_task_reaches_a_live_subscriber() {
    let state = shared_state();
    let broadcast = ChannelBroadcast::new();
    let rx = broadcast.subscribe();
    let task = TelemetryTask::spawn(
        state,
        broadcast,
        Duration::from_millis(5),
        MonotonicClock::new(),
        Instant::now(),
    );

    let frame = rx
        .recv_timeout(Duration::from_millis(500))
        .expect("frame within timeout");
    assert!((frame.sp_volts - 1.65).abs() < 1e-9);
    drop(task);
}

#[test]
fn late_subscriber_starts_receiving_frames() {
    let state = shared_state();
    let broadcast = ChannelBroadcast::new();
    let probe = broadcast.clone();
    let task = TelemetryTask::spawn(
        state,
        broadcast,
        Duration::from_millis(5),
        MonotonicClock::new(),
        Instant::now(),
    );

    std::thread::sleep(Duration::from_millis(40));
    // Subscribing late still works: the reader notices on its next period.
    let rx = probe.subscribe();
    let frame = rx
        .recv_timeout(Duration::from_millis(500))
        .expect("frame after subscribing");
    assert!(frame.timestamp_ms > 0);
    drop(task);
}
