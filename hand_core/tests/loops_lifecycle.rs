//! Both loops on their own threads, real time, simulated hand.
//!
//! Verifies that:
//! - fingers settle near their instruction-derived targets
//! - a jammed finger is aborted and flagged by the observer
//! - stopping joins the loops and leaves every actuator de-energised

mod common;

use std::sync::atomic::AtomicBool;
use std::time::Duration;

use crossbeam_channel as xch;
use hand_core::{FingerId, InstructionSnapshot, run_until};
use hand_traits::{LinePair, MonotonicClock};

fn settle_to(values: [f64; 4]) -> Vec<(FingerId, hand_core::FingerRuntime)> {
    let (sim, hand) = common::sim_hand(MonotonicClock::new(), [10.0; 4], common::settings());
    let (tx, rx) = xch::unbounded();
    let running = hand.start(rx).unwrap();
    tx.send(InstructionSnapshot::from_values(values).unwrap())
        .unwrap();
    std::thread::sleep(Duration::from_millis(1200));
    let fingers = running.stop();
    for i in 0..4 {
        assert_eq!(sim.lines(i).levels().unwrap(), (false, false));
    }
    for (i, (id, rt)) in fingers.iter().enumerate() {
        let pos = sim.position_mm(i).unwrap();
        let target = common::MIN_MM + (common::MAX_MM - common::MIN_MM) * values[i];
        assert!((pos - target).abs() < 0.5, "{id}: {pos} vs {target}");
        assert_eq!(rt.last_set_pos_mm, target);
    }
    fingers
}

#[test]
fn fingers_settle_near_targets() {
    let fingers = settle_to([0.3, 0.5, 0.7, 0.2]);
    assert!(fingers.iter().all(|(_, rt)| !rt.stalling));
}

#[test]
fn jammed_finger_is_stopped_by_the_observer() {
    let (sim, hand) = common::sim_hand(MonotonicClock::new(), [6.0; 4], common::settings());
    sim.jam(2, true);
    let (tx, rx) = xch::unbounded();
    let running = hand.start(rx).unwrap();
    tx.send(InstructionSnapshot::from_values([0.5, 0.5, 0.9, 0.5]).unwrap())
        .unwrap();

    let mut flagged = false;
    for _ in 0..100 {
        std::thread::sleep(Duration::from_millis(10));
        if hand.registry().any_stalling() {
            flagged = true;
            break;
        }
    }
    assert!(flagged, "observer never flagged the jammed finger");
    // aborted long before the 650 ms pulse would have expired
    assert_eq!(sim.lines(2).levels().unwrap(), (false, false));
    let strokes = sim.strokes(2);
    std::thread::sleep(Duration::from_millis(200));
    assert_eq!(sim.strokes(2), strokes, "stalled finger was pulsed again");
    drop(running);
}

#[test]
fn run_until_honours_shutdown_and_duration() {
    let (_sim, hand) = common::sim_hand(MonotonicClock::new(), [10.0; 4], common::settings());
    let (_tx, rx) = xch::unbounded::<InstructionSnapshot>();
    let shutdown = AtomicBool::new(false);
    let summary = run_until(&hand, rx, &shutdown, Some(Duration::from_millis(150))).unwrap();
    assert!(summary.elapsed >= Duration::from_millis(150));
    assert_eq!(summary.fingers.len(), 4);

    let (_tx, rx) = xch::unbounded::<InstructionSnapshot>();
    let shutdown = AtomicBool::new(true);
    let summary = run_until(&hand, rx, &shutdown, None).unwrap();
    assert!(summary.elapsed < Duration::from_secs(1));
}

#[test]
fn repeated_start_stop_does_not_leak() {
    let (_sim, hand) = common::sim_hand(MonotonicClock::new(), [10.0; 4], common::settings());
    for _ in 0..10 {
        let (_tx, rx) = xch::unbounded::<InstructionSnapshot>();
        let running = hand.start(rx).unwrap();
        std::thread::sleep(Duration::from_millis(5));
        drop(running);
    }
}
