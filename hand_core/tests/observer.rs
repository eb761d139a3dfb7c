//! Stall and drift supervision against the simulated hand.

mod common;

use std::time::Duration;

use crossbeam_channel as xch;
use hand_core::mocks::RecordingLines;
use hand_core::{
    Direction, FingerFault, FingerId, FingerOutcome, FingerState, Hand, Instruction,
    InstructionSnapshot, ObserverOutcome, PlannedCommand,
};
use hand_traits::{LinePair, ManualClock};
use rstest::rstest;

fn snap(v: f64) -> InstructionSnapshot {
    InstructionSnapshot::uniform(Instruction::new(v).unwrap())
}

fn long_extend() -> PlannedCommand {
    PlannedCommand {
        direction: Direction::Extend,
        speed_mm_s: common::SPEED_MM_S,
        duration_us: 2_000_000,
    }
}

#[test]
fn jammed_actuator_is_aborted_and_flagged() {
    let clock = ManualClock::new();
    let (sim, hand) = common::sim_hand(clock.clone(), [5.0; 4], common::settings());
    sim.jam(0, true);
    let (tx, rx) = xch::unbounded();
    let mut control = hand.control_loop(rx);
    let mut observer = hand.observer();
    tx.send(snap(0.5)).unwrap();
    control.run_cycle();

    let first = observer.observe_cycle();
    assert!(
        first
            .outcomes
            .iter()
            .all(|(_, o)| *o == ObserverOutcome::Watching)
    );
    clock.advance(Duration::from_millis(100));
    let second = observer.observe_cycle();
    assert_eq!(second.get(FingerId::Index), Some(&ObserverOutcome::Stalled));
    assert_eq!(second.get(FingerId::Middle), Some(&ObserverOutcome::Moving));

    assert_eq!(sim.lines(0).levels().unwrap(), (false, false));
    assert!(observer.is_stalling());
    let rt = hand
        .registry()
        .with_finger(FingerId::Index, |ctx| ctx.runtime.clone());
    assert!(rt.stalling);
    assert_eq!(rt.state, FingerState::Invalid);
    assert_eq!(rt.stalled_instruction, Some(Instruction::new(0.5).unwrap()));

    // same instruction: the stalled finger is left alone
    let report = control.run_cycle();
    assert!(matches!(
        report.get(FingerId::Index),
        Some(FingerOutcome::Faulted(FingerFault::StallFault))
    ));
    assert_eq!(sim.strokes(0), 1);

    // a different instruction forces a new planning decision
    tx.send(snap(0.75)).unwrap();
    let report = control.run_cycle();
    assert!(matches!(
        report.get(FingerId::Index),
        Some(FingerOutcome::Commanded(_))
    ));
    assert!(!hand.registry().with_finger(FingerId::Index, |ctx| ctx.runtime.stalling));
}

#[test]
fn confirmed_motion_clears_the_stall_flag() {
    let clock = ManualClock::new();
    let (_sim, hand) = common::sim_hand(clock.clone(), [6.0; 4], common::settings());
    hand.registry().with_finger(FingerId::Index, |ctx| {
        ctx.runtime.stalling = true;
        ctx.driver.execute(ctx.runtime, &long_extend()).unwrap();
    });
    let mut observer = hand.observer();
    assert_eq!(
        observer.observe_cycle().get(FingerId::Index),
        Some(&ObserverOutcome::Watching)
    );
    clock.advance(Duration::from_millis(100));
    assert_eq!(
        observer.observe_cycle().get(FingerId::Index),
        Some(&ObserverOutcome::Moving)
    );
    assert!(!observer.is_stalling());
}

#[rstest]
#[case(5.10, 10, ObserverOutcome::Moving)]
#[case(12.70, 10, ObserverOutcome::Moving)]
#[case(5.10, 9, ObserverOutcome::Stalled)]
fn travel_of_exactly_epsilon_counts_as_motion(
    #[case] start: f64,
    #[case] advance_ms: u64,
    #[case] expected: ObserverOutcome,
) {
    let clock = ManualClock::new();
    let (sim, hand) = common::sim_hand(clock.clone(), [start; 4], common::settings());
    hand.registry().with_finger(FingerId::Index, |ctx| {
        ctx.driver.execute(ctx.runtime, &long_extend()).unwrap();
    });
    let mut observer = hand.observer();
    assert_eq!(
        observer.observe_cycle().get(FingerId::Index),
        Some(&ObserverOutcome::Watching)
    );
    // 20 mm/s: 10 ms is exactly 0.2 mm
    clock.advance(Duration::from_millis(advance_ms));
    assert_eq!(observer.observe_cycle().get(FingerId::Index), Some(&expected));
    let moved = sim.position_mm(0).unwrap() - start;
    assert!((moved - advance_ms as f64 * 0.02).abs() < 1e-9, "moved = {moved}");
}

#[test]
fn new_stroke_restarts_the_comparison() {
    let clock = ManualClock::new();
    let (sim, hand) = common::sim_hand(clock.clone(), [6.0; 4], common::settings());
    sim.jam(1, true);
    let mut observer = hand.observer();
    let pulse = |hand: &Hand| {
        hand.registry().with_finger(FingerId::Middle, |ctx| {
            ctx.driver.execute(ctx.runtime, &long_extend()).unwrap();
        });
    };
    pulse(&hand);
    observer.observe_cycle();
    pulse(&hand);
    clock.advance(Duration::from_millis(100));
    assert_eq!(
        observer.observe_cycle().get(FingerId::Middle),
        Some(&ObserverOutcome::Watching)
    );
    assert!(!observer.is_stalling());
}

#[rstest]
#[case(11.0, Some((Direction::Contract, 40_000)))]
#[case(9.5, Some((Direction::Extend, 25_000)))]
#[case(10.2, None)]
fn idle_drift_gets_a_bounded_correction(
    #[case] position: f64,
    #[case] expected: Option<(Direction, u64)>,
) {
    let clock = ManualClock::new();
    let (sim, hand) = common::sim_hand(clock, [position; 4], common::settings());
    let mut observer = hand.observer();
    let report = observer.observe_cycle();
    let got = match report.get(FingerId::Ring) {
        Some(ObserverOutcome::Corrected(cmd)) => Some((cmd.direction, cmd.duration_us)),
        Some(ObserverOutcome::Idle) => None,
        other => panic!("unexpected outcome {other:?}"),
    };
    assert_eq!(got, expected);
    assert_eq!(sim.strokes(2), u32::from(expected.is_some()));
    // the target itself is never moved by a correction
    let rt = hand
        .registry()
        .with_finger(FingerId::Ring, |ctx| ctx.runtime.clone());
    assert_eq!(rt.last_set_pos_mm, 10.0);
}

#[test]
fn drift_correction_is_suppressed_while_any_finger_stalls() {
    let clock = ManualClock::new();
    let (sim, hand) = common::sim_hand(clock, [11.0; 4], common::settings());
    hand.registry()
        .with_finger(FingerId::Little, |ctx| ctx.runtime.stalling = true);
    let report = hand.observer().observe_cycle();
    assert!(
        report
            .outcomes
            .iter()
            .all(|(_, o)| *o == ObserverOutcome::Idle)
    );
    assert!((0..4).all(|i| sim.strokes(i) == 0));
}

#[test]
fn disconnected_sensor_is_skipped() {
    let clock = ManualClock::new();
    let (sim, hand) = common::sim_hand(clock, [11.0; 4], common::settings());
    sim.disconnect(1, true);
    let report = hand.observer().observe_cycle();
    assert_eq!(
        report.get(FingerId::Middle),
        Some(&ObserverOutcome::Disconnected)
    );
    assert_eq!(sim.strokes(1), 0);
    assert_eq!(sim.strokes(0), 1);
}

#[test]
fn both_lines_high_are_forced_low() {
    let clock = ManualClock::new();
    let sim = hand_hardware::SimHand::new(
        (0..4)
            .map(|i| hand_hardware::SimFinger {
                channel: i,
                min_mm: common::MIN_MM,
                max_mm: common::MAX_MM,
                speed_mm_s: common::SPEED_MM_S,
                initial_mm: 10.0,
            })
            .collect(),
        common::model(),
        clock.clone(),
    );
    let recording = RecordingLines::new();
    let line = |i: usize| -> Box<dyn LinePair + Send> { Box::new(sim.lines(i)) };
    let first: Box<dyn LinePair + Send> = Box::new(recording.clone());
    let hand = Hand::builder()
        .with_input(sim.input())
        .with_lines([first, line(1), line(2), line(3)])
        .with_settings(common::settings())
        .with_clock(clock)
        .build()
        .unwrap();

    recording.force_levels(true, true);
    let report = hand.observer().observe_cycle();
    assert_eq!(
        report.get(FingerId::Index),
        Some(&ObserverOutcome::LineConflict)
    );
    assert_eq!(recording.current(), (false, false));
}
