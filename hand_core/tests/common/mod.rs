#![allow(dead_code)]

use hand_core::{FingerCalibration, FingerId, Hand, HandSettings, SensorCfg};
use hand_hardware::{SimAdcModel, SimFinger, SimHand};
use hand_traits::{Clock, LinePair};

pub const MIN_MM: f64 = 5.0;
pub const MAX_MM: f64 = 19.0;
pub const SPEED_MM_S: f64 = 20.0;

/// One millivolt per count and 0.01 mm per millivolt: positions on a 0.01 mm grid read back exactly.
pub fn model() -> SimAdcModel {
    SimAdcModel {
        mv_per_count: 1.0,
        mv_offset: 0.0,
        mm_per_mv: 0.01,
        mm_offset: 0.0,
        disconnected_mv: 142,
        max_count: 4095,
    }
}

pub fn settings() -> HandSettings {
    let mut s = HandSettings {
        sensor: SensorCfg {
            samples: 4,
            mv_per_count: 1.0,
            mv_offset: 0.0,
            mm_per_mv: 0.01,
            mm_offset: 0.0,
            disconnected_mv: 142,
        },
        ..HandSettings::default()
    };
    for (i, id) in FingerId::ALL.into_iter().enumerate() {
        let n = i as u8;
        s.fingers[i] = FingerCalibration {
            id,
            min_position_mm: MIN_MM,
            max_position_mm: MAX_MM,
            max_speed_mm_s: SPEED_MM_S,
            upper_line: 2 * n + 10,
            lower_line: 2 * n + 11,
            adc_channel: n,
        };
    }
    s
}

/// Simulated hand with all fingers at `initial_mm`, plus the core assembled on top of it.
pub fn sim_hand(
    clock: impl Clock + Clone + Send + Sync + 'static,
    initial_mm: [f64; 4],
    settings: HandSettings,
) -> (SimHand, Hand) {
    let fingers = initial_mm
        .iter()
        .enumerate()
        .map(|(i, &mm)| SimFinger {
            channel: i as u8,
            min_mm: MIN_MM,
            max_mm: MAX_MM,
            speed_mm_s: SPEED_MM_S,
            initial_mm: mm,
        })
        .collect();
    let sim = SimHand::new(fingers, model(), clock.clone());
    let line = |i: usize| -> Box<dyn LinePair + Send> { Box::new(sim.lines(i)) };
    let hand = Hand::builder()
        .with_input(sim.input())
        .with_lines([line(0), line(1), line(2), line(3)])
        .with_settings(settings)
        .with_clock(clock)
        .build()
        .unwrap();
    (sim, hand)
}
