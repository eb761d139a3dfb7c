use hand_core::mocks::{RecordingLines, ScriptedInput};
use hand_core::{BuildError, Hand, HandSettings};
use hand_traits::LinePair;
use rstest::rstest;

fn lines() -> [Box<dyn LinePair + Send>; 4] {
    std::array::from_fn(|_| Box::new(RecordingLines::new()) as Box<dyn LinePair + Send>)
}

fn build_with(mutate: impl FnOnce(&mut HandSettings)) -> hand_core::Result<Hand> {
    let mut settings = HandSettings::default();
    mutate(&mut settings);
    Hand::builder()
        .with_input(ScriptedInput::default())
        .with_lines(lines())
        .with_settings(settings)
        .build()
}

#[test]
fn defaults_build() {
    let hand = build_with(|_| {}).unwrap();
    assert_eq!(hand.registry().snapshot().len(), 4);
}

#[test]
fn try_build_reports_missing_parts() {
    let err = Hand::builder().try_build().unwrap_err();
    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::MissingInput)
    ));
    let err = Hand::builder()
        .with_input(ScriptedInput::default())
        .try_build()
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::MissingLines)
    ));
}

#[rstest]
#[case::zero_samples(|s: &mut HandSettings| s.sensor.samples = 0, "samples")]
#[case::inverted_bands(|s: &mut HandSettings| s.estimator.implausible_from_mm_s = 2.0, "speed bands")]
#[case::negative_tolerance(|s: &mut HandSettings| s.observer.stall_epsilon_mm = -0.1, "tolerances")]
#[case::shrinking_reversal(|s: &mut HandSettings| s.planner.reversal_factor = 0.8, "reversal_factor")]
#[case::empty_range(|s: &mut HandSettings| s.fingers[1].max_position_mm = 1.0, "finger range")]
#[case::shared_lines(|s: &mut HandSettings| s.fingers[3].lower_line = s.fingers[3].upper_line, "lines must differ")]
#[case::zero_correction(|s: &mut HandSettings| s.observer.max_correction_us = 0, "max_correction_us")]
fn invalid_settings_are_rejected(#[case] mutate: fn(&mut HandSettings), #[case] needle: &str) {
    let err = build_with(mutate).unwrap_err();
    let msg = format!("{err}");
    assert!(msg.contains(needle), "unexpected error: {msg}");
    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::InvalidConfig(_))
    ));
}
