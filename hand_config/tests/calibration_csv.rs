use std::fs::File;
use std::io::Write;

use hand_config::{CalibrationRow, SensorCalibration, load_calibration_csv};
use rstest::rstest;
use tempfile::tempdir;

#[rstest]
fn calibration_from_rows_two_points() {
    let rows = vec![
        CalibrationRow { mv: 1000.0, mm: 5.0 },
        CalibrationRow { mv: 3000.0, mm: 17.0 },
    ];
    let c = SensorCalibration::from_rows(rows).unwrap();
    assert!((c.mm_per_mv - 0.006).abs() < 1e-9);
    assert!((c.mm_offset - (-1.0)).abs() < 1e-9);
}

#[rstest]
fn calibration_accepts_decreasing_voltages() {
    // Potentiometer wired the other way round
    let rows = vec![
        CalibrationRow { mv: 3000.0, mm: 2.0 },
        CalibrationRow { mv: 2000.0, mm: 8.0 },
        CalibrationRow { mv: 1000.0, mm: 14.0 },
    ];
    let c = SensorCalibration::from_rows(rows).unwrap();
    assert!((c.mm_per_mv + 0.006).abs() < 1e-9);
    assert!((c.mm_offset - 20.0).abs() < 1e-9);
}

#[rstest]
fn calibration_rejects_single_row() {
    let err = SensorCalibration::from_rows(vec![CalibrationRow { mv: 1.0, mm: 1.0 }])
        .expect_err("one row cannot define a line");
    assert!(format!("{err}").contains("at least two rows"));
}

#[rstest]
fn calibration_rejects_duplicate_mv() {
    let rows = vec![
        CalibrationRow { mv: 900.0, mm: 5.0 },
        CalibrationRow { mv: 900.0, mm: 6.0 },
    ];
    let err = SensorCalibration::from_rows(rows).expect_err("should fail on duplicate mv");
    assert!(format!("{err}").to_lowercase().contains("duplicate mv"));
}

#[rstest]
fn calibration_rejects_non_monotonic_zigzag() {
    let rows = vec![
        CalibrationRow { mv: 900.0, mm: 5.0 },
        CalibrationRow { mv: 2900.0, mm: 18.0 },
        CalibrationRow { mv: 1900.0, mm: 11.0 },
    ];
    let err = SensorCalibration::from_rows(rows).expect_err("should fail on zig-zag mv");
    assert!(
        format!("{err}")
            .to_lowercase()
            .contains("monotonic (strictly increasing or strictly decreasing)")
    );
}

#[rstest]
fn calibration_flat_line_errors() {
    let rows = vec![
        CalibrationRow { mv: 900.0, mm: 10.0 },
        CalibrationRow { mv: 1900.0, mm: 10.0 },
        CalibrationRow { mv: 2900.0, mm: 10.0 },
    ];
    let err = SensorCalibration::from_rows(rows).expect_err("zero slope is unusable");
    assert!(format!("{err}").contains("unusable slope"), "got: {err}");
}

#[rstest]
fn calibration_with_noise_and_outliers_recovers_params() {
    // Ground truth: mm = 0.00625*mv - 0.5
    let true_slope = 0.006_25f64;
    let true_offset = -0.5f64;
    let mut rows = Vec::new();
    for i in 0..50i32 {
        let mv = 800.0 + f64::from(i) * 50.0;
        let noise = (f64::from(i) * 37.0).sin() * 0.02;
        rows.push(CalibrationRow {
            mv,
            mm: true_slope * mv + true_offset + noise,
        });
    }
    rows[15].mm = 60.0;
    rows[35].mm = -60.0;

    let c = SensorCalibration::from_rows(rows).unwrap();
    let rel = (c.mm_per_mv - true_slope).abs() / true_slope;
    assert!(rel <= 0.01, "slope rel err {rel}");
    assert!((c.mm_offset - true_offset).abs() <= 0.1, "offset {}", c.mm_offset);
}

#[rstest]
fn csv_with_wrong_headers_errors() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad_headers.csv");
    let mut f = File::create(&path).unwrap();
    writeln!(f, "raw,value").unwrap();
    writeln!(f, "100,0.0").unwrap();
    writeln!(f, "200,1.0").unwrap();

    let err = load_calibration_csv(&path).expect_err("should error on bad headers");
    assert!(format!("{err}").contains("headers 'mv,mm'"));
}

#[rstest]
fn csv_with_non_numeric_errors() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad_numeric.csv");
    let mut f = File::create(&path).unwrap();
    writeln!(f, "mv,mm").unwrap();
    writeln!(f, "abc,xyz").unwrap();

    let err = load_calibration_csv(&path).expect_err("should error on non-numeric");
    assert!(format!("{err}").contains("invalid CSV row 2"));
}

#[rstest]
fn csv_happy_path_with_whitespace() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("pot.csv");
    let mut f = File::create(&path).unwrap();
    writeln!(f, "mv, mm").unwrap();
    writeln!(f, " 1000 , 5.0").unwrap();
    writeln!(f, "3000, 17.0 ").unwrap();

    let c = load_calibration_csv(&path).unwrap();
    assert!((c.mm_per_mv - 0.006).abs() < 1e-9);
}
