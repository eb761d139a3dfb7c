//! Config mapping, backend assembly and the three commands.

use std::io::BufRead;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel as xch;
use eyre::WrapErr;
use hand_core::{
    FingerFault, FingerId, Hand, HandError, HandSettings, InstructionSnapshot, Pose, PoseMap,
    RunSummary,
};
use hand_traits::LinePair;

use crate::cli::RtArgs;
use crate::rt::setup_rt_once;

/// Options of the `run` command.
#[derive(Debug, Clone)]
pub struct RunOpts {
    pub instructions: Option<String>,
    pub pose: Option<String>,
    pub stdin: bool,
    pub duration_ms: Option<u64>,
    pub rt: RtArgs,
}

/// Which backend the hand was assembled on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Sim,
    #[cfg(all(feature = "hardware", target_os = "linux"))]
    Rpi,
}

impl Backend {
    pub fn name(self) -> &'static str {
        match self {
            Backend::Sim => "sim",
            #[cfg(all(feature = "hardware", target_os = "linux"))]
            Backend::Rpi => "rpi",
        }
    }
}

pub fn load_config(path: &Path) -> eyre::Result<hand_config::Config> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("read config {}", path.display()))?;
    let cfg = hand_config::load_toml(&text)
        .map_err(|e| eyre::eyre!("parse config {}: {e}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Runtime settings from the config, with an optional calibration CSV applied.
pub fn settings_from(
    cfg: &hand_config::Config,
    calibration: Option<&Path>,
) -> eyre::Result<HandSettings> {
    let mut settings = HandSettings::try_from(cfg)?;
    if let Some(path) = calibration {
        let cal = hand_config::load_calibration_csv(path)?;
        tracing::info!(
            mm_per_mv = cal.mm_per_mv,
            mm_offset = cal.mm_offset,
            "sensor calibration loaded"
        );
        settings.sensor.apply_calibration(&cal);
    }
    Ok(settings)
}

/// Assemble the hand on the simulated plant, or on the Pi with `--features hardware`.
pub fn build_hand(cfg: &hand_config::Config, settings: HandSettings) -> eyre::Result<(Hand, Backend)> {
    #[cfg(all(feature = "hardware", target_os = "linux"))]
    {
        let hand = build_rpi(cfg, settings)?;
        Ok((hand, Backend::Rpi))
    }
    #[cfg(not(all(feature = "hardware", target_os = "linux")))]
    {
        let hand = build_sim(cfg, settings)?;
        Ok((hand, Backend::Sim))
    }
}

#[cfg_attr(all(feature = "hardware", target_os = "linux"), allow(dead_code))]
fn build_sim(cfg: &hand_config::Config, settings: HandSettings) -> eyre::Result<Hand> {
    use hand_hardware::{SimAdcModel, SimFinger, SimHand};
    use hand_traits::MonotonicClock;

    let fingers = settings
        .fingers
        .iter()
        .map(|c| SimFinger {
            channel: c.adc_channel,
            min_mm: c.min_position_mm,
            max_mm: c.max_position_mm,
            speed_mm_s: cfg.sim.speed_mm_s.unwrap_or(c.max_speed_mm_s),
            initial_mm: cfg
                .sim
                .initial_mm
                .unwrap_or(settings.control.initial_set_pos_mm),
        })
        .collect();
    let s = &settings.sensor;
    let model = SimAdcModel {
        mv_per_count: s.mv_per_count,
        mv_offset: s.mv_offset,
        mm_per_mv: s.mm_per_mv,
        mm_offset: s.mm_offset,
        disconnected_mv: s.disconnected_mv,
        ..SimAdcModel::default()
    };
    let clock = MonotonicClock::new();
    let sim = SimHand::new(fingers, model, clock);
    for name in &cfg.sim.jammed {
        let id = FingerId::from(*name);
        tracing::warn!(finger = %id, "sim: finger jammed");
        sim.jam(id.index(), true);
    }
    for name in &cfg.sim.disconnected {
        let id = FingerId::from(*name);
        tracing::warn!(finger = %id, "sim: sensor disconnected");
        sim.disconnect(id.index(), true);
    }
    let lines: [Box<dyn LinePair + Send>; 4] =
        std::array::from_fn(|i| Box::new(sim.lines(i)) as Box<dyn LinePair + Send>);
    Hand::builder()
        .with_input(sim.input())
        .with_lines(lines)
        .with_settings(settings)
        .with_clock(clock)
        .build()
}

#[cfg(all(feature = "hardware", target_os = "linux"))]
fn build_rpi(cfg: &hand_config::Config, settings: HandSettings) -> eyre::Result<Hand> {
    use hand_hardware::rpi::{Mcp3008, RpiLinePair};

    let hw = |e: hand_hardware::HwError| HandError::Hardware(e.to_string());
    let settings = rpi_settings(cfg, settings);
    let adc = Mcp3008::new(cfg.hardware.spi_slave, cfg.hardware.spi_clock_hz).map_err(hw)?;
    let [a, b, c, d] = &settings.fingers;
    let lines: [Box<dyn LinePair + Send>; 4] = [
        Box::new(RpiLinePair::new(a.upper_line, a.lower_line).map_err(hw)?),
        Box::new(RpiLinePair::new(b.upper_line, b.lower_line).map_err(hw)?),
        Box::new(RpiLinePair::new(c.upper_line, c.lower_line).map_err(hw)?),
        Box::new(RpiLinePair::new(d.upper_line, d.lower_line).map_err(hw)?),
    ];
    Hand::builder()
        .with_input(adc)
        .with_lines(lines)
        .with_settings(settings)
        .build()
}

/// The MCP3008 reports 10-bit counts; its scale replaces the sensor one.
#[cfg_attr(not(all(feature = "hardware", target_os = "linux")), allow(dead_code))]
fn rpi_settings(cfg: &hand_config::Config, mut settings: HandSettings) -> HandSettings {
    settings.sensor.mv_per_count = cfg.hardware.mv_per_count;
    settings
}

/// One feed line: `a,b,c,d` or a pose name/code. `Ok(None)` for poses that
/// carry no instruction (double tap, unknown).
pub fn parse_feed_line(line: &str, poses: &PoseMap) -> Result<Option<InstructionSnapshot>, HandError> {
    let line = line.trim();
    if line.contains(',') {
        return line.parse::<InstructionSnapshot>().map(Some);
    }
    let pose: Pose = line.parse()?;
    Ok(poses.instruction_for(pose))
}

fn initial_snapshot(opts: &RunOpts, poses: &PoseMap) -> Result<Option<InstructionSnapshot>, HandError> {
    if let Some(s) = &opts.instructions {
        return s.parse::<InstructionSnapshot>().map(Some);
    }
    if let Some(p) = &opts.pose {
        let pose: Pose = p.parse()?;
        let snap = poses.instruction_for(pose);
        if snap.is_none() {
            tracing::warn!(pose = pose.name(), "pose carries no instruction");
        }
        return Ok(snap);
    }
    Ok(None)
}

/// Forward stdin lines as snapshots until EOF or the receiver is gone.
fn spawn_stdin_feed(tx: xch::Sender<InstructionSnapshot>, poses: PoseMap) -> eyre::Result<()> {
    std::thread::Builder::new()
        .name("stdin-feed".into())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                if line.trim().is_empty() || line.trim_start().starts_with('#') {
                    continue;
                }
                match parse_feed_line(&line, &poses) {
                    Ok(Some(snap)) => {
                        if tx.send(snap).is_err() {
                            break;
                        }
                    }
                    Ok(None) => tracing::debug!(line = %line.trim(), "no instruction for pose"),
                    Err(e) => tracing::warn!(error = %e, line = %line.trim(), "ignoring feed line"),
                }
            }
            tracing::debug!("stdin feed closed");
        })
        .wrap_err("spawn stdin feed")?;
    Ok(())
}

pub fn cmd_run(hand: &Hand, opts: &RunOpts, json: bool) -> eyre::Result<()> {
    setup_rt_once(&opts.rt);

    let poses = hand.settings().poses.clone();
    let (tx, rx) = xch::unbounded();
    if let Some(snap) = initial_snapshot(opts, &poses)? {
        // The receiver is alive; this cannot fail.
        let _ = tx.send(snap);
    }
    if opts.stdin {
        spawn_stdin_feed(tx.clone(), poses)?;
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let flag = Arc::clone(&shutdown);
        ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed))
            .wrap_err("install ctrl-c handler")?;
    }

    let summary = hand_core::run_until(
        hand,
        rx,
        &shutdown,
        opts.duration_ms.map(Duration::from_millis),
    )?;
    drop(tx);
    print_summary(&summary, json);
    Ok(())
}

fn print_summary(summary: &RunSummary, json: bool) {
    if json {
        let fingers: Vec<_> = summary
            .fingers
            .iter()
            .map(|(id, rt)| {
                serde_json::json!({
                    "finger": id.name(),
                    "state": rt.state.as_str(),
                    "position_mm": rt.position_mm,
                    "last_set_pos_mm": rt.last_set_pos_mm,
                    "strokes": rt.stroke_num,
                    "stalling": rt.stalling,
                })
            })
            .collect();
        let obj = serde_json::json!({
            "elapsed_ms": summary.elapsed.as_millis() as u64,
            "fingers": fingers,
        });
        println!("{obj}");
        return;
    }
    println!("Run complete in {} ms", summary.elapsed.as_millis());
    for (id, rt) in &summary.fingers {
        let stall = if rt.stalling { "  STALLED" } else { "" };
        println!(
            "  {:<7} {:<8} pos {:>6.2} mm  target {:>6.2} mm  strokes {}{stall}",
            id.name(),
            rt.state.as_str(),
            rt.position_mm,
            rt.last_set_pos_mm,
            rt.stroke_num,
        );
    }
}

/// Read every finger once. Fails on the first unusable sensor.
pub fn cmd_self_check(hand: &Hand, json: bool) -> eyre::Result<()> {
    let results = hand.self_check();
    let mut failure: Option<HandError> = None;
    let mut rows = Vec::with_capacity(results.len());
    for (id, result) in results {
        match result {
            Ok(est) => {
                if let Some(fault @ (FingerFault::SensorFault | FingerFault::SpeedFault)) = est.fault {
                    failure.get_or_insert(HandError::Fault { finger: id, fault });
                }
                if json {
                    rows.push(serde_json::json!({
                        "finger": id.name(),
                        "state": est.state.as_str(),
                        "position_mm": est.position_mm,
                        "fault": est.fault.map(|f| f.to_string()),
                    }));
                } else {
                    match est.position_mm {
                        Some(mm) => println!("  {:<7} {:<8} {mm:.2} mm", id.name(), est.state.as_str()),
                        None => println!("  {:<7} {:<8} disconnected", id.name(), est.state.as_str()),
                    }
                }
            }
            Err(e) => {
                if json {
                    rows.push(serde_json::json!({ "finger": id.name(), "error": e.to_string() }));
                } else {
                    println!("  {:<7} error: {e}", id.name());
                }
                failure.get_or_insert(e);
            }
        }
    }
    if json {
        println!("{}", serde_json::json!({ "self_check": rows }));
    } else if failure.is_none() {
        println!("Self-check OK");
    }
    match failure {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

/// Always prints one JSON object; exits non-zero when the config is unusable.
pub fn cmd_health(cfg: Option<&hand_config::Config>, config_error: Option<&eyre::Report>) -> eyre::Result<()> {
    let backend = if cfg!(all(feature = "hardware", target_os = "linux")) {
        "rpi"
    } else {
        "sim"
    };
    let obj = serde_json::json!({
        "status": if config_error.is_none() { "ok" } else { "error" },
        "config_valid": config_error.is_none(),
        "backend": backend,
        "fingers": cfg.map_or(0, |_| FingerId::ALL.len()),
        "finger_overrides": cfg.map_or(0, |c| c.fingers.len()),
        "error": config_error.map(|e| e.to_string()),
    });
    println!("{obj}");
    match config_error {
        Some(e) => Err(eyre::eyre!("health check failed: {e}")),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("0.5,0.5,0.5,0.5", Some([0.5; 4]))]
    #[case("fist", Some([0.0; 4]))]
    #[case("wave-in", Some([1.0, 0.0, 0.0, 0.0]))]
    #[case("1", Some([0.0; 4]))]
    #[case("double_tap", None)]
    fn feed_lines(#[case] line: &str, #[case] expected: Option<[f64; 4]>) {
        let got = parse_feed_line(line, &PoseMap::default()).unwrap();
        assert_eq!(got.map(|s| s.0.map(|i| i.value())), expected);
    }

    #[test]
    fn rpi_backend_reads_full_stroke_and_disconnect_sentinel() {
        let cfg = hand_config::Config::default();
        let settings = rpi_settings(&cfg, HandSettings::try_from(&cfg).unwrap());
        let s = &settings.sensor;
        let mm = |raw: u16| (f64::from(raw) * s.mv_per_count + s.mv_offset) * s.mm_per_mv + s.mm_offset;
        for finger in &settings.fingers {
            assert!(mm(1023) > finger.max_position_mm, "{:?} unreachable", finger.id);
        }
        let sentinel_raw = (f64::from(s.disconnected_mv) / s.mv_per_count).round();
        assert_eq!((sentinel_raw * s.mv_per_count).round(), f64::from(s.disconnected_mv));
    }

    #[test]
    fn bad_feed_lines_are_errors() {
        assert!(parse_feed_line("0.5,0.5", &PoseMap::default()).is_err());
        assert!(parse_feed_line("1.5,0,0,0", &PoseMap::default()).is_err());
        assert!(parse_feed_line("thumbs_up", &PoseMap::default()).is_err());
    }
}
