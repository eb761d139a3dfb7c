//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "hand", version, about = "Myoelectric hand controller")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/hand_config.toml")]
    pub config: PathBuf,

    /// Optional sensor calibration CSV (strict `mv,mm` header)
    #[arg(long, value_name = "FILE")]
    pub calibration: Option<PathBuf>,

    /// Log and report as JSON lines instead of pretty text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

/// Memory locking mode for real-time operation.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum RtLock {
    /// Do not lock memory
    None,
    /// Lock currently resident pages
    Current,
    /// Lock current and future pages
    All,
}

impl RtLock {
    #[inline]
    pub fn os_default() -> Self {
        if cfg!(target_os = "linux") {
            RtLock::Current
        } else {
            RtLock::None
        }
    }
}

/// Real-time knobs shared by the commands that drive actuators.
#[derive(clap::Args, Debug, Clone, Copy)]
pub struct RtArgs {
    /// Enable real-time mode (SCHED_FIFO, affinity, mlockall)
    #[arg(
        long,
        action = ArgAction::SetTrue,
        long_help = "Enable real-time mode on supported OSes.\n\nLinux: Attempts SCHED_FIFO priority, pins to one CPU, and calls mlockall to keep the process resident. Pulse timing depends on prompt wake-ups, so this lowers actuation jitter on a loaded system. May require elevated privileges or ulimits (e.g., memlock).\n\nmacOS: Only mlockall is applied."
    )]
    pub rt: bool,
    /// Real-time priority for SCHED_FIFO on Linux (1..=max); ignored on macOS
    #[arg(long, value_name = "PRIO")]
    pub rt_prio: Option<i32>,
    /// Select memory locking mode for --rt: none, current, or all
    #[arg(long, value_enum, value_name = "MODE")]
    pub rt_lock: Option<RtLock>,
    /// CPU index to pin the process to (Linux only). Defaults to 0.
    #[arg(long, value_name = "CPU")]
    pub rt_cpu: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the control loop and the stall observer
    Run {
        /// Instruction snapshot `index,middle,ring,little`, each in [0,1]
        #[arg(long, value_name = "A,B,C,D", conflicts_with = "pose")]
        instructions: Option<String>,
        /// Pose name (rest, fist, wave-in, wave-out, fingers-spread) or numeric code
        #[arg(long, value_name = "POSE")]
        pose: Option<String>,
        /// Read further snapshots or poses from stdin, one per line
        #[arg(long, action = ArgAction::SetTrue)]
        stdin: bool,
        /// Stop after this many milliseconds (default: run until ctrl-c)
        #[arg(long, value_name = "MS")]
        duration_ms: Option<u64>,
        #[command(flatten)]
        rt: RtArgs,
    },
    /// Read every finger once and report its state
    SelfCheck,
    /// Health check for operational monitoring
    Health,
}
