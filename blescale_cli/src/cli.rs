//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::OnceLock;

use blescale_traits::WakeCause;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "blescale", version, about = "BLE weighing node")]
pub struct Cli {
    /// Path to the board profile TOML; a missing file means built-in defaults
    #[arg(long, value_name = "FILE", default_value = "etc/blescale.toml")]
    pub board: PathBuf,

    /// Log and report errors as JSON
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); overrides [logging].level
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum WakeCauseArg {
    /// Power-on reset
    Cold,
    /// Timer wake from deep sleep
    DeepSleep,
}

impl From<WakeCauseArg> for WakeCause {
    fn from(arg: WakeCauseArg) -> Self {
        match arg {
            WakeCauseArg::Cold => WakeCause::ColdBoot,
            WakeCauseArg::DeepSleep => WakeCause::DeepSleep,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the node; stdin lines are delivered as writes to the RX characteristic
    Run {
        /// Reset cause of the first boot
        #[arg(long, value_enum, default_value = "cold")]
        wake_cause: WakeCauseArg,
        /// Awake windows to run; each later one starts as a deep-sleep wake
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        cycles: u32,
        /// Simulated raw load cell level (counts)
        #[arg(long, value_name = "COUNTS", default_value_t = 0.0, allow_negative_numbers = true)]
        raw: f64,
        /// Simulated jitter amplitude (counts)
        #[arg(long, value_name = "COUNTS", default_value_t = 0.0)]
        noise: f64,
        /// Simulated chip temperature in Celsius
        #[arg(long, value_name = "C", default_value_t = 25.0, allow_negative_numbers = true)]
        chip_temperature: f64,
        /// Carry the boot temperature in the last advertisement byte
        #[arg(long, action = ArgAction::SetTrue)]
        embed_temperature: bool,
    },
    /// Apply command lines to the persisted configuration and print the replies
    Send {
        /// Lines such as `scale=2.0` or `interval?`
        #[arg(required = true, value_name = "LINE")]
        lines: Vec<String>,
    },
    /// Print the advertisement packet for a weight as hex
    Encode {
        /// Weight in kilograms
        #[arg(long, allow_negative_numbers = true)]
        kg: f64,
        /// Chip temperature in Celsius, carried in the last reserved byte
        #[arg(long, value_name = "C", allow_negative_numbers = true)]
        temperature: Option<f64>,
    },
    /// Print the effective persisted configuration as JSON
    Show,
    /// Verify the board profile and the storage location
    SelfCheck,
}
