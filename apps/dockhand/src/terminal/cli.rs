use clap::{Args, Parser};
use dockhand_sdk::DEFAULT_RECONNECT_DELAY;
use std::path::PathBuf;
use std::time::Duration;

use crate::telemetry::logging::{Console, LogConfig, LogLevel};

#[derive(Parser, Debug)]
#[command(
    name = "dockhand",
    about = "Terminal chat client for the warehouse receiving assistant",
    author,
    version = concat!(env!("CARGO_PKG_VERSION"), "-", env!("BUILD_TIMESTAMP"))
)]
pub struct Cli {
    #[arg(
        long,
        env = "DOCKHAND_SERVER",
        default_value = "http://127.0.0.1:5000",
        help = "Base URL of the assistant backend"
    )]
    pub server: String,

    #[arg(
        long = "reconnect-delay-ms",
        env = "DOCKHAND_RECONNECT_DELAY_MS",
        value_name = "MILLIS",
        default_value_t = DEFAULT_RECONNECT_DELAY.as_millis() as u64,
        help = "Delay before reopening a dropped notification stream"
    )]
    pub reconnect_delay_ms: u64,

    #[arg(
        long = "request-timeout-secs",
        env = "DOCKHAND_REQUEST_TIMEOUT_SECS",
        value_name = "SECS",
        default_value_t = 120,
        help = "Upper bound on a single chat turn"
    )]
    pub request_timeout_secs: u64,

    #[arg(
        long = "attach-clipboard",
        help = "Attach the clipboard image (if any) to each issue description"
    )]
    pub attach_clipboard: bool,

    #[arg(
        long,
        help = "Line mode instead of the full-screen UI (implied when not on a TTY)"
    )]
    pub plain: bool,

    #[command(flatten)]
    pub logging: LoggingArgs,
}

impl Cli {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Args, Debug, Clone)]
pub struct LoggingArgs {
    #[arg(
        long = "log-level",
        value_enum,
        env = "DOCKHAND_LOG_LEVEL",
        default_value_t = LogLevel::Warn,
        help = "Minimum log level (error, warn, info, debug, trace)"
    )]
    pub level: LogLevel,

    #[arg(
        long = "log-file",
        value_name = "PATH",
        env = "DOCKHAND_LOG_FILE",
        help = "Write structured logs to the specified file"
    )]
    pub file: Option<PathBuf>,
}

impl LoggingArgs {
    pub fn to_config(&self, console: Console) -> LogConfig {
        LogConfig {
            level: self.level,
            file: self.file.clone(),
            console,
        }
    }
}
