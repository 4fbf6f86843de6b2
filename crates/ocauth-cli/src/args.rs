use clap::{Parser, ValueEnum};
use log::LevelFilter;
use ocauth::Severity;
use std::path::PathBuf;

/// Replay a scripted VPN authentication negotiation through the ocauth driver.
#[derive(Parser, Debug)]
#[command(name = "ocauth")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Args {
    /// Scenario file (JSON) describing the engine's behaviour
    pub scenario: PathBuf,

    /// Session configuration file (JSON); overrides the scenario's session
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// VPN protocol (anyconnect, nc, gp, pulse, f5, fortinet, array)
    #[arg(short, long)]
    pub protocol: Option<String>,

    /// VPN server URL; a bare host gets https://
    #[arg(short, long)]
    pub url: Option<String>,

    /// Disable DTLS and use TLS only
    #[arg(long)]
    pub no_dtls: bool,

    /// Maximum number of authentication forms to answer
    #[arg(long)]
    pub max_forms: Option<usize>,

    /// Value for fields whose name contains "user" or "name"
    #[arg(long)]
    pub user: Option<String>,

    /// Value for fields whose name contains "pass" or "secret"
    #[arg(long)]
    pub password: Option<String>,

    /// Base32 TOTP secret used for token fields
    #[arg(long)]
    pub otp_secret: Option<String>,

    /// PIN sent ahead of the current TOTP code in password fields
    #[arg(long, requires = "otp_secret", conflicts_with = "password")]
    pub pin: Option<String>,

    /// Answer remaining fields from the system keyring entries of ACCOUNT
    #[arg(long, value_name = "ACCOUNT")]
    pub keyring: Option<String>,

    /// Store --password, --pin and --otp-secret under the --keyring account first
    #[arg(long, requires = "keyring")]
    pub save_keyring: bool,

    /// Exact field value, as NAME=VALUE (repeatable)
    #[arg(long = "field", value_name = "NAME=VALUE", value_parser = parse_field)]
    pub fields: Vec<(String, String)>,

    /// Prompt on the terminal for anything not given on the command line
    #[arg(short, long)]
    pub interactive: bool,

    /// Where engine progress is written
    #[arg(long, value_enum, default_value_t = ProgressOutput::Stdio)]
    pub progress: ProgressOutput,

    /// Most verbose engine progress shown on stdio
    #[arg(long, value_enum, default_value_t = ProgressLevel::Info)]
    pub progress_level: ProgressLevel,

    /// Log level for the driver itself
    #[arg(short, long, value_enum, default_value_t = LogLevel::Info)]
    pub level: LogLevel,
}

fn parse_field(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
        _ => Err(format!("expected NAME=VALUE, got '{}'", raw)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProgressOutput {
    /// Errors to stderr, everything else to stdout
    Stdio,
    /// Through the logger
    Log,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProgressLevel {
    Error,
    Info,
    Debug,
    Trace,
}

impl From<ProgressLevel> for Severity {
    fn from(level: ProgressLevel) -> Self {
        match level {
            ProgressLevel::Error => Severity::Error,
            ProgressLevel::Info => Severity::Info,
            ProgressLevel::Debug => Severity::Debug,
            ProgressLevel::Trace => Severity::Trace,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}
