//! CLI arguments and subcommands for herakles-dht-exporter.
//!
//! This module defines the command-line interface structure using the clap library,
//! including all flags, options, and subcommands.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Parses a config file value such as `"debug"`.
    pub fn parse(value: &str) -> Option<Self> {
        <Self as ValueEnum>::from_str(value.trim(), true).ok()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Configuration format options for output
#[derive(Debug, Clone, Default, ValueEnum)]
pub enum ConfigFormat {
    #[default]
    Yaml,
    Json,
    Toml,
}

/// Main CLI arguments structure
#[derive(Parser, Debug, Default)]
#[command(
    name = "herakles-dht-exporter",
    about = "Prometheus exporter for DHT temperature and humidity sensors",
    long_about = "Prometheus exporter for DHT temperature and humidity sensors.\n\n\
                  Periodically samples a DHT11, DHT12 or DHT22/AM2302 sensor with bounded \
                  retries and serves the latest temperature, humidity and derived vapor \
                  pressure deficit on /metrics.",
    author = "Michael Moll <exporter@herakles.now> - Herakles",
    version = "0.1.0",
    propagate_version = true,
    after_help = "Project: https://github.com/cansp-dev/herakles-dht-exporter — More info: https://www.herakles.now — Support: exporter@herakles.now"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Show verbose debug information (-vv for trace)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    /// Log level
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// DHT sensor type (1 = DHT11, 2 = DHT12, 3 = DHT22/AM2302)
    #[arg(long)]
    pub sensor_type: Option<u8>,

    /// DHT sensor GPIO pin (BCM numbering)
    #[arg(long)]
    pub sensor_pin: Option<u8>,

    /// Maximum sensor retries per sampling round
    #[arg(long)]
    pub sensor_max_retries: Option<u32>,

    /// Pause between two retries of one sampling round (milliseconds)
    #[arg(long)]
    pub retry_delay_ms: Option<u64>,

    /// Listen address:port (":2112" listens on all interfaces)
    #[arg(short = 'l', long)]
    pub listen_addr: Option<String>,

    /// Interval between measurements in seconds
    #[arg(long)]
    pub interval: Option<u64>,

    /// Prefix for all exported metric names (e.g. "dht")
    #[arg(long)]
    pub namespace: Option<String>,

    /// Do not export the vapor pressure deficit gauge
    #[arg(long)]
    pub disable_vpd: bool,

    /// Use a simulated sensor instead of GPIO
    #[arg(long)]
    pub simulate: bool,

    /// Seconds allowed for in-flight requests during shutdown
    #[arg(long)]
    pub shutdown_grace: Option<u64>,

    /// Disable /health endpoint
    #[arg(long)]
    pub disable_health: bool,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,
}

/// Subcommands for additional functionality
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Read the sensor and print the measurements
    Read {
        /// Number of sampling rounds
        #[arg(short = 'n', long, default_value_t = 1)]
        iterations: usize,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,
    },

    /// Generate configuration files
    Config {
        /// Output file path ("-" for stdout)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,

        /// Include comments and examples
        #[arg(long)]
        commented: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbose_is_counted() {
        let args = Args::parse_from(["herakles-dht-exporter", "-vv"]);
        assert_eq!(args.verbose, 2);
        assert!(args.log_level.is_none());
    }

    #[test]
    fn test_sensor_flags() {
        let args = Args::parse_from([
            "herakles-dht-exporter",
            "--sensor-type",
            "1",
            "--sensor-pin",
            "17",
            "--sensor-max-retries",
            "8",
            "-l",
            "127.0.0.1:9000",
            "--interval",
            "15",
        ]);
        assert_eq!(args.sensor_type, Some(1));
        assert_eq!(args.sensor_pin, Some(17));
        assert_eq!(args.sensor_max_retries, Some(8));
        assert_eq!(args.listen_addr.as_deref(), Some("127.0.0.1:9000"));
        assert_eq!(args.interval, Some(15));
    }

    #[test]
    fn test_read_subcommand() {
        let args = Args::parse_from(["herakles-dht-exporter", "--simulate", "read", "-n", "3"]);
        assert!(args.simulate);
        match args.command {
            Some(Commands::Read { iterations, .. }) => assert_eq!(iterations, 3),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_log_level_parse() {
        assert_eq!(LogLevel::parse("DEBUG"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::parse("nope"), None);
        assert_eq!(LogLevel::Warn.as_str(), "warn");
    }
}
