//! Configuration management for herakles-dht-exporter.
//!
//! This module handles loading, merging, and validating configuration from files
//! and CLI arguments. It supports YAML, JSON, and TOML formats.

use crate::cli::{Args, ConfigFormat, LogLevel};
use crate::error::ExporterError;
use crate::sensor::{SensorKind, DEFAULT_RETRY_DELAY};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

// Default configuration constants
pub const DEFAULT_LISTEN_ADDR: &str = ":2112";
pub const DEFAULT_SENSOR_TYPE: u8 = 3;
pub const DEFAULT_SENSOR_PIN: u8 = 4;
pub const DEFAULT_MAX_RETRIES: u32 = 5;
pub const DEFAULT_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 10;

// Upper bounds accepted by validation
pub const MAX_INTERVAL_SECS: u64 = 24 * 60 * 60;
pub const MAX_RETRY_DELAY_MS: u64 = 60_000;
pub const MAX_SHUTDOWN_GRACE_SECS: u64 = 60 * 60;

/// How the sensor is reached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorBackend {
    /// Bit-banged single-wire protocol on a GPIO line
    #[default]
    Gpio,
    /// Synthetic readings, no hardware needed
    Simulated,
}

/// Exporter configuration. Unset fields fall back to the defaults above.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Sensor
    #[serde(alias = "sensor-type")]
    pub sensor_type: Option<u8>,
    #[serde(alias = "sensor-pin")]
    pub sensor_pin: Option<u8>,
    #[serde(alias = "sensor-max-retries")]
    pub sensor_max_retries: Option<u32>,
    #[serde(alias = "sensor-backend")]
    pub sensor_backend: Option<SensorBackend>,
    #[serde(alias = "retry-delay-ms")]
    pub retry_delay_ms: Option<u64>,
    /// Only used by the simulated backend (0.0-1.0)
    #[serde(alias = "simulated-failure-ratio")]
    pub simulated_failure_ratio: Option<f64>,

    // Sampling
    #[serde(alias = "interval-seconds", alias = "interval")]
    pub interval_seconds: Option<u64>,
    #[serde(alias = "enable-vpd")]
    pub enable_vpd: Option<bool>,

    // Server configuration
    #[serde(alias = "listen-addr")]
    pub listen_addr: Option<String>,
    pub namespace: Option<String>,
    #[serde(alias = "shutdown-grace-seconds")]
    pub shutdown_grace_seconds: Option<u64>,
    #[serde(alias = "enable-health")]
    pub enable_health: Option<bool>,

    // Logging
    #[serde(alias = "log-level")]
    pub log_level: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sensor_type: Some(DEFAULT_SENSOR_TYPE),
            sensor_pin: Some(DEFAULT_SENSOR_PIN),
            sensor_max_retries: Some(DEFAULT_MAX_RETRIES),
            sensor_backend: Some(SensorBackend::Gpio),
            retry_delay_ms: Some(DEFAULT_RETRY_DELAY.as_millis() as u64),
            simulated_failure_ratio: Some(0.0),
            interval_seconds: Some(DEFAULT_INTERVAL_SECS),
            enable_vpd: Some(true),
            listen_addr: Some(DEFAULT_LISTEN_ADDR.to_string()),
            namespace: None,
            shutdown_grace_seconds: Some(DEFAULT_SHUTDOWN_GRACE_SECS),
            enable_health: Some(true),
            log_level: Some("info".into()),
        }
    }
}

impl Config {
    pub fn sensor_kind(&self) -> Result<SensorKind, ExporterError> {
        let code = self.sensor_type.unwrap_or(DEFAULT_SENSOR_TYPE);
        SensorKind::from_code(code).ok_or_else(|| {
            ExporterError::config(format!(
                "Invalid sensor_type {}, expected 1 (DHT11), 2 (DHT12) or 3 (DHT22)",
                code
            ))
        })
    }

    pub fn max_retries(&self) -> u32 {
        self.sensor_max_retries.unwrap_or(DEFAULT_MAX_RETRIES)
    }

    pub fn retry_delay(&self) -> Duration {
        self.retry_delay_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_RETRY_DELAY)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds.unwrap_or(DEFAULT_INTERVAL_SECS))
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(
            self.shutdown_grace_seconds
                .unwrap_or(DEFAULT_SHUTDOWN_GRACE_SECS),
        )
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, ExporterError> {
        parse_listen_addr(self.listen_addr.as_deref().unwrap_or(DEFAULT_LISTEN_ADDR))
    }

    /// Namespace with empty strings treated as unset.
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref().filter(|ns| !ns.is_empty())
    }

    /// Age after which the last reading is considered stale by `/health`:
    /// three missed rounds, each allowed its full retry budget.
    /// Saturates at `Duration::MAX` for values validation would reject.
    pub fn stale_after(&self) -> Duration {
        self.retry_delay()
            .checked_mul(self.max_retries())
            .and_then(|budget| self.interval().checked_add(budget))
            .and_then(|round| round.checked_mul(3))
            .unwrap_or(Duration::MAX)
    }

    /// Effective log level from the config file value.
    pub fn log_level(&self) -> LogLevel {
        self.log_level
            .as_deref()
            .and_then(LogLevel::parse)
            .unwrap_or(LogLevel::Info)
    }
}

/// Parses a listen address. A bare `:port` binds all IPv4 interfaces.
pub fn parse_listen_addr(addr: &str) -> Result<SocketAddr, ExporterError> {
    let addr = addr.trim();
    let candidate = if addr.starts_with(':') {
        format!("0.0.0.0{}", addr)
    } else {
        addr.to_string()
    };

    if let Ok(parsed) = candidate.parse::<SocketAddr>() {
        return Ok(parsed);
    }

    // Host names such as "localhost:2112"
    candidate
        .to_socket_addrs()
        .ok()
        .and_then(|mut addrs| addrs.next())
        .ok_or_else(|| {
            ExporterError::config(format!(
                "Invalid listen_addr '{}', expected host:port or :port",
                addr
            ))
        })
}

fn is_valid_namespace(ns: &str) -> bool {
    let mut chars = ns.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), ExporterError> {
    cfg.sensor_kind()?;

    match cfg.interval_seconds {
        Some(0) => {
            return Err(ExporterError::config("interval_seconds must be at least 1"));
        }
        Some(secs) if secs > MAX_INTERVAL_SECS => {
            return Err(ExporterError::config(format!(
                "interval_seconds {} too large, maximum is {}",
                secs, MAX_INTERVAL_SECS
            )));
        }
        _ => {}
    }

    if let Some(ms) = cfg.retry_delay_ms.filter(|ms| *ms > MAX_RETRY_DELAY_MS) {
        return Err(ExporterError::config(format!(
            "retry_delay_ms {} too large, maximum is {}",
            ms, MAX_RETRY_DELAY_MS
        )));
    }

    match cfg.shutdown_grace_seconds {
        Some(0) => {
            return Err(ExporterError::config(
                "shutdown_grace_seconds must be at least 1",
            ));
        }
        Some(secs) if secs > MAX_SHUTDOWN_GRACE_SECS => {
            return Err(ExporterError::config(format!(
                "shutdown_grace_seconds {} too large, maximum is {}",
                secs, MAX_SHUTDOWN_GRACE_SECS
            )));
        }
        _ => {}
    }

    if let Some(ratio) = cfg.simulated_failure_ratio {
        if !(0.0..=1.0).contains(&ratio) {
            return Err(ExporterError::config(format!(
                "simulated_failure_ratio {} out of range, expected 0.0-1.0",
                ratio
            )));
        }
    }

    if let Some(ns) = cfg.namespace() {
        if !is_valid_namespace(ns) {
            return Err(ExporterError::config(format!(
                "Invalid namespace '{}', only [a-zA-Z0-9_] allowed and it must not start with a digit",
                ns
            )));
        }
    }

    if let Some(level) = cfg.log_level.as_deref() {
        if LogLevel::parse(level).is_none() {
            return Err(ExporterError::config(format!(
                "Invalid log_level '{}', expected off/error/warn/info/debug/trace",
                level
            )));
        }
    }

    cfg.listen_addr()?;

    Ok(())
}

/// Resolves configuration from CLI args, config file, and defaults.
/// This enforces precedence: CLI (if provided) > config file > default.
pub fn resolve_config(args: &Args) -> Result<Config, ExporterError> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    // Sensor settings
    if let Some(sensor_type) = args.sensor_type {
        config.sensor_type = Some(sensor_type);
    }
    if let Some(pin) = args.sensor_pin {
        config.sensor_pin = Some(pin);
    }
    if let Some(retries) = args.sensor_max_retries {
        config.sensor_max_retries = Some(retries);
    }
    if let Some(delay) = args.retry_delay_ms {
        config.retry_delay_ms = Some(delay);
    }
    if args.simulate {
        config.sensor_backend = Some(SensorBackend::Simulated);
    }

    // Sampling
    if let Some(interval) = args.interval {
        config.interval_seconds = Some(interval);
    }
    if args.disable_vpd {
        config.enable_vpd = Some(false);
    }

    // Server
    if let Some(addr) = &args.listen_addr {
        config.listen_addr = Some(addr.clone());
    }
    if let Some(ns) = &args.namespace {
        config.namespace = Some(ns.clone());
    }
    if let Some(grace) = args.shutdown_grace {
        config.shutdown_grace_seconds = Some(grace);
    }
    if args.disable_health {
        config.enable_health = Some(false);
    }

    // Logging: -v wins over --log-level, which wins over the file
    let cli_level = match args.verbose {
        0 => args.log_level,
        1 => Some(LogLevel::Debug),
        _ => Some(LogLevel::Trace),
    };
    if let Some(level) = cli_level {
        config.log_level = Some(level.as_str().to_string());
    }

    Ok(config)
}

/// Loads a config file, or the first default location that exists.
/// Falls back to built-in defaults when no file is found.
pub fn load_config(path: Option<&Path>) -> Result<Config, ExporterError> {
    let path = if let Some(p) = path {
        if !p.exists() {
            return Err(ExporterError::config(format!(
                "Config file not found: {}",
                p.display()
            )));
        }
        p.to_path_buf()
    } else {
        // Try default locations
        let defaults = [
            "/etc/herakles/dht-exporter.yaml",
            "/etc/herakles/dht-exporter.yml",
            "/etc/herakles/dht-exporter.json",
            "./herakles-dht-exporter.yaml",
            "./herakles-dht-exporter.yml",
            "./herakles-dht-exporter.json",
        ];

        match defaults.iter().find(|p| Path::new(p).exists()) {
            Some(found) => PathBuf::from(found),
            None => return Ok(Config::default()),
        }
    };

    let content = fs::read_to_string(&path).map_err(|e| {
        ExporterError::config(format!("Cannot read {}: {}", path.display(), e))
    })?;

    let parse_error =
        |e: &dyn std::fmt::Display| ExporterError::config(format!("{}: {}", path.display(), e));

    let config: Config = match path.extension().and_then(|s| s.to_str()) {
        Some("json") => serde_json::from_str(&content).map_err(|e| parse_error(&e))?,
        Some("toml") => toml::from_str(&content).map_err(|e| parse_error(&e))?,
        // Default to YAML
        _ => serde_yaml::from_str(&content).map_err(|e| parse_error(&e))?,
    };
    info!("Loaded configuration from: {}", path.display());

    Ok(config.with_defaults())
}

impl Config {
    /// Fills unset fields from [`Config::default`].
    pub fn with_defaults(self) -> Self {
        let d = Config::default();
        Self {
            sensor_type: self.sensor_type.or(d.sensor_type),
            sensor_pin: self.sensor_pin.or(d.sensor_pin),
            sensor_max_retries: self.sensor_max_retries.or(d.sensor_max_retries),
            sensor_backend: self.sensor_backend.or(d.sensor_backend),
            retry_delay_ms: self.retry_delay_ms.or(d.retry_delay_ms),
            simulated_failure_ratio: self.simulated_failure_ratio.or(d.simulated_failure_ratio),
            interval_seconds: self.interval_seconds.or(d.interval_seconds),
            enable_vpd: self.enable_vpd.or(d.enable_vpd),
            listen_addr: self.listen_addr.or(d.listen_addr),
            namespace: self.namespace.or(d.namespace),
            shutdown_grace_seconds: self.shutdown_grace_seconds.or(d.shutdown_grace_seconds),
            enable_health: self.enable_health.or(d.enable_health),
            log_level: self.log_level.or(d.log_level),
        }
    }
}

/// Renders configuration in the requested format.
pub fn render_config(config: &Config, format: &ConfigFormat) -> anyhow::Result<String> {
    let output = match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    };
    Ok(output)
}

/// Shows configuration in requested format
pub fn show_config(config: &Config, format: &ConfigFormat) -> anyhow::Result<()> {
    println!("{}", render_config(config, format)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> Args {
        Args {
            no_config: true,
            ..Args::default()
        }
    }

    #[test]
    fn test_defaults_are_valid() {
        let cfg = Config::default();
        validate_effective_config(&cfg).unwrap();
        assert_eq!(cfg.sensor_kind().unwrap(), SensorKind::Dht22);
        assert_eq!(cfg.max_retries(), 5);
        assert_eq!(cfg.interval(), Duration::from_secs(5));
        assert_eq!(cfg.shutdown_grace(), Duration::from_secs(10));
        assert_eq!(
            cfg.listen_addr().unwrap(),
            "0.0.0.0:2112".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    fn test_parse_listen_addr_variants() {
        assert_eq!(
            parse_listen_addr(":9100").unwrap(),
            "0.0.0.0:9100".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(
            parse_listen_addr("127.0.0.1:8080").unwrap(),
            "127.0.0.1:8080".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(
            parse_listen_addr("[::1]:2112").unwrap(),
            "[::1]:2112".parse::<SocketAddr>().unwrap()
        );
        assert!(parse_listen_addr("2112").is_err());
        assert!(parse_listen_addr(":notaport").is_err());
    }

    #[test]
    fn test_rejects_unknown_sensor_type() {
        let cfg = Config {
            sensor_type: Some(7),
            ..Config::default()
        };
        let err = validate_effective_config(&cfg).unwrap_err();
        assert!(err.to_string().contains("Invalid sensor_type 7"));
    }

    #[test]
    fn test_sensor_type_is_a_numeric_code() {
        let cfg: Config = serde_yaml::from_str("sensor-type: 1").unwrap();
        assert_eq!(cfg.sensor_kind().unwrap(), SensorKind::Dht11);
        assert!(serde_yaml::from_str::<Config>("sensor_type: dht22").is_err());
    }

    #[test]
    fn test_rejects_zero_interval_and_grace() {
        let cfg = Config {
            interval_seconds: Some(0),
            ..Config::default()
        };
        assert!(validate_effective_config(&cfg).is_err());

        let cfg = Config {
            shutdown_grace_seconds: Some(0),
            ..Config::default()
        };
        assert!(validate_effective_config(&cfg).is_err());
    }

    #[test]
    fn test_namespace_validation() {
        for ok in ["dht", "dht_22", "_x"] {
            let cfg = Config {
                namespace: Some(ok.into()),
                ..Config::default()
            };
            assert!(validate_effective_config(&cfg).is_ok(), "{ok}");
        }
        for bad in ["22dht", "dht-sensor", "dht:x"] {
            let cfg = Config {
                namespace: Some(bad.into()),
                ..Config::default()
            };
            assert!(validate_effective_config(&cfg).is_err(), "{bad}");
        }
        let cfg = Config {
            namespace: Some(String::new()),
            ..Config::default()
        };
        assert_eq!(cfg.namespace(), None);
    }

    #[test]
    fn test_cli_overrides_defaults() {
        let args = Args {
            sensor_type: Some(1),
            sensor_max_retries: Some(2),
            interval: Some(15),
            listen_addr: Some("127.0.0.1:9000".into()),
            simulate: true,
            disable_vpd: true,
            ..self::args()
        };
        let cfg = resolve_config(&args).unwrap();
        assert_eq!(cfg.sensor_kind().unwrap(), SensorKind::Dht11);
        assert_eq!(cfg.max_retries(), 2);
        assert_eq!(cfg.interval(), Duration::from_secs(15));
        assert_eq!(cfg.sensor_backend, Some(SensorBackend::Simulated));
        assert_eq!(cfg.enable_vpd, Some(false));
        assert_eq!(cfg.listen_addr().unwrap().port(), 9000);
    }

    #[test]
    fn test_verbose_overrides_log_level() {
        let args = Args {
            verbose: 1,
            log_level: Some(LogLevel::Warn),
            ..self::args()
        };
        assert_eq!(resolve_config(&args).unwrap().log_level(), LogLevel::Debug);

        let args = Args {
            log_level: Some(LogLevel::Warn),
            ..self::args()
        };
        assert_eq!(resolve_config(&args).unwrap().log_level(), LogLevel::Warn);
    }

    #[test]
    fn test_stale_after_covers_retry_budget() {
        let cfg = Config {
            interval_seconds: Some(10),
            retry_delay_ms: Some(1000),
            sensor_max_retries: Some(5),
            ..Config::default()
        };
        assert_eq!(cfg.stale_after(), Duration::from_secs(45));
    }

    #[test]
    fn test_huge_durations_are_rejected_and_saturate() {
        let cfg = Config {
            interval_seconds: Some(u64::MAX),
            ..Config::default()
        };
        let err = validate_effective_config(&cfg).unwrap_err();
        assert!(err.to_string().contains("interval_seconds"), "{err}");
        assert_eq!(cfg.stale_after(), Duration::MAX);

        let cfg = Config {
            retry_delay_ms: Some(u64::MAX),
            sensor_max_retries: Some(u32::MAX),
            ..Config::default()
        };
        assert!(validate_effective_config(&cfg).is_err());
        assert_eq!(cfg.stale_after(), Duration::MAX);

        let cfg = Config {
            shutdown_grace_seconds: Some(u64::MAX),
            ..Config::default()
        };
        assert!(validate_effective_config(&cfg).is_err());

        let cfg = Config {
            interval_seconds: Some(MAX_INTERVAL_SECS),
            retry_delay_ms: Some(MAX_RETRY_DELAY_MS),
            sensor_max_retries: Some(u32::MAX),
            ..Config::default()
        };
        validate_effective_config(&cfg).unwrap();
        assert!(cfg.stale_after() < Duration::MAX);
    }

    #[test]
    fn test_render_formats() {
        let cfg = Config::default();
        assert!(render_config(&cfg, &ConfigFormat::Yaml)
            .unwrap()
            .contains("listen_addr"));
        assert!(render_config(&cfg, &ConfigFormat::Json)
            .unwrap()
            .contains("\"sensor_type\": 3"));
        assert!(render_config(&cfg, &ConfigFormat::Toml)
            .unwrap()
            .contains("interval_seconds = 5"));
    }
}
