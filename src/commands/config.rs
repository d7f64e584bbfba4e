//! Config command implementation.
//!
//! Generates configuration files in various formats.

use std::fs;
use std::path::PathBuf;

use crate::cli::ConfigFormat;
use crate::config::{render_config, Config};

/// Generates configuration files.
pub fn command_config(
    output: Option<PathBuf>,
    format: ConfigFormat,
    commented: bool,
) -> anyhow::Result<()> {
    let config = Config::default();
    let output = match output {
        Some(path) => path,
        None => PathBuf::from("herakles-dht-exporter.yaml"),
    };

    let mut content = render_config(&config, &format)?;
    if commented && matches!(format, ConfigFormat::Yaml) {
        content = add_config_comments(content);
    }

    if output.to_string_lossy() == "-" {
        print!("{}", content);
    } else {
        fs::write(&output, content)?;
        println!("✅ Configuration written to: {}", output.display());
    }

    Ok(())
}

/// Adds comments to YAML configuration.
fn add_config_comments(yaml: String) -> String {
    let comments = r#"# Herakles DHT Exporter Configuration
# ===================================
#
# Sensor
# ------
# sensor_type: 3               # 1 = DHT11, 2 = DHT12, 3 = DHT22/AM2302
# sensor_pin: 4                # GPIO pin (BCM numbering)
# sensor_max_retries: 5        # Retries per sampling round
# sensor_backend: gpio         # gpio or simulated
# retry_delay_ms: 1500         # Pause between retries
# simulated_failure_ratio: 0.0 # Share of failed reads (simulated backend only)
#
# Sampling
# --------
# interval_seconds: 5          # Seconds between sampling rounds
# enable_vpd: true             # Export vapor_pressure_deficit_kpa
#
# Server Configuration
# --------------------
# listen_addr: ":2112"         # host:port, ":port" listens on all interfaces
# namespace: null              # Metric name prefix, e.g. "dht"
# shutdown_grace_seconds: 10   # Time allowed for in-flight requests on shutdown
# enable_health: true          # Enable /health endpoint
#
# Logging
# -------
# log_level: "info"            # off, error, warn, info, debug, trace
"#;

    format!("{comments}\n{yaml}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config;
    use tempfile::tempdir;

    #[test]
    fn test_generated_yaml_loads_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("exporter.yaml");

        command_config(Some(path.clone()), ConfigFormat::Yaml, true).unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("# Herakles DHT Exporter Configuration"));

        let loaded = load_config(Some(&path)).unwrap();
        assert_eq!(loaded.sensor_type, Some(3));
        assert_eq!(loaded.listen_addr.as_deref(), Some(":2112"));
    }

    #[test]
    fn test_generated_toml_loads_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("exporter.toml");

        command_config(Some(path.clone()), ConfigFormat::Toml, false).unwrap();

        let loaded = load_config(Some(&path)).unwrap();
        assert_eq!(loaded.interval_seconds, Some(5));
        assert_eq!(loaded.shutdown_grace_seconds, Some(10));
    }
}
