//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the converger.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Name of the liveness marker kept next to the active configuration.
pub const MARKER_FILE_NAME: &str = "haproxy-lastupdated.txt";

/// Subdirectory of the config directory holding certificate material.
pub const CERTS_DIR_NAME: &str = "certs.d";

/// Root configuration for the converger.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ControllerConfig {
    /// The managed HAProxy instance.
    pub haproxy: HaproxyConfig,

    /// Deadlines for subprocesses and control-socket round trips.
    pub timeouts: TimeoutConfig,

    /// Facts about the machine this converger runs on.
    pub instance: InstanceConfig,

    /// Where desired state is read from.
    pub source: SourceConfig,

    /// Convergence cadence.
    pub schedule: ScheduleConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub admin: AdminConfig,
}

/// Static settings of the managed HAProxy process.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HaproxyConfig {
    /// Path to the haproxy binary, used for `-c -f` syntax checks.
    pub binary: String,

    /// Directory holding the active configuration, certs and static files.
    pub config_path: PathBuf,

    /// File name of the active configuration inside `config_path`.
    pub config_name: String,

    /// Command run after a changed configuration is committed.
    /// Split on whitespace, no shell interpretation. Empty disables reloads.
    pub reload_command: String,

    /// Glob pattern resolving to the stats socket(s).
    pub socket: String,
}

impl HaproxyConfig {
    /// Full path of the active configuration file.
    pub fn active_config(&self) -> PathBuf {
        self.config_path.join(&self.config_name)
    }

    /// Directory certificates are materialized into.
    pub fn certs_dir(&self) -> PathBuf {
        self.config_path.join(CERTS_DIR_NAME)
    }

    /// Liveness marker touched on every applied change.
    pub fn marker_file(&self) -> PathBuf {
        self.config_path.join(MARKER_FILE_NAME)
    }
}

impl Default for HaproxyConfig {
    fn default() -> Self {
        Self {
            binary: "/usr/sbin/haproxy".to_string(),
            config_path: PathBuf::from("/etc/haproxy"),
            config_name: "haproxy.cfg".to_string(),
            reload_command: String::new(),
            socket: "/var/run/haproxy/*.sock".to_string(),
        }
    }
}

/// Timeout configuration for blocking operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Deadline for `haproxy -c` in seconds.
    pub syntax_check_secs: u64,

    /// Deadline for the reload command in seconds.
    pub reload_secs: u64,

    /// Deadline for one control-socket round trip in seconds.
    pub socket_secs: u64,
}

impl TimeoutConfig {
    pub fn syntax_check(&self) -> Duration {
        Duration::from_secs(self.syntax_check_secs)
    }

    pub fn reload(&self) -> Duration {
        Duration::from_secs(self.reload_secs)
    }

    pub fn socket(&self) -> Duration {
        Duration::from_secs(self.socket_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            syntax_check_secs: 30,
            reload_secs: 60,
            socket_secs: 5,
        }
    }
}

/// Local instance information.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct InstanceConfig {
    /// Availability zone matched by `LocalEndpoints` in templates.
    pub availability_zone: String,
}

/// Desired-state source configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SourceConfig {
    /// JSON runtime snapshot produced by the configuration distribution side.
    pub runtime_config: PathBuf,

    /// Converge as soon as the snapshot changes on disk.
    pub watch: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            runtime_config: PathBuf::from("/var/lib/haproxy-converger/runtime.json"),
            watch: true,
        }
    }
}

/// Convergence cadence.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Seconds between two scheduled convergences.
    pub interval_secs: u64,
}

impl ScheduleConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self { interval_secs: 10 }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Pretty output for terminals, JSON for log shipping.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_toml_uses_defaults() {
        let config: ControllerConfig = toml::from_str(
            r#"
            [haproxy]
            config_path = "/srv/haproxy"
            reload_command = "systemctl reload haproxy"
            "#,
        )
        .unwrap();

        assert_eq!(config.haproxy.binary, "/usr/sbin/haproxy");
        assert_eq!(config.haproxy.config_name, "haproxy.cfg");
        assert_eq!(
            config.haproxy.active_config(),
            PathBuf::from("/srv/haproxy/haproxy.cfg")
        );
        assert_eq!(config.timeouts.socket(), Duration::from_secs(5));
        assert_eq!(config.observability.log_format, LogFormat::Pretty);
        assert!(!config.admin.enabled);
    }

    #[test]
    fn test_derived_paths() {
        let haproxy = HaproxyConfig {
            config_path: PathBuf::from("/etc/lb"),
            ..HaproxyConfig::default()
        };
        assert_eq!(haproxy.certs_dir(), PathBuf::from("/etc/lb/certs.d"));
        assert_eq!(
            haproxy.marker_file(),
            PathBuf::from("/etc/lb/haproxy-lastupdated.txt")
        );
    }

    #[test]
    fn test_json_log_format() {
        let config: ControllerConfig = toml::from_str(
            r#"
            [observability]
            log_format = "json"
            "#,
        )
        .unwrap();
        assert_eq!(config.observability.log_format, LogFormat::Json);
    }
}
