use std::path::PathBuf;
use std::time::Duration;

use pokegen_core::address::BackendAddress;
use pokegen_core::artifact::DOWNLOAD_FILE_NAME;
use pokegen_session::SessionConfig;

/// Default seconds between status polls.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 20;
/// Default expected generation time in seconds (7 minutes).
pub const DEFAULT_EXPECTED_DURATION_SECS: u64 = 420;
/// Default location of the persisted session state.
pub const DEFAULT_SESSION_FILE: &str = ".pokegen-session.json";

/// Client configuration loaded from environment variables.
///
/// | Env Var                  | Default                  |
/// |--------------------------|--------------------------|
/// | `POKEGEN_BACKEND`        | -- (or `--backend`)      |
/// | `POLL_INTERVAL_SECS`     | `20`                     |
/// | `EXPECTED_DURATION_SECS` | `420`                    |
/// | `PREFLIGHT_HEALTH`       | `true`                   |
/// | `SESSION_FILE`           | `.pokegen-session.json`  |
/// | `OUTPUT_FILE`            | `generated_pokemon.png`  |
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Raw backend address as entered; normalized on use.
    pub backend: Option<String>,
    pub poll_interval: Duration,
    pub expected_duration: Duration,
    pub preflight_health: bool,
    pub session_file: PathBuf,
    pub output_file: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} has invalid value '{value}': {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error("{0}")]
    Backend(#[from] pokegen_core::error::CoreError),
}

impl ClientConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`, so tests need not touch the
    /// process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let backend = lookup("POKEGEN_BACKEND").filter(|v| !v.trim().is_empty());

        let poll_interval_secs =
            parse_u64(&lookup, "POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL_SECS)?;
        if poll_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                var: "POLL_INTERVAL_SECS",
                value: "0".into(),
                reason: "must be at least 1",
            });
        }
        let expected_secs =
            parse_u64(&lookup, "EXPECTED_DURATION_SECS", DEFAULT_EXPECTED_DURATION_SECS)?;

        let preflight_health = match lookup("PREFLIGHT_HEALTH") {
            None => true,
            Some(v) => parse_bool(&v).ok_or(ConfigError::Invalid {
                var: "PREFLIGHT_HEALTH",
                value: v,
                reason: "expected true/false",
            })?,
        };

        let session_file = lookup("SESSION_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SESSION_FILE));
        let output_file = lookup("OUTPUT_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DOWNLOAD_FILE_NAME));

        Ok(Self {
            backend,
            poll_interval: Duration::from_secs(poll_interval_secs),
            expected_duration: Duration::from_secs(expected_secs),
            preflight_health,
            session_file,
            output_file,
        })
    }

    /// Normalized backend address. Fails when none was configured.
    pub fn backend_address(&self) -> Result<BackendAddress, ConfigError> {
        Ok(BackendAddress::parse(self.backend.as_deref().unwrap_or(""))?)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            expected_duration: self.expected_duration,
            preflight_health: self.preflight_health,
        }
    }
}

fn parse_u64(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: u64,
) -> Result<u64, ConfigError> {
    match lookup(var) {
        None => Ok(default),
        Some(v) => v.trim().parse().map_err(|_| ConfigError::Invalid {
            var,
            value: v,
            reason: "expected a whole number of seconds",
        }),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<ClientConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ClientConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_without_env() {
        let c = config(&[]).unwrap();
        assert!(c.backend.is_none());
        assert_eq!(c.poll_interval, Duration::from_secs(20));
        assert_eq!(c.expected_duration, Duration::from_secs(420));
        assert!(c.preflight_health);
        assert_eq!(c.session_file, PathBuf::from(".pokegen-session.json"));
        assert_eq!(c.output_file, PathBuf::from("generated_pokemon.png"));
    }

    #[test]
    fn reads_overrides() {
        let c = config(&[
            ("POKEGEN_BACKEND", "10.0.0.4"),
            ("POLL_INTERVAL_SECS", "30"),
            ("EXPECTED_DURATION_SECS", "600"),
            ("PREFLIGHT_HEALTH", "off"),
            ("OUTPUT_FILE", "out.png"),
        ])
        .unwrap();
        assert_eq!(c.backend_address().unwrap().as_str(), "http://10.0.0.4:8000");
        assert_eq!(c.poll_interval, Duration::from_secs(30));
        assert_eq!(c.session_config().expected_duration, Duration::from_secs(600));
        assert!(!c.session_config().preflight_health);
        assert_eq!(c.output_file, PathBuf::from("out.png"));
    }

    #[test]
    fn invalid_number_is_rejected() {
        let err = config(&[("POLL_INTERVAL_SECS", "soon")]).unwrap_err();
        assert!(err.to_string().contains("POLL_INTERVAL_SECS"));
    }

    #[test]
    fn zero_interval_is_rejected() {
        assert!(config(&[("POLL_INTERVAL_SECS", "0")]).is_err());
    }

    #[test]
    fn invalid_bool_is_rejected() {
        assert!(config(&[("PREFLIGHT_HEALTH", "maybe")]).is_err());
    }

    #[test]
    fn missing_backend_asks_for_address() {
        let err = config(&[]).unwrap().backend_address().unwrap_err();
        assert!(err.to_string().contains("backend address"));
    }
}
