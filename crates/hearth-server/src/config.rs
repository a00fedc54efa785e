//! JSON server configuration.
//!
//! The config file lives at a caller-supplied path and is parsed with
//! serde. Every field has a default, so a partial document works; keys the
//! schema does not list are ignored. A missing file is an error, since the
//! path was given explicitly.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error reading config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The JSON content could not be parsed into the schema.
    #[error("failed to parse config JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Runtime configuration of the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// TCP bind port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Status-response text shown in the server list.
    #[serde(default = "default_motd")]
    pub motd: String,
    /// Connection cap; logins past it are refused.
    #[serde(default = "default_max_players")]
    pub max_players: u32,
    /// Whether logins run the encryption handshake and session-server
    /// verification. When off, the client-claimed username is trusted.
    #[serde(default = "default_online_mode")]
    pub online_mode: bool,
    /// Payload-size threshold for frame compression. Negative disables
    /// compression entirely.
    #[serde(default = "default_compression_threshold")]
    pub compression_threshold: i32,
    /// Interval between KeepAlive emissions in the Play state.
    #[serde(default = "default_keepalive_interval_ms")]
    pub keepalive_interval_ms: u32,
    /// Maximum time a KeepAlive may go unanswered before disconnect.
    #[serde(default = "default_keepalive_timeout_ms")]
    pub keepalive_timeout_ms: u32,
    /// Maximum time from accept to LoginSuccess.
    #[serde(default = "default_login_timeout_ms")]
    pub login_timeout_ms: u32,
}

fn default_port() -> u16 {
    25565
}
fn default_motd() -> String {
    "A Hearth Server".to_string()
}
fn default_max_players() -> u32 {
    20
}
fn default_online_mode() -> bool {
    true
}
fn default_compression_threshold() -> i32 {
    256
}
fn default_keepalive_interval_ms() -> u32 {
    20_000
}
fn default_keepalive_timeout_ms() -> u32 {
    30_000
}
fn default_login_timeout_ms() -> u32 {
    30_000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            motd: default_motd(),
            max_players: default_max_players(),
            online_mode: default_online_mode(),
            compression_threshold: default_compression_threshold(),
            keepalive_interval_ms: default_keepalive_interval_ms(),
            keepalive_timeout_ms: default_keepalive_timeout_ms(),
            login_timeout_ms: default_login_timeout_ms(),
        }
    }
}

impl ServerConfig {
    /// Loads the configuration from `path`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Io`] when the file cannot be read and
    /// [`ConfigError::Parse`] when the JSON is malformed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    /// The compression threshold as the frame pipeline wants it: `None`
    /// when compression is disabled.
    pub fn compression(&self) -> Option<usize> {
        usize::try_from(self.compression_threshold).ok()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_matches_vanilla_expectations() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.port, 25565);
        assert_eq!(cfg.max_players, 20);
        assert!(cfg.online_mode);
        assert_eq!(cfg.compression_threshold, 256);
        assert_eq!(cfg.keepalive_interval_ms, 20_000);
        assert_eq!(cfg.keepalive_timeout_ms, 30_000);
    }

    #[test]
    fn test_empty_document_uses_all_defaults() {
        let cfg: ServerConfig = serde_json::from_str("{}").expect("parse");
        assert_eq!(cfg, ServerConfig::default());
    }

    #[test]
    fn test_partial_document_overrides_only_named_keys() {
        let cfg: ServerConfig =
            serde_json::from_str(r#"{"port": 25570, "online_mode": false}"#).expect("parse");
        assert_eq!(cfg.port, 25570);
        assert!(!cfg.online_mode);
        assert_eq!(cfg.motd, "A Hearth Server");
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let cfg: ServerConfig =
            serde_json::from_str(r#"{"motd": "hi", "render_distance": 12}"#).expect("parse");
        assert_eq!(cfg.motd, "hi");
    }

    #[test]
    fn test_negative_threshold_disables_compression() {
        let cfg: ServerConfig =
            serde_json::from_str(r#"{"compression_threshold": -1}"#).expect("parse");
        assert_eq!(cfg.compression(), None);

        let cfg = ServerConfig::default();
        assert_eq!(cfg.compression(), Some(256));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = ServerConfig::load("/nonexistent/hearth.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_load_malformed_json_is_parse_error() {
        let dir = std::env::temp_dir().join(format!("hearth_cfg_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = ServerConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_round_trip_through_json() {
        let mut cfg = ServerConfig::default();
        cfg.motd = "round trip".to_string();
        cfg.max_players = 7;
        let text = serde_json::to_string_pretty(&cfg).unwrap();
        let restored: ServerConfig = serde_json::from_str(&text).unwrap();
        assert_eq!(cfg, restored);
    }
}
