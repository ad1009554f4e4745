// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Server identity configuration: `Key=value` text, not JSON.

use std::fmt;
use std::fs;
use std::path::Path;

/// The server's own identity: display name, MAC-like identifier, and bound ports.
/// Immutable after load.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub name: String,
    pub mac: String,
    pub tcp_port: u16,
    pub udp_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "SERVER".to_string(),
            mac: "000000000000".to_string(),
            tcp_port: 6000,
            udp_port: 6001,
        }
    }
}

impl ServerConfig {
    /// Loads `Key=value` lines from `path`. Unknown keys are ignored; recognized
    /// keys override the corresponding [`Default`] field. Whitespace around `=`
    /// is ignored.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.display().to_string(), e.to_string()))?;

        let mut config = Self::default();
        for raw in content.lines() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim();
            match key {
                "Name" => config.name = value.to_string(),
                "MAC" => config.mac = value.to_string(),
                "TCP-port" => {
                    config.tcp_port = value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue(format!("TCP-port: {:?}", value)))?
                }
                "UDP-port" => {
                    config.udp_port = value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue(format!("UDP-port: {:?}", value)))?
                }
                _ => {}
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() || self.name.len() > 8 {
            return Err(ConfigError::InvalidValue(format!(
                "Name must be 1..=8 chars, got {:?}",
                self.name
            )));
        }
        if self.mac.len() != 12 || !self.mac.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ConfigError::InvalidValue(format!(
                "MAC must be 12 hex chars, got {:?}",
                self.mac
            )));
        }
        if self.tcp_port == 0 {
            return Err(ConfigError::InvalidValue("TCP-port cannot be 0".into()));
        }
        if self.udp_port == 0 {
            return Err(ConfigError::InvalidValue("UDP-port cannot be 0".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub enum ConfigError {
    Io(String, String),
    InvalidValue(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(path, e) => write!(f, "failed to read config {}: {}", path, e),
            Self::InvalidValue(s) => write!(f, "invalid config value: {}", s),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    #[test]
    fn parses_recognized_keys_and_ignores_unknown_ones() {
        let f = write_config(
            "Name = CTRL-SRV\nMAC=AABBCCDDEEFF\nTCP-port = 6000\nUDP-port=6001\nBogus=ignored\n",
        );
        let config = ServerConfig::from_file(f.path()).unwrap();
        assert_eq!(config.name, "CTRL-SRV");
        assert_eq!(config.mac, "AABBCCDDEEFF");
        assert_eq!(config.tcp_port, 6000);
        assert_eq!(config.udp_port, 6001);
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let f = write_config("Name=ONLY-NAME\n");
        let config = ServerConfig::from_file(f.path()).unwrap();
        assert_eq!(config.name, "ONLY-NAME");
        assert_eq!(config.tcp_port, ServerConfig::default().tcp_port);
    }

    #[test]
    fn rejects_out_of_range_port() {
        let f = write_config("TCP-port=not-a-number\n");
        assert!(ServerConfig::from_file(f.path()).is_err());
    }

    #[test]
    fn rejects_malformed_mac() {
        let f = write_config("MAC=too-short\n");
        assert!(ServerConfig::from_file(f.path()).is_err());
    }

    #[test]
    fn default_config_validates() {
        assert!(ServerConfig::default().validate().is_ok());
    }
}
