//! Replay configuration.
//!
//! Values come from an optional JSON file (explicit `--config`, or
//! `config.json` in the platform config directory) and are then overridden by
//! command line arguments.

use std::fs::File;
use std::io::BufReader;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::ReplayError;

pub const DEFAULT_IP_OUT: &str = "127.0.0.1";
pub const DEFAULT_PORT_OUT: u16 = 26103;
pub const DEFAULT_PACE_SECS: f64 = 1.0;
pub const DEFAULT_SEND_BUFFER_SIZE: usize = 1 << 16;
pub const DEFAULT_MAX_REALIGNMENTS: u32 = 1024;

pub fn get_project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "hydroffice", "kmreplay")
}

/// `config.json` in the platform config directory, if it exists
pub fn default_config_path() -> Option<PathBuf> {
    let path = get_project_dirs()?.config_dir().join("config.json");
    path.is_file().then_some(path)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReplayConfig {
    /// Datagram files, replayed in order
    pub files: Vec<PathBuf>,
    /// Destination host name or address
    pub ip_out: String,
    /// Destination UDP port
    pub port_out: u16,
    /// Delay after each forwarded datagram, in seconds
    pub pace_secs: f64,
    /// SO_SNDBUF for the output socket
    pub send_buffer_size: usize,
    /// Realignments allowed per file before it is abandoned
    pub max_realignments: u32,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            files: Vec::new(),
            ip_out: DEFAULT_IP_OUT.to_string(),
            port_out: DEFAULT_PORT_OUT,
            pace_secs: DEFAULT_PACE_SECS,
            send_buffer_size: DEFAULT_SEND_BUFFER_SIZE,
            max_realignments: DEFAULT_MAX_REALIGNMENTS,
        }
    }
}

impl ReplayConfig {
    /// Load a JSON configuration file
    pub fn load(path: &Path) -> Result<Self, ReplayError> {
        let file = File::open(path).map_err(|e| ReplayError::Open {
            path: path.to_owned(),
            source: e,
        })?;
        serde_json::from_reader(BufReader::new(file))
            .map_err(|e| ReplayError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn validate(&self) -> Result<(), ReplayError> {
        if self.files.is_empty() {
            return Err(ReplayError::Config("no input files".to_string()));
        }
        if Duration::try_from_secs_f64(self.pace_secs).is_err() {
            return Err(ReplayError::Config(format!(
                "pace must be a finite, non-negative number of seconds, got {}",
                self.pace_secs
            )));
        }
        if self.send_buffer_size == 0 {
            return Err(ReplayError::Config("send buffer size must be positive".to_string()));
        }
        Ok(())
    }

    pub fn pace(&self) -> Duration {
        Duration::try_from_secs_f64(self.pace_secs).unwrap_or(Duration::ZERO)
    }

    /// Resolve `ip_out:port_out`, preferring an IPv4 address
    pub fn destination(&self) -> Result<SocketAddr, ReplayError> {
        let unresolved = || ReplayError::Destination {
            host: self.ip_out.clone(),
            port: self.port_out,
        };
        let addrs: Vec<SocketAddr> = (self.ip_out.as_str(), self.port_out)
            .to_socket_addrs()
            .map_err(|_| unresolved())?
            .collect();

        addrs
            .iter()
            .find(|a| a.is_ipv4())
            .or(addrs.first())
            .copied()
            .ok_or_else(unresolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ReplayConfig::default();
        assert_eq!(config.port_out, 26103);
        assert_eq!(config.pace(), Duration::from_secs(1));
        assert_eq!(config.send_buffer_size, 65536);
    }

    #[test]
    fn test_load_partial_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"portOut": 4001, "paceSecs": 0.25, "files": ["a.all"]}}"#).unwrap();

        let config = ReplayConfig::load(file.path()).unwrap();
        assert_eq!(config.port_out, 4001);
        assert_eq!(config.pace(), Duration::from_millis(250));
        assert_eq!(config.files, vec![PathBuf::from("a.all")]);
        assert_eq!(config.ip_out, DEFAULT_IP_OUT);
    }

    #[test]
    fn test_load_invalid_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        assert!(matches!(
            ReplayConfig::load(file.path()),
            Err(ReplayError::Config(_))
        ));
    }

    #[test]
    fn test_validate() {
        let mut config = ReplayConfig::default();
        assert!(config.validate().is_err());

        config.files.push(PathBuf::from("a.all"));
        assert!(config.validate().is_ok());

        config.pace_secs = -1.0;
        assert!(config.validate().is_err());

        config.pace_secs = f64::NAN;
        assert!(config.validate().is_err());

        config.pace_secs = 1e30;
        assert!(config.validate().is_err());

        config.pace_secs = 0.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_destination_resolves_localhost() {
        let config = ReplayConfig {
            ip_out: "localhost".to_string(),
            ..Default::default()
        };
        let addr = config.destination().unwrap();
        assert!(addr.ip().is_loopback());
        assert_eq!(addr.port(), DEFAULT_PORT_OUT);
    }
}
