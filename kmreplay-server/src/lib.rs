//! # kmreplay
//!
//! Replays recorded Kongsberg EM datagram files over UDP, at a controlled
//! pace, so that acquisition software can be exercised without a live sonar.
//!
//! ## Architecture
//!
//! Framing and validation of datagrams live in [`kmreplay_core`], which does
//! no I/O of its own beyond a `Read + Seek` source. This crate owns the
//! files, the output socket and the worker thread.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    kmreplay-server                      │
//! │  ┌─────────────┐       ┌──────────────────────────────┐ │
//! │  │ Cli/config  │──────▶│ ReplayEngine::start          │ │
//! │  └─────────────┘       └──────────────┬───────────────┘ │
//! │                                       ▼                 │
//! │  ┌─────────────────────────────────────────────────────┐│
//! │  │              worker thread "REP"                    ││
//! │  │  FileStream ─▶ DatagramReader ─▶ type filter        ││
//! │  │                      │                │             ││
//! │  │              realign / skip      UDP send ─▶ pace   ││
//! │  │                                       │             ││
//! │  │                                 DatagramTap         ││
//! │  └─────────────────────────────────────────────────────┘│
//! │         ▲                                               │
//! │  ReplayHandle: cancel, pace, status, join               │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Command-Line Interface
//!
//! See [`Cli`] for all available options. Key options:
//!
//! - `FILES...` - datagram files, replayed in the given order
//! - `--ip`, `-p, --port` - destination (default: 127.0.0.1:26103)
//! - `--pace` - seconds to wait after each forwarded datagram (default: 1)
//! - `-c, --config` - JSON configuration file
//! - `-v` - Increase verbosity (use multiple times)

use clap::Parser;
use std::path::PathBuf;

pub mod config;
pub mod error;
pub mod network;
pub mod replay;

use config::{default_config_path, ReplayConfig};
use error::ReplayError;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser, Clone, Debug)]
#[command(version, about = "Replay Kongsberg EM datagram files over UDP")]
pub struct Cli {
    #[clap(flatten)]
    pub verbose: clap_verbosity_flag::Verbosity<clap_verbosity_flag::InfoLevel>,

    /// Datagram files to replay, in order
    pub files: Vec<PathBuf>,

    /// Destination host name or address
    #[arg(long)]
    pub ip: Option<String>,

    /// Destination UDP port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Seconds to wait after each forwarded datagram
    #[arg(long)]
    pub pace: Option<f64>,

    /// Realignments allowed per file before it is skipped
    #[arg(long)]
    pub max_realignments: Option<u32>,

    /// JSON configuration file; defaults to config.json in the user config directory
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Build the replay configuration: file values first, then command line
    /// overrides on top
    pub fn to_config(&self) -> Result<ReplayConfig, ReplayError> {
        let mut config = match self.config.clone().or_else(default_config_path) {
            Some(path) => {
                log::info!("Loading configuration from {}", path.display());
                ReplayConfig::load(&path)?
            }
            None => ReplayConfig::default(),
        };

        if !self.files.is_empty() {
            config.files = self.files.clone();
        }
        if let Some(ip) = &self.ip {
            config.ip_out = ip.clone();
        }
        if let Some(port) = self.port {
            config.port_out = port;
        }
        if let Some(pace) = self.pace {
            config.pace_secs = pace;
        }
        if let Some(max) = self.max_realignments {
            config.max_realignments = max;
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_cli_overrides_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"files": ["from_file.all"], "ipOut": "10.0.0.1", "portOut": 4000, "paceSecs": 2.0}}"#
        )
        .unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let cli = Cli::parse_from(["kmreplay", "-c", &path, "-p", "5000", "--pace", "0.1"]);
        let config = cli.to_config().unwrap();

        assert_eq!(config.files, vec![PathBuf::from("from_file.all")]);
        assert_eq!(config.ip_out, "10.0.0.1");
        assert_eq!(config.port_out, 5000);
        assert_eq!(config.pace_secs, 0.1);
    }

    #[test]
    fn test_cli_files_replace_config_files() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"files": ["from_file.all"]}}"#).unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let cli = Cli::parse_from(["kmreplay", "--config", &path, "a.all", "b.all"]);
        let config = cli.to_config().unwrap();
        assert_eq!(
            config.files,
            vec![PathBuf::from("a.all"), PathBuf::from("b.all")]
        );
    }

    #[test]
    fn test_cli_rejects_negative_pace() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{}}").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let cli = Cli::parse_from(["kmreplay", "-c", &path, "--pace=-1", "a.all"]);
        assert!(matches!(cli.to_config(), Err(ReplayError::Config(_))));
    }

    #[test]
    fn test_cli_missing_config_file() {
        let cli = Cli::parse_from(["kmreplay", "-c", "/nonexistent/kmreplay.json", "a.all"]);
        assert!(matches!(cli.to_config(), Err(ReplayError::Open { .. })));
    }
}
