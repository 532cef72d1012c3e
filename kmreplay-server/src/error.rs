//! Errors that end a replay session.
//!
//! Structural problems inside a datagram file never show up here; the engine
//! handles those by realigning or skipping the file.

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReplayError {
    /// A replay file could not be opened
    #[error("Unable to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Reading or seeking inside an open replay file failed
    #[error("I/O error while reading {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The output socket could not be created
    #[error("Failed to create output socket: {0}")]
    Socket(#[source] io::Error),

    /// The destination host/port did not resolve to an address
    #[error("Invalid destination {host}:{port}")]
    Destination { host: String, port: u16 },

    /// Sending a datagram on the output socket failed
    #[error("Failed to send datagram to {addr}: {source}")]
    Send {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// The worker thread could not be started
    #[error("Failed to spawn replay worker: {0}")]
    Spawn(#[source] io::Error),

    /// The worker thread panicked
    #[error("Replay worker panicked")]
    WorkerPanicked,

    /// Configuration is missing or inconsistent
    #[error("Invalid configuration: {0}")]
    Config(String),
}
