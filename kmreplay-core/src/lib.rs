//! # kmreplay core
//!
//! Platform-independent framing library for Kongsberg EM-series multibeam
//! datagram streams (`.all` files).
//!
//! This crate contains pure parsing logic with **no threads, sockets or
//! logging**. The replay runtime lives in `kmreplay-server`.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  kmreplay-core (no threads, no sockets)                     │
//! │  ├── protocol/kongsberg  (wire layout, types, checksum)     │
//! │  └── reader              (DatagramReader, ParseOutcome)     │
//! └─────────────────────────────────────────────────────────────┘
//!                 ▲
//!    ┌────────────┴────────────────────────────┐
//!    │  kmreplay-server                        │
//!    │  (FileStream, ReplayEngine, UDP, tap)   │
//!    └─────────────────────────────────────────┘
//! ```
//!
//! ## Example: Walking a Datagram Stream
//!
//! ```rust
//! use kmreplay_core::protocol::kongsberg::{encode_datagram, DG_POSITION};
//! use kmreplay_core::{DatagramReader, ParseOutcome};
//! use std::io::Cursor;
//!
//! let bytes = encode_datagram(DG_POSITION, 2040, 20240611, 0, &[0u8; 32]);
//! let size = bytes.len() as u64;
//! let mut cursor = Cursor::new(bytes);
//!
//! match DatagramReader::parse(&mut cursor, size).unwrap() {
//!     ParseOutcome::Valid(dg) => assert_eq!(dg.kind().as_str(), "position"),
//!     other => panic!("unexpected outcome: {}", other),
//! }
//! ```

pub mod error;
pub mod protocol;
pub mod reader;

pub use error::ParseError;
pub use protocol::kongsberg::{CaptureKind, Datagram, DatagramType};
pub use reader::{DatagramReader, ParseOutcome};
