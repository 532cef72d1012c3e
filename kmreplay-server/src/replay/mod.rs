//! Timed replay of datagram files.
//!
//! A session is started with [`ReplayEngine::start`] and runs on its own
//! thread. It walks the configured files in order, forwards the selected
//! datagram types over UDP, and captures installation, runtime and sound
//! speed datagrams into a [`DatagramTap`]. The returned [`ReplayHandle`]
//! cancels, re-paces and reports on the session.
//!
//! ```rust,no_run
//! use kmreplay_server::config::ReplayConfig;
//! use kmreplay_server::replay::{DatagramTap, ReplayEngine};
//! use std::time::Duration;
//!
//! let config = ReplayConfig {
//!     files: vec!["0000_20240611_123456_Ship.all".into()],
//!     ..Default::default()
//! };
//! let handle = ReplayEngine::start(config, DatagramTap::new()).unwrap();
//! handle.pace().lock().set(Duration::from_millis(200));
//! let status = handle.join().unwrap();
//! println!("forwarded {} datagrams", status.datagrams_forwarded);
//! ```

pub mod cancel;
pub mod engine;
pub mod pace;
pub mod status;
pub mod stream;
pub mod tap;

pub use cancel::CancelToken;
pub use engine::{timestamp_label, ReplayEngine, ReplayHandle};
pub use pace::{Pace, PaceGuard};
pub use status::{ReplayState, ReplayStatus};
pub use tap::{DatagramTap, TapCounts, TapReadGuard};
