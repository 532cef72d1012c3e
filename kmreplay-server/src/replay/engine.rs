//! Replay worker - walks datagram files and re-emits them over UDP.

use chrono::{NaiveDate, NaiveTime};
use log::{debug, error, info, trace, warn};
use std::net::{SocketAddr, UdpSocket};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use kmreplay_core::protocol::kongsberg::{
    verify_checksum, END_REALIGN_OFFSET, MIN_HEADER_SIZE, START_REALIGN_BACKTRACK,
};
use kmreplay_core::{Datagram, ParseOutcome};

use super::cancel::CancelToken;
use super::pace::Pace;
use super::status::{ReplayState, ReplayStatus, SessionStats};
use super::stream::FileStream;
use super::tap::DatagramTap;
use crate::config::ReplayConfig;
use crate::error::ReplayError;
use crate::network::new_output_socket;

/// Name of the replay worker thread
pub const WORKER_NAME: &str = "REP";

/// Entry point for replay sessions
pub struct ReplayEngine;

impl ReplayEngine {
    /// Validate `config`, open the output socket and start the worker thread.
    ///
    /// Accepted installation, runtime and sound speed datagrams are appended
    /// to `tap`. The session ends on its own after the last file; it is never
    /// restarted, start a new one instead.
    pub fn start(config: ReplayConfig, tap: DatagramTap) -> Result<ReplayHandle, ReplayError> {
        config.validate()?;
        let destination = config.destination()?;
        let socket =
            new_output_socket(&destination, config.send_buffer_size).map_err(ReplayError::Socket)?;

        let pace = Arc::new(Pace::new(config.pace()));
        let cancel = CancelToken::new();
        let stats = Arc::new(SessionStats::new());

        let worker = ReplayWorker {
            files: config.files,
            socket,
            destination,
            max_realignments: config.max_realignments,
            pace: pace.clone(),
            cancel: cancel.clone(),
            tap: tap.clone(),
            stats: stats.clone(),
        };

        let thread = thread::Builder::new()
            .name(WORKER_NAME.to_string())
            .spawn(move || worker.run())
            .map_err(ReplayError::Spawn)?;

        Ok(ReplayHandle {
            cancel,
            pace,
            tap,
            stats,
            thread: Some(thread),
        })
    }
}

/// Control surface of a running replay session.
///
/// Dropping the handle cancels the session without waiting for it.
pub struct ReplayHandle {
    cancel: CancelToken,
    pace: Arc<Pace>,
    tap: DatagramTap,
    stats: Arc<SessionStats>,
    thread: Option<JoinHandle<Result<(), ReplayError>>>,
}

impl ReplayHandle {
    /// Ask the worker to stop. Safe to call any number of times, including
    /// after the session has ended.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// A clone of the cancellation token, e.g. for a signal handler
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Replay pacing; see [`Pace::lock`]
    pub fn pace(&self) -> &Pace {
        &self.pace
    }

    pub fn tap(&self) -> &DatagramTap {
        &self.tap
    }

    pub fn status(&self) -> ReplayStatus {
        self.stats.snapshot()
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, |t| t.is_finished())
    }

    /// Wait for the worker to end and report how the session went
    pub fn join(mut self) -> Result<ReplayStatus, ReplayError> {
        let result = match self.thread.take() {
            Some(thread) => thread.join().unwrap_or_else(|_| {
                self.stats.set_state(ReplayState::Failed);
                Err(ReplayError::WorkerPanicked)
            }),
            None => Ok(()),
        };
        result.map(|()| self.stats.snapshot())
    }
}

impl Drop for ReplayHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// How processing of one file ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileEnd {
    Completed,
    Abandoned,
    Cancelled,
}

struct ReplayWorker {
    files: Vec<PathBuf>,
    socket: UdpSocket,
    destination: SocketAddr,
    max_realignments: u32,
    pace: Arc<Pace>,
    cancel: CancelToken,
    tap: DatagramTap,
    stats: Arc<SessionStats>,
}

impl ReplayWorker {
    fn run(self) -> Result<(), ReplayError> {
        info!(
            "{} started -> out {}, timing: {:?}, files: {}",
            WORKER_NAME,
            self.destination,
            self.pace.lock().get(),
            self.files.len()
        );

        let result = self.replay_files();
        self.stats.set_current_file(None);

        match &result {
            Ok(()) if self.cancel.is_cancelled() => {
                self.stats.set_state(ReplayState::Cancelled);
                info!("{} cancelled", WORKER_NAME);
            }
            Ok(()) => {
                self.stats.set_state(ReplayState::Finished);
                info!("{} ended", WORKER_NAME);
            }
            Err(e) => {
                self.stats.set_state(ReplayState::Failed);
                error!("{} failed: {}", WORKER_NAME, e);
            }
        }
        result
    }

    fn replay_files(&self) -> Result<(), ReplayError> {
        for path in &self.files {
            if self.cancel.is_cancelled() {
                break;
            }

            let mut stream = FileStream::open(path)?;
            info!(
                "open file: {} [{}KB]",
                path.display(),
                stream.size() / 1024
            );
            self.stats.set_current_file(Some(path.clone()));

            match self.replay_file(&mut stream)? {
                FileEnd::Completed => SessionStats::bump(&self.stats.files_completed),
                FileEnd::Abandoned => SessionStats::bump(&self.stats.files_abandoned),
                FileEnd::Cancelled => break,
            }
        }
        Ok(())
    }

    fn replay_file(&self, stream: &mut FileStream) -> Result<FileEnd, ReplayError> {
        let mut accepted = 0u64;
        let mut realignments = 0u32;

        let end = loop {
            if self.cancel.is_cancelled() {
                break FileEnd::Cancelled;
            }

            match stream.remaining()? {
                0 => {
                    debug!("EOF");
                    break FileEnd::Completed;
                }
                remaining if remaining < MIN_HEADER_SIZE as u64 => {
                    warn!(
                        "troubles in reading {} > SKIP (reason: truncated header, {}B left)",
                        stream.path().display(),
                        remaining
                    );
                    break FileEnd::Abandoned;
                }
                _ => {}
            }

            let datagram = match stream.parse()? {
                ParseOutcome::Valid(datagram) => datagram,
                ParseOutcome::MissingStartMarker => {
                    let position = stream.position()?;
                    warn!(
                        "troubles in reading {} at {} > SKIP (reason: missing start marker)",
                        stream.path().display(),
                        position
                    );
                    break FileEnd::Abandoned;
                }
                ParseOutcome::UnexpectedEndOfFile => {
                    warn!(
                        "troubles in reading {} > SKIP (reason: unexpected EOF)",
                        stream.path().display()
                    );
                    break FileEnd::Abandoned;
                }
                ParseOutcome::CorruptedStartFraming => {
                    let target = stream.position()?.saturating_sub(START_REALIGN_BACKTRACK);
                    match self.realign(stream, &mut realignments, target)? {
                        Some(end) => break end,
                        None => {
                            debug!(
                                "troubles in reading initial datagram part > REALIGN to position: {}",
                                target
                            );
                            continue;
                        }
                    }
                }
                ParseOutcome::CorruptedEndFraming(datagram) => {
                    let target = datagram.offset + datagram.length as u64 + END_REALIGN_OFFSET;
                    match self.realign(stream, &mut realignments, target)? {
                        Some(end) => break end,
                        None => {
                            debug!(
                                "troubles in reading final datagram part > REALIGN to position: {}",
                                target
                            );
                            continue;
                        }
                    }
                }
            };

            accepted += 1;
            SessionStats::bump(&self.stats.datagrams_accepted);

            let kind = datagram.kind();
            if !kind.is_forwarded() {
                trace!("{} > skipping dg {}", timestamp_label(&datagram), kind);
                SessionStats::bump(&self.stats.datagrams_discarded);
                continue;
            }

            self.forward(stream, &datagram)?;
        };

        debug!(
            "data loaded from {} > datagrams: {}",
            stream.path().display(),
            accepted
        );
        Ok(end)
    }

    /// Reposition after corrupted framing. `Some(end)` means the file is done.
    fn realign(
        &self,
        stream: &mut FileStream,
        realignments: &mut u32,
        target: u64,
    ) -> Result<Option<FileEnd>, ReplayError> {
        if *realignments >= self.max_realignments {
            warn!(
                "troubles in reading {} > SKIP (reason: more than {} realignments)",
                stream.path().display(),
                self.max_realignments
            );
            return Ok(Some(FileEnd::Abandoned));
        }
        *realignments += 1;
        SessionStats::bump(&self.stats.realignments);

        if !stream.realign_to(target)? {
            debug!("EOF after realignment to {}", target);
            return Ok(Some(FileEnd::Completed));
        }
        Ok(None)
    }

    fn forward(&self, stream: &mut FileStream, datagram: &Datagram) -> Result<(), ReplayError> {
        let kind = datagram.kind();
        let raw = stream.read_raw(datagram)?;
        debug!(
            "{} > sending dg {} (length: {}B)",
            timestamp_label(datagram),
            kind,
            raw.len()
        );
        if let Ok(false) = verify_checksum(&raw) {
            debug!("checksum mismatch in dg {} at {}", kind, datagram.offset);
        }

        if let Some(capture) = kind.capture_kind() {
            self.tap.push(capture, raw.clone());
        }

        self.socket
            .send_to(&raw, self.destination)
            .map_err(|e| ReplayError::Send {
                addr: self.destination,
                source: e,
            })?;
        SessionStats::bump(&self.stats.datagrams_forwarded);

        let pace = self.pace.lock();
        self.cancel.wait_timeout(pace.get());
        pace.unlock_fair();
        Ok(())
    }
}

/// `YYYY-MM-DD HH:MM:SS.mmm` for a datagram, or the raw fields if they do
/// not form a valid date and time
pub fn timestamp_label(datagram: &Datagram) -> String {
    let date = NaiveDate::from_ymd_opt(
        (datagram.date / 10_000) as i32,
        (datagram.date / 100) % 100,
        datagram.date % 100,
    );
    let time = NaiveTime::from_num_seconds_from_midnight_opt(
        datagram.time_ms / 1000,
        (datagram.time_ms % 1000) * 1_000_000,
    );

    match (date, time) {
        (Some(date), Some(time)) => date.and_time(time).format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
        _ => format!("{} {}", datagram.date, datagram.time_ms),
    }
}
