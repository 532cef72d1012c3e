//! In-process capture of installation, runtime and sound speed datagrams.
//!
//! The replay worker is the only writer. Any number of threads may read; one
//! lock covers all three sequences so a single [`DatagramTap::read`] sees them
//! in a mutually consistent state. Nothing is ever evicted, retention is up to
//! the owner (see [`DatagramTap::clear`]).

use kmreplay_core::CaptureKind;
use serde::Serialize;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

#[derive(Debug, Default)]
struct Captured {
    installation: Vec<Vec<u8>>,
    runtime: Vec<Vec<u8>>,
    sound_speed: Vec<Vec<u8>>,
}

impl Captured {
    fn get(&self, kind: CaptureKind) -> &[Vec<u8>] {
        match kind {
            CaptureKind::Installation => &self.installation,
            CaptureKind::Runtime => &self.runtime,
            CaptureKind::SoundSpeedProfile => &self.sound_speed,
        }
    }
}

/// Number of datagrams in each capture sequence
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TapCounts {
    pub installation: usize,
    pub runtime: usize,
    pub sound_speed: usize,
}

/// Shared capture of raw datagrams, cheap to clone
#[derive(Debug, Clone, Default)]
pub struct DatagramTap {
    inner: Arc<RwLock<Captured>>,
}

impl DatagramTap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one raw datagram to the sequence for `kind`
    pub fn push(&self, kind: CaptureKind, raw: Vec<u8>) {
        let mut captured = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        match kind {
            CaptureKind::Installation => captured.installation.push(raw),
            CaptureKind::Runtime => captured.runtime.push(raw),
            CaptureKind::SoundSpeedProfile => captured.sound_speed.push(raw),
        }
    }

    /// Hold the capture lock and look at all three sequences at once
    pub fn read(&self) -> TapReadGuard<'_> {
        TapReadGuard {
            guard: self.inner.read().unwrap_or_else(PoisonError::into_inner),
        }
    }

    /// Copy of one sequence
    pub fn snapshot(&self, kind: CaptureKind) -> Vec<Vec<u8>> {
        self.read().get(kind).to_vec()
    }

    pub fn installation(&self) -> Vec<Vec<u8>> {
        self.snapshot(CaptureKind::Installation)
    }

    pub fn runtime(&self) -> Vec<Vec<u8>> {
        self.snapshot(CaptureKind::Runtime)
    }

    pub fn sound_speed(&self) -> Vec<Vec<u8>> {
        self.snapshot(CaptureKind::SoundSpeedProfile)
    }

    pub fn counts(&self) -> TapCounts {
        self.read().counts()
    }

    /// Drop everything captured so far
    pub fn clear(&self) {
        let mut captured = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        *captured = Captured::default();
    }
}

/// Read access to the capture, valid while the lock is held
pub struct TapReadGuard<'a> {
    guard: RwLockReadGuard<'a, Captured>,
}

impl TapReadGuard<'_> {
    pub fn get(&self, kind: CaptureKind) -> &[Vec<u8>] {
        self.guard.get(kind)
    }

    pub fn installation(&self) -> &[Vec<u8>] {
        &self.guard.installation
    }

    pub fn runtime(&self) -> &[Vec<u8>] {
        &self.guard.runtime
    }

    pub fn sound_speed(&self) -> &[Vec<u8>] {
        &self.guard.sound_speed
    }

    pub fn counts(&self) -> TapCounts {
        TapCounts {
            installation: self.guard.installation.len(),
            runtime: self.guard.runtime.len(),
            sound_speed: self.guard.sound_speed.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_push_routes_by_kind() {
        let tap = DatagramTap::new();
        tap.push(CaptureKind::Installation, vec![1]);
        tap.push(CaptureKind::SoundSpeedProfile, vec![2]);
        tap.push(CaptureKind::SoundSpeedProfile, vec![3]);

        assert_eq!(
            tap.counts(),
            TapCounts {
                installation: 1,
                runtime: 0,
                sound_speed: 2
            }
        );
        assert_eq!(tap.sound_speed(), vec![vec![2], vec![3]]);
        assert!(tap.runtime().is_empty());
    }

    #[test]
    fn test_clones_share_storage() {
        let tap = DatagramTap::new();
        let other = tap.clone();
        tap.push(CaptureKind::Runtime, vec![0xaa]);
        assert_eq!(other.runtime(), vec![vec![0xaa]]);

        other.clear();
        assert_eq!(tap.counts(), TapCounts::default());
    }

    #[test]
    fn test_concurrent_readers_see_prefixes() {
        let tap = DatagramTap::new();
        let writer = tap.clone();
        const N: u32 = 2000;

        let producer = thread::spawn(move || {
            for i in 0..N {
                writer.push(CaptureKind::Runtime, i.to_le_bytes().to_vec());
                writer.push(CaptureKind::SoundSpeedProfile, i.to_le_bytes().to_vec());
            }
        });

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let tap = tap.clone();
                thread::spawn(move || {
                    for _ in 0..200 {
                        let view = tap.read();
                        let runtime = view.runtime();
                        let ssp = view.sound_speed();
                        // runtime is always pushed first
                        assert!(runtime.len() == ssp.len() || runtime.len() == ssp.len() + 1);
                        for (i, raw) in runtime.iter().enumerate() {
                            assert_eq!(raw.as_slice(), (i as u32).to_le_bytes());
                        }
                    }
                })
            })
            .collect();

        producer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(tap.counts().runtime, N as usize);
        assert_eq!(tap.counts().sound_speed, N as usize);
    }
}
