//! One open datagram file and its read cursor.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use kmreplay_core::protocol::kongsberg::MIN_HEADER_SIZE;
use kmreplay_core::{Datagram, DatagramReader, ParseOutcome};

use crate::error::ReplayError;

pub struct FileStream {
    path: PathBuf,
    reader: BufReader<File>,
    size: u64,
}

impl FileStream {
    pub fn open(path: &Path) -> Result<Self, ReplayError> {
        let open_err = |e| ReplayError::Open {
            path: path.to_owned(),
            source: e,
        };
        let file = File::open(path).map_err(open_err)?;
        let size = file.metadata().map_err(open_err)?.len();

        Ok(Self {
            path: path.to_owned(),
            reader: BufReader::new(file),
            size,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn position(&mut self) -> Result<u64, ReplayError> {
        self.reader.stream_position().map_err(|e| self.read_err(e))
    }

    pub fn remaining(&mut self) -> Result<u64, ReplayError> {
        Ok(self.size.saturating_sub(self.position()?))
    }

    /// Parse the datagram at the cursor
    pub fn parse(&mut self) -> Result<ParseOutcome, ReplayError> {
        DatagramReader::parse(&mut self.reader, self.size).map_err(|e| self.read_err(e))
    }

    /// Move the cursor to `target` for a corruption recovery.
    ///
    /// Returns `false`, without moving, when `target` leaves no room for a
    /// header; the file has nothing more to offer in that case.
    pub fn realign_to(&mut self, target: u64) -> Result<bool, ReplayError> {
        if target > self.size.saturating_sub(MIN_HEADER_SIZE as u64) {
            return Ok(false);
        }
        self.reader
            .seek(SeekFrom::Start(target))
            .map_err(|e| self.read_err(e))?;
        Ok(true)
    }

    /// Read the full on-disk bytes of `datagram`, leaving the cursor after it
    pub fn read_raw(&mut self, datagram: &Datagram) -> Result<Vec<u8>, ReplayError> {
        let mut raw = vec![0u8; datagram.span() as usize];
        self.reader
            .seek(SeekFrom::Start(datagram.offset))
            .and_then(|_| self.reader.read_exact(&mut raw))
            .map_err(|e| self.read_err(e))?;
        Ok(raw)
    }

    fn read_err(&self, source: std::io::Error) -> ReplayError {
        ReplayError::Read {
            path: self.path.clone(),
            source,
        }
    }
}

impl std::fmt::Debug for FileStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStream")
            .field("path", &self.path)
            .field("size", &self.size)
            .finish()
    }
}
