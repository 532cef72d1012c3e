//! Datagram frame reader.
//!
//! [`DatagramReader::parse`] extracts one datagram from a seekable byte
//! source. Structural problems are reported as [`ParseOutcome`] variants so the
//! caller can decide between realigning, abandoning the source, or accepting
//! the frame. Only genuine I/O failures come back as `Err`.
//!
//! ```text
//! SeekStartMarker ──► ReadHeader ──► ValidateEndMarker ──► Valid
//!       │                 │                  │
//!       ▼                 ▼                  ▼
//! MissingStartMarker  CorruptedStart    CorruptedEnd
//!                     UnexpectedEof
//! ```

use std::io::{self, Read, Seek, SeekFrom};

use crate::protocol::kongsberg::{
    parse_header, parse_trailer, Datagram, ETX, HEADER_SIZE, MIN_DECLARED_LENGTH,
    MIN_HEADER_SIZE, STX, TRAILER_SIZE,
};

/// Result of parsing one frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    /// Start marker, declared length and end marker are consistent.
    /// The cursor is left at the first byte of the next frame.
    Valid(Datagram),
    /// No start marker where one was expected. The cursor is not moved.
    MissingStartMarker,
    /// Start marker present but the header is inconsistent.
    /// The cursor is left just past the 16 header bytes.
    CorruptedStartFraming,
    /// The declared length does not land on an end marker.
    /// The cursor is left just past the probed trailer.
    CorruptedEndFraming(Datagram),
    /// Not enough bytes left for a header, or the frame runs past the end.
    UnexpectedEndOfFile,
}

impl ParseOutcome {
    /// The datagram metadata, when the header could be decoded
    pub fn datagram(&self) -> Option<&Datagram> {
        match self {
            ParseOutcome::Valid(dg) | ParseOutcome::CorruptedEndFraming(dg) => Some(dg),
            _ => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, ParseOutcome::Valid(_))
    }
}

impl std::fmt::Display for ParseOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseOutcome::Valid(_) => write!(f, "valid"),
            ParseOutcome::MissingStartMarker => write!(f, "missing start marker"),
            ParseOutcome::CorruptedStartFraming => write!(f, "corrupted start framing"),
            ParseOutcome::CorruptedEndFraming(_) => write!(f, "corrupted end framing"),
            ParseOutcome::UnexpectedEndOfFile => write!(f, "unexpected end of file"),
        }
    }
}

/// Stateless frame parser for EM-series datagram streams
#[derive(Debug, Clone, Copy, Default)]
pub struct DatagramReader;

impl DatagramReader {
    /// Parse the datagram starting at the current position of `source`.
    ///
    /// `file_size` is the total size of the source in bytes. Only the header
    /// and trailer are read; the body is skipped with a seek.
    pub fn parse<R: Read + Seek>(source: &mut R, file_size: u64) -> io::Result<ParseOutcome> {
        let offset = source.stream_position()?;
        if file_size.saturating_sub(offset) < MIN_HEADER_SIZE as u64 {
            return Ok(ParseOutcome::UnexpectedEndOfFile);
        }

        let mut buf = [0u8; HEADER_SIZE];
        if !read_or_eof(source, &mut buf)? {
            source.seek(SeekFrom::Start(offset))?;
            return Ok(ParseOutcome::UnexpectedEndOfFile);
        }

        let header = match parse_header(&buf) {
            Ok(header) => header,
            Err(_) => return Ok(ParseOutcome::CorruptedStartFraming),
        };

        if header.stx != STX {
            source.seek(SeekFrom::Start(offset))?;
            return Ok(ParseOutcome::MissingStartMarker);
        }

        let mut datagram = Datagram::from_header(offset, &header);
        if (datagram.length as usize) < MIN_DECLARED_LENGTH {
            return Ok(ParseOutcome::CorruptedStartFraming);
        }

        if datagram.end() > file_size {
            source.seek(SeekFrom::Start(offset))?;
            return Ok(ParseOutcome::UnexpectedEndOfFile);
        }

        source.seek(SeekFrom::Start(datagram.end() - TRAILER_SIZE as u64))?;
        let mut buf = [0u8; TRAILER_SIZE];
        if !read_or_eof(source, &mut buf)? {
            source.seek(SeekFrom::Start(offset))?;
            return Ok(ParseOutcome::UnexpectedEndOfFile);
        }

        let trailer = match parse_trailer(&buf) {
            Ok(trailer) => trailer,
            Err(_) => return Ok(ParseOutcome::CorruptedEndFraming(datagram)),
        };
        datagram.checksum = u16::from_le_bytes(trailer.checksum);

        if trailer.etx != ETX {
            return Ok(ParseOutcome::CorruptedEndFraming(datagram));
        }

        Ok(ParseOutcome::Valid(datagram))
    }
}

/// `read_exact` that reports a short read as `false` instead of an error
fn read_or_eof<R: Read>(source: &mut R, buf: &mut [u8]) -> io::Result<bool> {
    match source.read_exact(buf) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::kongsberg::{
        encode_datagram, DG_INSTALLATION, DG_POSITION, DG_SOUND_SPEED_PROFILE,
    };
    use std::io::Cursor;

    fn parse(cursor: &mut Cursor<Vec<u8>>) -> ParseOutcome {
        let size = cursor.get_ref().len() as u64;
        DatagramReader::parse(cursor, size).unwrap()
    }

    #[test]
    fn test_parse_valid() {
        let raw = encode_datagram(DG_POSITION, 2040, 20240611, 3_600_000, &[7u8; 40]);
        let span = raw.len() as u64;
        let mut cursor = Cursor::new(raw);

        match parse(&mut cursor) {
            ParseOutcome::Valid(dg) => {
                assert_eq!(dg.offset, 0);
                assert_eq!(dg.type_id, DG_POSITION);
                assert_eq!(dg.span(), span);
                assert_eq!(dg.date, 20240611);
                assert_eq!(dg.time_ms, 3_600_000);
                assert_eq!(dg.model, 2040);
            }
            other => panic!("Expected valid datagram, got {}", other),
        }
        assert_eq!(cursor.position(), span);
    }

    #[test]
    fn test_parse_consecutive_frames() {
        let mut data = encode_datagram(DG_INSTALLATION, 2040, 20240611, 0, b"WLZ=0.1,");
        let first_len = data.len() as u64;
        data.extend(encode_datagram(DG_SOUND_SPEED_PROFILE, 2040, 20240611, 10, &[0; 24]));
        let total = data.len() as u64;
        let mut cursor = Cursor::new(data);

        let first = parse(&mut cursor);
        assert_eq!(first.datagram().unwrap().type_id, DG_INSTALLATION);
        assert_eq!(cursor.position(), first_len);

        let second = parse(&mut cursor);
        assert!(second.is_valid());
        assert_eq!(second.datagram().unwrap().offset, first_len);
        assert_eq!(cursor.position(), total);

        assert_eq!(parse(&mut cursor), ParseOutcome::UnexpectedEndOfFile);
    }

    #[test]
    fn test_framing_idempotence() {
        let mut data = vec![0xaau8; 5];
        data.extend(encode_datagram(DG_SOUND_SPEED_PROFILE, 302, 20231224, 86_399_999, &[3; 17]));
        let mut cursor = Cursor::new(data.clone());
        cursor.set_position(5);

        let first = match parse(&mut cursor) {
            ParseOutcome::Valid(dg) => dg,
            other => panic!("Expected valid datagram, got {}", other),
        };

        let raw = data[first.offset as usize..first.end() as usize].to_vec();
        let mut cursor = Cursor::new(raw);
        let second = match parse(&mut cursor) {
            ParseOutcome::Valid(dg) => dg,
            other => panic!("Expected valid datagram, got {}", other),
        };

        assert_eq!(second.type_id, first.type_id);
        assert_eq!(second.length, first.length);
        assert_eq!(second.date, first.date);
        assert_eq!(second.time_ms, first.time_ms);
        assert_eq!(second.checksum, first.checksum);
    }

    #[test]
    fn test_missing_start_marker_keeps_cursor() {
        let mut raw = encode_datagram(DG_POSITION, 2040, 20240611, 0, &[0; 8]);
        raw[4] = 0x7f;
        let mut cursor = Cursor::new(raw);

        assert_eq!(parse(&mut cursor), ParseOutcome::MissingStartMarker);
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn test_short_declared_length_is_corrupted_start() {
        let mut raw = encode_datagram(DG_POSITION, 2040, 20240611, 0, &[0; 8]);
        raw[0..4].copy_from_slice(&10u32.to_le_bytes());
        let mut cursor = Cursor::new(raw);

        assert_eq!(parse(&mut cursor), ParseOutcome::CorruptedStartFraming);
        assert_eq!(cursor.position(), HEADER_SIZE as u64);
    }

    #[test]
    fn test_bad_end_marker_is_corrupted_end() {
        let mut raw = encode_datagram(DG_POSITION, 2040, 20240611, 0, &[0; 8]);
        let etx_pos = raw.len() - TRAILER_SIZE;
        raw[etx_pos] = 0x00;
        let span = raw.len() as u64;
        let mut cursor = Cursor::new(raw);

        match parse(&mut cursor) {
            ParseOutcome::CorruptedEndFraming(dg) => {
                assert_eq!(dg.type_id, DG_POSITION);
                assert_eq!(dg.span(), span);
            }
            other => panic!("Expected corrupted end framing, got {}", other),
        }
        assert_eq!(cursor.position(), span);
    }

    #[test]
    fn test_truncated_header() {
        let raw = encode_datagram(DG_POSITION, 2040, 20240611, 0, &[0; 8]);
        let mut cursor = Cursor::new(raw[..10].to_vec());

        assert_eq!(parse(&mut cursor), ParseOutcome::UnexpectedEndOfFile);
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn test_frame_past_end_of_file() {
        let raw = encode_datagram(DG_POSITION, 2040, 20240611, 0, &[0; 64]);
        let mut cursor = Cursor::new(raw[..40].to_vec());

        assert_eq!(parse(&mut cursor), ParseOutcome::UnexpectedEndOfFile);
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn test_declared_size_smaller_than_real_file() {
        // Reader trusts the caller's size, not the buffer length
        let raw = encode_datagram(DG_POSITION, 2040, 20240611, 0, &[0; 8]);
        let mut cursor = Cursor::new(raw);
        assert_eq!(
            DatagramReader::parse(&mut cursor, 12).unwrap(),
            ParseOutcome::UnexpectedEndOfFile
        );
    }
}
