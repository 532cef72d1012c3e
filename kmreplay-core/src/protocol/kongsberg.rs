//! Kongsberg EM-series datagram framing (`.all` format)
//!
//! Every datagram on disk looks like this (little-endian):
//!
//! ```text
//! ┌────────┬─────┬──────┬───────┬──────┬──────┬──────────┬─────┬──────────┐
//! │ length │ STX │ type │ model │ date │ time │ body ... │ ETX │ checksum │
//! │ u32    │ u8  │ u8   │ u16   │ u32  │ u32  │          │ u8  │ u16      │
//! └────────┴─────┴──────┴───────┴──────┴──────┴──────────┴─────┴──────────┘
//! ```
//!
//! `length` counts the bytes that follow the length field itself, so the
//! on-disk span of a datagram is `length + 4`.

use serde::{Deserialize, Serialize};

use super::sum16;
use crate::error::ParseError;

// =============================================================================
// Constants
// =============================================================================

/// Start-of-datagram marker
pub const STX: u8 = 0x02;

/// End-of-datagram marker
pub const ETX: u8 = 0x03;

/// Size of the leading length field
pub const LENGTH_FIELD_SIZE: usize = 4;

/// Offset of the STX byte within a datagram
pub const STX_OFFSET: usize = LENGTH_FIELD_SIZE;

/// ETX plus checksum
pub const TRAILER_SIZE: usize = std::mem::size_of::<DatagramTrailer>();

/// Length field, STX, type, model, date and time
pub const HEADER_SIZE: usize = std::mem::size_of::<DatagramHeader>();

/// Fewer remaining bytes than this cannot hold a datagram header
pub const MIN_HEADER_SIZE: usize = HEADER_SIZE;

/// Smallest declared length that still fits the header tail and the trailer
pub const MIN_DECLARED_LENGTH: usize = HEADER_SIZE - LENGTH_FIELD_SIZE + TRAILER_SIZE;

/// Back-seek applied after a corrupted header, relative to the cursor left
/// just past that header. Lands one byte after the malformed frame start.
pub const START_REALIGN_BACKTRACK: u64 = (HEADER_SIZE - 1) as u64;

/// Added to the declared length of a frame with a bad end marker to find the
/// first byte past its body, relative to the frame start.
pub const END_REALIGN_OFFSET: u64 = LENGTH_FIELD_SIZE as u64;

// Datagram type identifiers
pub const DG_INSTALLATION: u8 = 0x49; // 'I'
pub const DG_RANGE_ANGLE_78: u8 = 0x4e; // 'N'
pub const DG_POSITION: u8 = 0x50; // 'P'
pub const DG_RUNTIME: u8 = 0x52; // 'R'
pub const DG_SOUND_SPEED_PROFILE: u8 = 0x55; // 'U'
pub const DG_XYZ_88: u8 = 0x58; // 'X'
pub const DG_SEABED_IMAGE_89: u8 = 0x59; // 'Y'
pub const DG_WATER_COLUMN: u8 = 0x6b; // 'k'

/// Type identifiers that are retransmitted during replay
pub const FORWARDED_TYPES: [u8; 8] = [
    DG_INSTALLATION,
    DG_RANGE_ANGLE_78,
    DG_POSITION,
    DG_RUNTIME,
    DG_SOUND_SPEED_PROFILE,
    DG_XYZ_88,
    DG_SEABED_IMAGE_89,
    DG_WATER_COLUMN,
];

// =============================================================================
// Datagram Types
// =============================================================================

/// Semantic kind of a datagram, derived from its type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DatagramType {
    Installation,
    RangeAngle78,
    Position,
    Runtime,
    SoundSpeedProfile,
    Xyz88,
    SeabedImage89,
    WaterColumn,
    Other(u8),
}

impl DatagramType {
    pub fn from_id(id: u8) -> Self {
        match id {
            DG_INSTALLATION => DatagramType::Installation,
            DG_RANGE_ANGLE_78 => DatagramType::RangeAngle78,
            DG_POSITION => DatagramType::Position,
            DG_RUNTIME => DatagramType::Runtime,
            DG_SOUND_SPEED_PROFILE => DatagramType::SoundSpeedProfile,
            DG_XYZ_88 => DatagramType::Xyz88,
            DG_SEABED_IMAGE_89 => DatagramType::SeabedImage89,
            DG_WATER_COLUMN => DatagramType::WaterColumn,
            other => DatagramType::Other(other),
        }
    }

    pub fn id(&self) -> u8 {
        match self {
            DatagramType::Installation => DG_INSTALLATION,
            DatagramType::RangeAngle78 => DG_RANGE_ANGLE_78,
            DatagramType::Position => DG_POSITION,
            DatagramType::Runtime => DG_RUNTIME,
            DatagramType::SoundSpeedProfile => DG_SOUND_SPEED_PROFILE,
            DatagramType::Xyz88 => DG_XYZ_88,
            DatagramType::SeabedImage89 => DG_SEABED_IMAGE_89,
            DatagramType::WaterColumn => DG_WATER_COLUMN,
            DatagramType::Other(id) => *id,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DatagramType::Installation => "installation",
            DatagramType::RangeAngle78 => "range/angle 78",
            DatagramType::Position => "position",
            DatagramType::Runtime => "runtime",
            DatagramType::SoundSpeedProfile => "sound speed profile",
            DatagramType::Xyz88 => "XYZ 88",
            DatagramType::SeabedImage89 => "seabed image 89",
            DatagramType::WaterColumn => "water column",
            DatagramType::Other(_) => "other",
        }
    }

    /// Whether datagrams of this kind are sent on the wire during replay
    pub fn is_forwarded(&self) -> bool {
        FORWARDED_TYPES.contains(&self.id())
    }

    /// Which capture sequence, if any, keeps a copy of this kind
    pub fn capture_kind(&self) -> Option<CaptureKind> {
        match self.id() {
            DG_INSTALLATION => Some(CaptureKind::Installation),
            DG_RUNTIME => Some(CaptureKind::Runtime),
            DG_SOUND_SPEED_PROFILE => Some(CaptureKind::SoundSpeedProfile),
            _ => None,
        }
    }
}

impl std::fmt::Display for DatagramType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({:#04x})", self.as_str(), self.id())
    }
}

/// The three datagram categories kept for in-process consumers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CaptureKind {
    Installation,
    Runtime,
    SoundSpeedProfile,
}

// =============================================================================
// Wire Structures
// =============================================================================

/// Fixed datagram header
#[derive(Deserialize, Debug, Copy, Clone)]
#[repr(C, packed)]
pub struct DatagramHeader {
    /// Bytes following this field
    pub length: [u8; 4],
    /// Start marker, must be STX
    pub stx: u8,
    /// Datagram type identifier
    pub type_id: u8,
    /// EM model number (e.g. 2040, 710, 302)
    pub model: [u8; 2],
    /// Date as YYYYMMDD
    pub date: [u8; 4],
    /// Milliseconds since midnight
    pub time: [u8; 4],
}

/// Fixed datagram trailer
#[derive(Deserialize, Debug, Copy, Clone)]
#[repr(C, packed)]
pub struct DatagramTrailer {
    /// End marker, must be ETX
    pub etx: u8,
    pub checksum: [u8; 2],
}

/// Metadata of one datagram found in a file.
///
/// The raw bytes are not part of this structure; they are read back from the
/// source only for datagrams that are going to be forwarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Datagram {
    /// Byte offset of the length field within the file
    pub offset: u64,
    /// Declared length (bytes following the length field)
    pub length: u32,
    pub type_id: u8,
    pub model: u16,
    /// YYYYMMDD
    pub date: u32,
    /// Milliseconds since midnight
    pub time_ms: u32,
    /// Checksum as stored in the trailer
    pub checksum: u16,
}

impl Datagram {
    /// Build the metadata from a decoded header found at `offset`
    pub fn from_header(offset: u64, header: &DatagramHeader) -> Self {
        Datagram {
            offset,
            length: u32::from_le_bytes(header.length),
            type_id: header.type_id,
            model: u16::from_le_bytes(header.model),
            date: u32::from_le_bytes(header.date),
            time_ms: u32::from_le_bytes(header.time),
            checksum: 0,
        }
    }

    pub fn kind(&self) -> DatagramType {
        DatagramType::from_id(self.type_id)
    }

    /// Total on-disk size, including the length field
    pub fn span(&self) -> u64 {
        self.length as u64 + LENGTH_FIELD_SIZE as u64
    }

    /// Offset of the first byte after this datagram
    pub fn end(&self) -> u64 {
        self.offset + self.span()
    }
}

// =============================================================================
// Parsing Functions
// =============================================================================

/// Decode the fixed header at the start of `data`
pub fn parse_header(data: &[u8]) -> Result<DatagramHeader, ParseError> {
    if data.len() < HEADER_SIZE {
        return Err(ParseError::TooShort {
            expected: HEADER_SIZE,
            actual: data.len(),
        });
    }

    let header: DatagramHeader = bincode::deserialize(&data[..HEADER_SIZE])?;
    Ok(header)
}

/// Decode the fixed trailer at the start of `data`
pub fn parse_trailer(data: &[u8]) -> Result<DatagramTrailer, ParseError> {
    if data.len() < TRAILER_SIZE {
        return Err(ParseError::TooShort {
            expected: TRAILER_SIZE,
            actual: data.len(),
        });
    }

    let trailer: DatagramTrailer = bincode::deserialize(&data[..TRAILER_SIZE])?;
    Ok(trailer)
}

/// Checksum over the bytes between STX and ETX (both excluded)
pub fn compute_checksum(between_markers: &[u8]) -> u16 {
    sum16(between_markers)
}

/// Check the stored checksum of a complete raw datagram
pub fn verify_checksum(raw: &[u8]) -> Result<bool, ParseError> {
    let min = HEADER_SIZE + TRAILER_SIZE;
    if raw.len() < min {
        return Err(ParseError::TooShort {
            expected: min,
            actual: raw.len(),
        });
    }
    let declared = u32::from_le_bytes(raw[0..4].try_into().unwrap()) as usize;
    if declared + LENGTH_FIELD_SIZE != raw.len() {
        return Err(ParseError::LengthMismatch {
            header_len: declared,
            actual_len: raw.len() - LENGTH_FIELD_SIZE,
        });
    }
    if raw[STX_OFFSET] != STX {
        return Err(ParseError::InvalidMarker {
            position: STX_OFFSET,
            expected: STX,
            actual: raw[STX_OFFSET],
        });
    }

    let trailer = parse_trailer(&raw[raw.len() - TRAILER_SIZE..])?;
    if trailer.etx != ETX {
        return Err(ParseError::InvalidMarker {
            position: raw.len() - TRAILER_SIZE,
            expected: ETX,
            actual: trailer.etx,
        });
    }

    let computed = compute_checksum(&raw[STX_OFFSET + 1..raw.len() - TRAILER_SIZE]);
    Ok(computed == u16::from_le_bytes(trailer.checksum))
}

/// Build a complete, well-formed datagram around `body`
pub fn encode_datagram(type_id: u8, model: u16, date: u32, time_ms: u32, body: &[u8]) -> Vec<u8> {
    let length = (MIN_DECLARED_LENGTH + body.len()) as u32;
    let mut buf = Vec::with_capacity(length as usize + LENGTH_FIELD_SIZE);

    buf.extend_from_slice(&length.to_le_bytes());
    buf.push(STX);
    buf.push(type_id);
    buf.extend_from_slice(&model.to_le_bytes());
    buf.extend_from_slice(&date.to_le_bytes());
    buf.extend_from_slice(&time_ms.to_le_bytes());
    buf.extend_from_slice(body);

    let checksum = compute_checksum(&buf[STX_OFFSET + 1..]);
    buf.push(ETX);
    buf.extend_from_slice(&checksum.to_le_bytes());

    buf
}

// =============================================================================
// Tests
// =============================================================================
