//! Vendor wire format definitions.
//!
//! All functions here are pure (`&[u8]` in, values out) and never touch a file
//! or socket. Walking a byte stream is the job of [`crate::reader`].
//!
//! # Example
//!
//! ```rust
//! use kmreplay_core::protocol::kongsberg::{self, DatagramType};
//!
//! let raw = kongsberg::encode_datagram(0x55, 2040, 20240611, 43_200_000, &[1, 2, 3]);
//! let header = kongsberg::parse_header(&raw).unwrap();
//! assert_eq!(DatagramType::from_id(header.type_id), DatagramType::SoundSpeedProfile);
//! assert!(kongsberg::verify_checksum(&raw).unwrap());
//! ```

pub mod kongsberg;

/// Wrapping 16-bit byte sum, the checksum used by EM-series datagrams.
pub fn sum16(bytes: &[u8]) -> u16 {
    bytes
        .iter()
        .fold(0u16, |acc, &b| acc.wrapping_add(b as u16))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sum16_empty() {
        assert_eq!(sum16(&[]), 0);
    }

    #[test]
    fn test_sum16_wraps() {
        let data = vec![0xffu8; 300];
        assert_eq!(sum16(&data), (300u32 * 0xff % 0x1_0000) as u16);
    }
}
