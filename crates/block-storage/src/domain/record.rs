//! # Record Codec
//!
//! One stored block on disk:
//!
//! ```text
//! [magic: u32 LE][length: u32 LE][payload: length bytes][checksum: u32 LE]
//! ```
//!
//! `checksum` is the CRC-32 of the payload. A frame that fails any check is
//! corruption; decoding never returns bytes it could not verify.

use crate::domain::errors::StorageError;
use crate::domain::location::BlockLocation;

/// Bytes a frame adds around its payload.
pub const FRAME_OVERHEAD: usize = 12;

const HEADER_SIZE: usize = 8;

/// CRC-32 of a payload.
pub fn checksum(payload: &[u8]) -> u32 {
    crc32fast::hash(payload)
}

/// Total frame size for a payload of `payload_len` bytes.
pub fn frame_size(payload_len: usize) -> usize {
    payload_len + FRAME_OVERHEAD
}

/// Frame `payload` for appending to a block file.
pub fn encode_frame(magic: u32, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(frame_size(payload.len()));
    frame.extend_from_slice(&magic.to_le_bytes());
    frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    frame.extend_from_slice(payload);
    frame.extend_from_slice(&checksum(payload).to_le_bytes());
    frame
}

/// Validate a frame read from `location` and return its payload.
pub fn decode_frame(
    magic: u32,
    location: &BlockLocation,
    frame: &[u8],
) -> Result<Vec<u8>, StorageError> {
    if frame.len() < FRAME_OVERHEAD || frame.len() != location.length as usize {
        return Err(StorageError::LengthMismatch {
            file: location.file,
            offset: location.offset,
            header: frame.len() as u32,
            location: location.length,
        });
    }

    let found = read_u32(&frame[0..4]);
    if found != magic {
        return Err(StorageError::BadMagic {
            file: location.file,
            offset: location.offset,
            found,
        });
    }

    let declared = read_u32(&frame[4..8]);
    if declared as usize + FRAME_OVERHEAD != frame.len() {
        return Err(StorageError::LengthMismatch {
            file: location.file,
            offset: location.offset,
            header: declared,
            location: location.length,
        });
    }

    let payload = &frame[HEADER_SIZE..HEADER_SIZE + declared as usize];
    let expected = read_u32(&frame[HEADER_SIZE + declared as usize..]);
    let actual = checksum(payload);
    if expected != actual {
        return Err(StorageError::ChecksumMismatch {
            file: location.file,
            offset: location.offset,
            expected,
            actual,
        });
    }

    Ok(payload.to_vec())
}

fn read_u32(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[..4]);
    u32::from_le_bytes(buf)
}
