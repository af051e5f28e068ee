//! WAL frame encoding with CRC32 checksums
//!
//! Frame layout (little-endian):
//!
//! ```text
//! +-----------+-----------+----------------------+
//! | len (u32) | crc (u32) | payload (len bytes)  |
//! +-----------+-----------+----------------------+
//! ```
//!
//! The payload is the MessagePack encoding of a [`WalEntry`]; the CRC covers
//! the payload only.

use crate::wal::WalEntry;
use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use pharmastock_core::{Error, Result};

/// Bytes before the payload
pub const FRAME_HEADER_LEN: usize = 8;

/// Upper bound on a single payload; anything larger is treated as corruption
pub const MAX_PAYLOAD_LEN: usize = 16 * 1024 * 1024;

/// Encode one entry into a frame
pub fn encode_entry(entry: &WalEntry) -> Result<Vec<u8>> {
    let payload =
        rmp_serde::to_vec_named(entry).map_err(|e| Error::Serialization(e.to_string()))?;
    let len = u32::try_from(payload.len())
        .map_err(|_| Error::Serialization(format!("WAL entry too large: {} bytes", payload.len())))?;

    let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
    frame.write_u32::<LittleEndian>(len)?;
    frame.write_u32::<LittleEndian>(crc32fast::hash(&payload))?;
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Decode the frame at the start of `buf`.
///
/// Returns `Ok(None)` if `buf` holds only part of a frame (a torn write),
/// `Ok(Some((entry, consumed)))` on success, and `Corruption` on a checksum
/// mismatch or undecodable payload.
pub fn decode_entry(buf: &[u8]) -> Result<Option<(WalEntry, usize)>> {
    if buf.len() < FRAME_HEADER_LEN {
        return Ok(None);
    }
    let len = LittleEndian::read_u32(&buf[0..4]) as usize;
    let expected_crc = LittleEndian::read_u32(&buf[4..8]);

    if len > MAX_PAYLOAD_LEN {
        return Err(Error::Corruption(format!("frame length {} exceeds limit", len)));
    }
    let end = FRAME_HEADER_LEN + len;
    if buf.len() < end {
        return Ok(None);
    }

    let payload = &buf[FRAME_HEADER_LEN..end];
    let actual_crc = crc32fast::hash(payload);
    if actual_crc != expected_crc {
        return Err(Error::Corruption(format!(
            "checksum mismatch: expected {:08x}, got {:08x}",
            expected_crc, actual_crc
        )));
    }

    let entry = rmp_serde::from_slice(payload).map_err(|e| Error::Corruption(e.to_string()))?;
    Ok(Some((entry, end)))
}
