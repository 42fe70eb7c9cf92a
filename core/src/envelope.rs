use crate::error::{Result, TapeError};

/// Terminator byte appended to the payload when wrapping raw data.
pub const TERMINATOR: u8 = 0xFF;

/// Envelope overhead: 2-byte length prefix + 3-byte checksum.
const OVERHEAD: usize = 5;

/// 24-bit additive checksum over the payload bytes, wrapping.
pub fn checksum(payload: &[u8]) -> u32 {
    let mut sum: u32 = 0;
    for &byte in payload {
        sum = sum.wrapping_add(byte as u32);
    }
    sum & 0x00FF_FFFF
}

/// Wrap raw data in a tape envelope:
/// `u16 length (BE) | raw data | 0xFF terminator | u24 checksum (BE)`.
///
/// The length prefix counts the payload including the terminator, so the raw
/// data may be at most 65534 bytes.
pub fn wrap(raw: &[u8]) -> Result<Vec<u8>> {
    let payload_len = raw.len() + 1;
    if payload_len > u16::MAX as usize {
        return Err(TapeError::LengthMismatch);
    }

    let mut envelope = Vec::with_capacity(payload_len + OVERHEAD);
    envelope.push((payload_len >> 8) as u8);
    envelope.push(payload_len as u8);
    envelope.extend_from_slice(raw);
    envelope.push(TERMINATOR);

    let sum = checksum(&envelope[2..]);
    envelope.push((sum >> 16) as u8);
    envelope.push((sum >> 8) as u8);
    envelope.push(sum as u8);

    Ok(envelope)
}

/// Check the length prefix and checksum of an envelope, returning the declared
/// payload length (terminator included) on success.
pub fn validate(buffer: &[u8]) -> Result<usize> {
    if buffer.len() < OVERHEAD + 1 {
        return Err(TapeError::LengthMismatch);
    }

    let length = ((buffer[0] as usize) << 8) | buffer[1] as usize;
    if length == 0 || buffer.len() != length + OVERHEAD {
        return Err(TapeError::LengthMismatch);
    }

    let calculated = checksum(&buffer[2..2 + length]);
    let received = ((buffer[buffer.len() - 3] as u32) << 16)
        | ((buffer[buffer.len() - 2] as u32) << 8)
        | buffer[buffer.len() - 1] as u32;

    if calculated != received {
        return Err(TapeError::ChecksumMismatch);
    }

    Ok(length)
}

/// Validate an envelope and return the raw data: the payload with its
/// trailing terminator byte stripped.
pub fn unwrap(buffer: &[u8]) -> Result<Vec<u8>> {
    let length = validate(buffer)?;
    Ok(buffer[2..2 + length - 1].to_vec())
}
