//! Codec between raw binary data and the FSK cassette-tape audio format used
//! by pocket-computer cassette interfaces.
//!
//! Data travels as a "tape envelope" (length-prefixed, checksummed byte
//! buffer, `.tap` on disk) which is modulated into a mono PCM WAV: a 0 bit is
//! one wave cycle at the baud rate, a 1 bit two cycles in the same window,
//! each byte framed by gap/start/stop cycles behind a pilot-tone leader.

pub mod demodulator;
pub mod envelope;
pub mod error;
pub mod modulator;
pub mod wav;

pub use demodulator::{demodulate, CycleEvent, CycleReader};
pub use error::{Result, TapeError};
pub use modulator::{Modulator, ModulatorConfig};
pub use wav::{WavReader, WavWriter};

// Default modulation parameters (PocketTools-compatible).
pub const DEFAULT_SAMPLE_RATE: u32 = 20_000;
pub const DEFAULT_BAUD_RATE: u32 = 2_500;
pub const DEFAULT_BITS_PER_SAMPLE: u16 = 8;
pub const DEFAULT_SYNC_SECONDS: f32 = 3.0;

// Carrier frequencies of the tape format. 1 bits and the pilot tone run at
// the high frequency, 0 bits at half of it. The demodulator discriminates
// against these regardless of the container's sample rate.
pub const CARRIER_HIGH_FREQUENCY: u32 = 5_000;
pub const CARRIER_LOW_FREQUENCY: u32 = CARRIER_HIGH_FREQUENCY / 2;

/// Wrap raw data in a tape envelope (length prefix, terminator, checksum).
pub fn encode_to_envelope(raw: &[u8]) -> Result<Vec<u8>> {
    envelope::wrap(raw)
}

/// Validate a tape envelope and recover the raw data it wraps.
pub fn decode_from_envelope(envelope_bytes: &[u8]) -> Result<Vec<u8>> {
    envelope::unwrap(envelope_bytes)
}

/// Modulate an envelope into a WAV audio buffer.
pub fn modulate(envelope_bytes: &[u8], config: &ModulatorConfig) -> Result<Vec<u8>> {
    Modulator::new(config.clone())?.modulate(envelope_bytes)
}
