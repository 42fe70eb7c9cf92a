//! FSK tone demodulator.
//!
//! Two nested state machines recover envelope bytes from captured audio. The
//! cycle detector scans the sample cursor for threshold-crossing triples and
//! reports block boundaries; the bit synchronizer consumes the resulting
//! cycle frequencies, counting half-cycle units until a byte completes.

use crate::error::{Result, TapeError};
use crate::wav::WavReader;
use crate::{envelope, CARRIER_HIGH_FREQUENCY, CARRIER_LOW_FREQUENCY};

/// Amplitude magnitude a sample must exceed to begin or bound a wave cycle.
pub const CYCLE_THRESHOLD: f32 = 0.2;

/// Frequency midpoint separating 0-bit cycles from 1-bit (and pilot) cycles.
const MID_FREQUENCY: u32 = (CARRIER_HIGH_FREQUENCY + CARRIER_LOW_FREQUENCY) / 2;

/// Half-cycle units in one framed byte: 1 start bit + 8 data bits, 2 units
/// each.
const BYTE_UNIT_COUNT: u32 = 18;

/// Result of one cycle-detection scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleEvent {
    /// First cycle found while outside a block; marks the block boundary and
    /// carries no frequency.
    BlockStart,
    /// A full oscillation inside a block.
    Cycle { frequency: u32 },
    /// No cycle found while inside a block.
    BlockEnd,
    /// Samples exhausted.
    EndOfFile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DetectorState {
    AwaitingCycle,
    InBlock,
}

/// Detects wave cycles on a [`WavReader`]'s sample cursor.
///
/// A cycle starts at a sample whose magnitude exceeds [`CYCLE_THRESHOLD`],
/// completes when a later sample crosses the opposite threshold and a further
/// sample crosses back. The completing sample is re-read as the next cycle's
/// starting candidate. A candidate with no crossing within twice the 0-bit
/// period is a gap, not a cycle, so silence between blocks ends the block
/// instead of registering as one long low-frequency cycle.
pub struct CycleReader<'a> {
    reader: WavReader<'a>,
    state: DetectorState,
}

fn crossed(from: f32, to: f32) -> bool {
    (from > CYCLE_THRESHOLD && to < -CYCLE_THRESHOLD)
        || (from < -CYCLE_THRESHOLD && to > CYCLE_THRESHOLD)
}

impl<'a> CycleReader<'a> {
    pub fn new(reader: WavReader<'a>) -> Self {
        Self {
            reader,
            state: DetectorState::AwaitingCycle,
        }
    }

    pub fn sample_position(&self) -> usize {
        self.reader.sample_position()
    }

    pub fn sample_count(&self) -> usize {
        self.reader.sample_count()
    }

    pub fn next_event(&mut self) -> Result<CycleEvent> {
        let mut start = self.reader.sample_position();

        // The slowest valid cycle is one 0-bit period; allow twice that
        // before declaring the candidate a gap.
        let max_length =
            2 * (self.reader.sample_rate() / CARRIER_LOW_FREQUENCY).max(1) as usize;

        while start < self.reader.sample_count() {
            let start_level = self.reader.read_sample()?;

            if start_level.abs() > CYCLE_THRESHOLD {
                // Scan for the opposite crossing, then the crossing back.
                let mut length = 0;
                let mut mid = start + 1;
                while mid < self.reader.sample_count() && mid - start <= max_length {
                    let mid_level = self.reader.read_sample()?;
                    if crossed(start_level, mid_level) {
                        let mut end = mid + 1;
                        while end < self.reader.sample_count() && end - start <= max_length {
                            let end_level = self.reader.read_sample()?;
                            if crossed(mid_level, end_level) {
                                length = end - start;
                                break;
                            }
                            end += 1;
                        }
                        break;
                    }
                    mid += 1;
                }

                if length > 0 {
                    // The end sample doubles as the next cycle's start.
                    self.reader.set_sample_position(start + length)?;
                    return match self.state {
                        DetectorState::AwaitingCycle => {
                            self.state = DetectorState::InBlock;
                            Ok(CycleEvent::BlockStart)
                        }
                        DetectorState::InBlock => Ok(CycleEvent::Cycle {
                            frequency: self.reader.sample_rate() / length as u32,
                        }),
                    };
                }

                // No full wave: resume one sample past the candidate.
                if start + 1 < self.reader.sample_count() {
                    self.reader.set_sample_position(start + 1)?;
                }
                if self.state == DetectorState::InBlock {
                    self.state = DetectorState::AwaitingCycle;
                    return Ok(CycleEvent::BlockEnd);
                }
            }

            start += 1;
        }

        Ok(CycleEvent::EndOfFile)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SyncState {
    AwaitingStartBit,
    AccumulatingByte { units: u32, working: u8 },
}

/// Reconstructs bytes from the frequencies of consecutive wave cycles.
///
/// A low-frequency cycle is a full 0 bit (2 units) and must land on an even
/// unit boundary; a high-frequency cycle is half a 1 bit (1 unit). Bits fill
/// the working byte LSB first. A byte completes at 18 units (start bit plus
/// eight data bits).
struct BitSync {
    state: SyncState,
}

impl BitSync {
    fn new() -> Self {
        Self {
            state: SyncState::AwaitingStartBit,
        }
    }

    fn push(&mut self, frequency: u32) -> Result<Option<u8>> {
        match self.state {
            SyncState::AwaitingStartBit => {
                if frequency < MID_FREQUENCY {
                    // Start bit; pilot tone cycles are ignored.
                    self.state = SyncState::AccumulatingByte {
                        units: 2,
                        working: 0,
                    };
                }
                Ok(None)
            }
            SyncState::AccumulatingByte {
                mut units,
                mut working,
            } => {
                if frequency < MID_FREQUENCY {
                    if units & 1 != 0 {
                        return Err(TapeError::ProtocolViolation(
                            "received a 0 bit in the middle of a 1 bit",
                        ));
                    }
                    units += 2;
                    working >>= 1;
                } else {
                    units += 1;
                    if units & 1 == 0 {
                        working >>= 1;
                        working |= 0x80;
                    }
                }

                if units == BYTE_UNIT_COUNT {
                    self.state = SyncState::AwaitingStartBit;
                    Ok(Some(working))
                } else {
                    self.state = SyncState::AccumulatingByte { units, working };
                    Ok(None)
                }
            }
        }
    }

    /// Called at a block boundary; a byte in progress means the recording was
    /// cut short.
    fn finish(&self) -> Result<()> {
        match self.state {
            SyncState::AwaitingStartBit => Ok(()),
            SyncState::AccumulatingByte { .. } => {
                Err(TapeError::ProtocolViolation("received partial byte"))
            }
        }
    }
}

/// Demodulate a WAV byte buffer back into a validated tape envelope.
///
/// Blocks shorter than a minimal envelope are treated as noise and skipped;
/// the first plausible block is validated against its length prefix and
/// checksum and returned in full.
pub fn demodulate(wav: &[u8]) -> Result<Vec<u8>> {
    let reader = WavReader::new(wav)?;
    let mut cycles = CycleReader::new(reader);

    while cycles.sample_position() < cycles.sample_count() {
        match cycles.next_event()? {
            CycleEvent::BlockStart => {
                if let Some(data) = read_block(&mut cycles)? {
                    return Ok(data);
                }
            }
            CycleEvent::Cycle { .. } => {
                return Err(TapeError::ProtocolViolation(
                    "received a wave cycle outside a data block",
                ));
            }
            CycleEvent::BlockEnd => {
                return Err(TapeError::ProtocolViolation(
                    "received an end of data outside a data block",
                ));
            }
            CycleEvent::EndOfFile => break,
        }
    }

    Err(TapeError::ProtocolViolation(
        "no data block detected in audio",
    ))
}

/// Read one block's bytes, returning `None` for blocks too short to be an
/// envelope.
fn read_block(cycles: &mut CycleReader<'_>) -> Result<Option<Vec<u8>>> {
    let mut sync = BitSync::new();
    let mut data = Vec::new();
    let mut reading = true;

    while reading && cycles.sample_position() < cycles.sample_count() {
        match cycles.next_event()? {
            CycleEvent::Cycle { frequency } => {
                if let Some(byte) = sync.push(frequency)? {
                    data.push(byte);
                }
            }
            CycleEvent::BlockStart => {
                return Err(TapeError::ProtocolViolation(
                    "received a block start inside a data block",
                ));
            }
            CycleEvent::BlockEnd | CycleEvent::EndOfFile => {
                sync.finish()?;
                reading = false;
            }
        }
    }

    if data.len() < 5 {
        log::debug!("skipping {}-byte block (too short for an envelope)", data.len());
        return Ok(None);
    }

    log::debug!("recovered {}-byte block, validating envelope", data.len());
    envelope::validate(&data)?;
    Ok(Some(data))
}
