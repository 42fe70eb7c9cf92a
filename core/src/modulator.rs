//! FSK tone modulator.
//!
//! Each bit of the tape envelope becomes one precomputed wave cycle: a 0 bit
//! is one full oscillation at the baud rate, a 1 bit is two oscillations in
//! the same sample window. Bytes are framed with an inter-byte gap, a start
//! bit, eight data bits (LSB first) and a stop bit, preceded by a leader of
//! 1-cycles for receiver synchronization.

use std::f64::consts::PI;

use crate::error::{Result, TapeError};
use crate::wav::WavWriter;
use crate::{DEFAULT_BAUD_RATE, DEFAULT_BITS_PER_SAMPLE, DEFAULT_SAMPLE_RATE, DEFAULT_SYNC_SECONDS};

/// Amplitude levels of the clipped near-square wave used at low oversampling
/// ratios. The asymmetric pair matches the output of the PocketTools encoder
/// that existing decoders were calibrated against.
pub const SQUARE_WAVE_HIGH: f64 = 0.706;
pub const SQUARE_WAVE_LOW: f64 = -0.705;

/// At this many samples per cycle or fewer, synthesis degrades from a sine to
/// the clipped square wave.
pub const SQUARE_WAVE_CYCLE_SAMPLES: usize = 8;

/// Wave cycles emitted per framed byte: 2 gap + 1 start + 8 data + 1 stop.
pub const CYCLES_PER_BYTE: usize = 12;

#[derive(Debug, Clone)]
pub struct ModulatorConfig {
    pub sample_rate: u32,
    pub baud_rate: u32,
    pub bits_per_sample: u16,
    pub sync_seconds: f32,
    pub reverse_phase: bool,
}

impl Default for ModulatorConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            baud_rate: DEFAULT_BAUD_RATE,
            bits_per_sample: DEFAULT_BITS_PER_SAMPLE,
            sync_seconds: DEFAULT_SYNC_SECONDS,
            reverse_phase: false,
        }
    }
}

pub struct Modulator {
    config: ModulatorConfig,
    /// One cycle's worth of samples for a 0 bit and a 1 bit.
    cycles: [Vec<f32>; 2],
}

impl Modulator {
    pub fn new(config: ModulatorConfig) -> Result<Self> {
        let cycle_samples = cycle_samples(&config)?;
        let cycles = [
            bit_cycle(&config, cycle_samples, 0),
            bit_cycle(&config, cycle_samples, 1),
        ];
        Ok(Self { config, cycles })
    }

    /// Modulate an envelope byte sequence into a complete WAV container.
    pub fn modulate(&self, envelope: &[u8]) -> Result<Vec<u8>> {
        let cycle_samples = self.cycles[0].len();
        let mut writer =
            WavWriter::new(self.config.sample_rate, self.config.bits_per_sample)?;

        // Leader (pilot tone).
        let leader_cycles = (self.config.sample_rate as f64 * self.config.sync_seconds as f64
            / cycle_samples as f64)
            .ceil() as usize;
        for _ in 0..leader_cycles {
            self.write_cycle(&mut writer, 1);
        }

        for &byte in envelope {
            // Gap between bytes.
            self.write_cycle(&mut writer, 1);
            self.write_cycle(&mut writer, 1);

            // Start bit.
            self.write_cycle(&mut writer, 0);

            // Eight data bits, LSB first.
            let mut b = byte;
            for _ in 0..8 {
                self.write_cycle(&mut writer, (b & 1) as usize);
                b >>= 1;
            }

            // Stop bit.
            self.write_cycle(&mut writer, 1);
        }

        let total_samples = leader_cycles * cycle_samples
            + envelope.len() * CYCLES_PER_BYTE * cycle_samples;
        log::debug!(
            "modulated {} envelope bytes into {} samples ({} leader cycles)",
            envelope.len(),
            total_samples,
            leader_cycles
        );

        Ok(writer.finalize())
    }

    fn write_cycle(&self, writer: &mut WavWriter, bit: usize) {
        for &sample in &self.cycles[bit] {
            writer.write_sample(sample);
        }
    }
}

fn cycle_samples(config: &ModulatorConfig) -> Result<usize> {
    if config.baud_rate == 0 || config.sample_rate / config.baud_rate == 0 {
        return Err(TapeError::UnsupportedFormat(
            "baud rate exceeds sample rate",
        ));
    }
    Ok((config.sample_rate / config.baud_rate) as usize)
}

/// Precompute one cycle's worth of samples for the given bit value. The angle
/// is doubled for 1 bits, doubling the frequency.
fn bit_cycle(config: &ModulatorConfig, cycle_samples: usize, bit: usize) -> Vec<f32> {
    let square_wave = cycle_samples <= SQUARE_WAVE_CYCLE_SAMPLES;
    let mut samples = Vec::with_capacity(cycle_samples);

    for c in 0..cycle_samples {
        let angle =
            ((c as f64 + 1.0 / cycle_samples as f64) * PI * 2.0) / cycle_samples as f64;
        let mut v = (angle * (1.0 + bit as f64)).sin();
        if config.reverse_phase {
            v = -v;
        }
        if square_wave {
            v = if v > 0.0 {
                SQUARE_WAVE_HIGH
            } else {
                SQUARE_WAVE_LOW
            };
        }
        samples.push(v as f32);
    }

    samples
}
