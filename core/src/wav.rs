//! Minimal RIFF/WAVE container support for mono integer PCM.
//!
//! The reader gives cursor-based access to normalized samples in [-1, +1];
//! the writer emits a header with placeholder sizes and patches them when the
//! buffer is finalized. Only the subset of the format the tape codec needs is
//! supported: one channel, 8- or 16-bit integer samples.

use crate::error::{Result, TapeError};

const RIFF_TAG: &[u8] = b"RIFF";
const WAVE_TAG: &[u8] = b"WAVE";
const FMT_TAG: &[u8] = b"fmt ";
const DATA_TAG: &[u8] = b"data";

/// Integer PCM format tag in the fmt chunk.
const FORMAT_PCM: u16 = 1;

fn read_u16_le(buf: &[u8], offset: usize) -> Result<u16> {
    if offset + 2 > buf.len() {
        return Err(TapeError::MalformedContainer("unexpected end of container"));
    }
    Ok(u16::from_le_bytes([buf[offset], buf[offset + 1]]))
}

fn read_u32_le(buf: &[u8], offset: usize) -> Result<u32> {
    if offset + 4 > buf.len() {
        return Err(TapeError::MalformedContainer("unexpected end of container"));
    }
    Ok(u32::from_le_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ]))
}

/// Read-only view of a mono PCM WAVE buffer with a sample cursor.
pub struct WavReader<'a> {
    buffer: &'a [u8],
    data_start: usize,
    sample_count: usize,
    sample_rate: u32,
    channel_count: u16,
    bits_per_sample: u16,
    block_align: usize,
    position: usize,
}

impl<'a> WavReader<'a> {
    pub fn new(buffer: &'a [u8]) -> Result<Self> {
        if buffer.get(0..4) != Some(RIFF_TAG) {
            return Err(TapeError::MalformedContainer("missing RIFF identifier"));
        }
        let riff_length = read_u32_le(buffer, 4)? as usize;
        let riff_end = 8 + riff_length + (riff_length & 1);

        if buffer.get(8..12) != Some(WAVE_TAG) {
            return Err(TapeError::MalformedContainer("missing WAVE identifier"));
        }

        // Scan chunks until both the format and data chunks have been seen.
        // Unrecognized chunks are skipped by their declared (even-padded)
        // size.
        let mut fmt_chunk: Option<(usize, usize)> = None;
        let mut data_chunk: Option<(usize, usize)> = None;
        let mut offset = 12;

        while fmt_chunk.is_none() || data_chunk.is_none() {
            if offset >= riff_end {
                return Err(TapeError::MalformedContainer(
                    "could not find WAVE fmt and data chunks",
                ));
            }

            let tag = buffer
                .get(offset..offset + 4)
                .ok_or(TapeError::MalformedContainer("unexpected end of container"))?;
            let size = read_u32_le(buffer, offset + 4)? as usize;
            let body = offset + 8;

            if tag == FMT_TAG {
                if fmt_chunk.is_some() {
                    return Err(TapeError::MalformedContainer(
                        "found more than one fmt chunk",
                    ));
                }
                fmt_chunk = Some((body, size));
            } else if tag == DATA_TAG {
                if data_chunk.is_some() {
                    return Err(TapeError::MalformedContainer(
                        "found more than one data chunk",
                    ));
                }
                data_chunk = Some((body, size));
            }

            offset = body + size + (size & 1);
        }

        let (fmt_start, fmt_length) =
            fmt_chunk.ok_or(TapeError::MalformedContainer("missing fmt chunk"))?;
        let (data_start, data_length) =
            data_chunk.ok_or(TapeError::MalformedContainer("missing data chunk"))?;

        if fmt_length < 16 {
            return Err(TapeError::MalformedContainer(
                "fmt chunk is not at least 16 bytes in length",
            ));
        }
        if fmt_start + fmt_length > buffer.len() || data_start + data_length > buffer.len() {
            return Err(TapeError::MalformedContainer(
                "chunk body overruns the container",
            ));
        }

        let format_tag = read_u16_le(buffer, fmt_start)?;
        let channel_count = read_u16_le(buffer, fmt_start + 2)?;
        let sample_rate = read_u32_le(buffer, fmt_start + 4)?;
        let block_align = read_u16_le(buffer, fmt_start + 12)? as usize;
        let bits_per_sample = read_u16_le(buffer, fmt_start + 14)?;

        if format_tag != FORMAT_PCM {
            return Err(TapeError::UnsupportedFormat(
                "only integer PCM WAV files are supported",
            ));
        }
        if channel_count != 1 {
            return Err(TapeError::UnsupportedFormat(
                "only mono WAV files are supported",
            ));
        }
        if bits_per_sample != 8 && bits_per_sample != 16 {
            return Err(TapeError::UnsupportedFormat(
                "only 8- or 16-bit WAV files are supported",
            ));
        }
        if block_align < bits_per_sample as usize / 8 {
            return Err(TapeError::MalformedContainer(
                "block align is smaller than the sample size",
            ));
        }

        Ok(Self {
            buffer,
            data_start,
            sample_count: data_length / block_align,
            sample_rate,
            channel_count,
            bits_per_sample,
            block_align,
            position: 0,
        })
    }

    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }

    pub fn sample_position(&self) -> usize {
        self.position
    }

    pub fn set_sample_position(&mut self, position: usize) -> Result<()> {
        if position >= self.sample_count {
            return Err(TapeError::OutOfRange);
        }
        self.position = position;
        Ok(())
    }

    /// Read the sample under the cursor, normalized to [-1, +1], and advance
    /// the cursor by one sample.
    ///
    /// 8-bit samples map [0, 255] affinely onto [-1, +1]. 16-bit samples are
    /// scaled asymmetrically (negative values by 1/32768, positive by
    /// 1/32767); the detection threshold downstream depends on this scale.
    pub fn read_sample(&mut self) -> Result<f32> {
        if self.position >= self.sample_count {
            return Err(TapeError::OutOfRange);
        }
        let offset = self.data_start + self.position * self.block_align;

        let mut sample = match self.bits_per_sample {
            8 => {
                let mut v = self.buffer[offset] as f32;
                v /= u8::MAX as f32;
                v -= 0.5;
                v * 2.0
            }
            _ => {
                let v = i16::from_le_bytes([self.buffer[offset], self.buffer[offset + 1]]) as f32;
                if v < 0.0 {
                    v / -(i16::MIN as f32)
                } else {
                    v / i16::MAX as f32
                }
            }
        };

        sample = sample.clamp(-1.0, 1.0);
        self.position += 1;
        Ok(sample)
    }
}

/// Incremental mono PCM WAVE writer over an in-memory buffer.
pub struct WavWriter {
    buffer: Vec<u8>,
    bits_per_sample: u16,
    riff_size_offset: usize,
    data_size_offset: usize,
    data_start: usize,
}

impl WavWriter {
    pub fn new(sample_rate: u32, bits_per_sample: u16) -> Result<Self> {
        if bits_per_sample != 8 && bits_per_sample != 16 {
            return Err(TapeError::UnsupportedFormat(
                "only 8- or 16-bit samples are supported",
            ));
        }

        let channel_count: u16 = 1;
        let block_align = channel_count * bits_per_sample / 8;
        let byte_rate = sample_rate * block_align as u32;

        let mut buffer = Vec::new();
        buffer.extend_from_slice(RIFF_TAG);
        let riff_size_offset = buffer.len();
        buffer.extend_from_slice(&0u32.to_le_bytes()); // patched in finalize
        buffer.extend_from_slice(WAVE_TAG);

        buffer.extend_from_slice(FMT_TAG);
        buffer.extend_from_slice(&16u32.to_le_bytes());
        buffer.extend_from_slice(&FORMAT_PCM.to_le_bytes());
        buffer.extend_from_slice(&channel_count.to_le_bytes());
        buffer.extend_from_slice(&sample_rate.to_le_bytes());
        buffer.extend_from_slice(&byte_rate.to_le_bytes());
        buffer.extend_from_slice(&block_align.to_le_bytes());
        buffer.extend_from_slice(&bits_per_sample.to_le_bytes());

        buffer.extend_from_slice(DATA_TAG);
        let data_size_offset = buffer.len();
        buffer.extend_from_slice(&0u32.to_le_bytes()); // patched in finalize
        let data_start = buffer.len();

        Ok(Self {
            buffer,
            bits_per_sample,
            riff_size_offset,
            data_size_offset,
            data_start,
        })
    }

    /// Quantize a normalized sample and append it to the data chunk.
    pub fn write_sample(&mut self, sample: f32) {
        let v = sample as f64;
        match self.bits_per_sample {
            8 => {
                let quantized = (127.5 + 127.5 * v).clamp(0.0, u8::MAX as f64).round() as u8;
                self.buffer.push(quantized);
            }
            _ => {
                let quantized = ((i16::MAX as f64 + 0.5) * v)
                    .clamp(i16::MIN as f64, i16::MAX as f64)
                    .round() as i16;
                self.buffer.extend_from_slice(&quantized.to_le_bytes());
            }
        }
    }

    /// Patch the RIFF and data chunk sizes and return the finished container.
    pub fn finalize(mut self) -> Vec<u8> {
        let data_size = (self.buffer.len() - self.data_start) as u32;
        let riff_size = (self.buffer.len() - 8) as u32;
        self.buffer[self.data_size_offset..self.data_size_offset + 4]
            .copy_from_slice(&data_size.to_le_bytes());
        self.buffer[self.riff_size_offset..self.riff_size_offset + 4]
            .copy_from_slice(&riff_size.to_le_bytes());
        self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_samples(sample_rate: u32, bits: u16, samples: &[f32]) -> Vec<u8> {
        let mut writer = WavWriter::new(sample_rate, bits).unwrap();
        for &s in samples {
            writer.write_sample(s);
        }
        writer.finalize()
    }

    #[test]
    fn test_writer_reader_round_trip_8_bit() {
        let samples = [0.0, 1.0, -1.0, 0.5, -0.5, 0.25];
        let wav = write_samples(20_000, 8, &samples);

        let mut reader = WavReader::new(&wav).unwrap();
        assert_eq!(reader.sample_count(), samples.len());
        assert_eq!(reader.sample_rate(), 20_000);
        assert_eq!(reader.channel_count(), 1);

        for &expected in &samples {
            let got = reader.read_sample().unwrap();
            // 8-bit quantization is coarse.
            assert!((got - expected).abs() < 0.01, "{} vs {}", got, expected);
        }
        assert_eq!(reader.read_sample(), Err(TapeError::OutOfRange));
    }

    #[test]
    fn test_writer_reader_round_trip_16_bit() {
        let samples = [0.0, 1.0, -1.0, 0.5, -0.5, 0.123];
        let wav = write_samples(44_100, 16, &samples);

        let mut reader = WavReader::new(&wav).unwrap();
        assert_eq!(reader.sample_count(), samples.len());

        for &expected in &samples {
            let got = reader.read_sample().unwrap();
            assert!((got - expected).abs() < 0.0001, "{} vs {}", got, expected);
        }
    }

    #[test]
    fn test_8_bit_normalization_endpoints() {
        // Raw bytes 0, 128 and 255 map to -1.0, ~0.0 and +1.0.
        let mut wav = write_samples(8_000, 8, &[0.0, 0.0, 0.0]);
        let start = wav.len() - 3;
        wav[start] = 0;
        wav[start + 1] = 128;
        wav[start + 2] = 255;

        let mut reader = WavReader::new(&wav).unwrap();
        assert_eq!(reader.read_sample().unwrap(), -1.0);
        assert!((reader.read_sample().unwrap() - (128.0 / 255.0 - 0.5) * 2.0).abs() < 1e-6);
        assert_eq!(reader.read_sample().unwrap(), 1.0);
    }

    #[test]
    fn test_16_bit_asymmetric_normalization() {
        let mut wav = write_samples(8_000, 16, &[0.0, 0.0, 0.0]);
        let start = wav.len() - 6;
        wav[start..start + 2].copy_from_slice(&i16::MIN.to_le_bytes());
        wav[start + 2..start + 4].copy_from_slice(&(-16384i16).to_le_bytes());
        wav[start + 4..start + 6].copy_from_slice(&i16::MAX.to_le_bytes());

        let mut reader = WavReader::new(&wav).unwrap();
        assert_eq!(reader.read_sample().unwrap(), -1.0);
        assert_eq!(reader.read_sample().unwrap(), -0.5);
        assert_eq!(reader.read_sample().unwrap(), 1.0);
    }

    #[test]
    fn test_cursor_seek_and_out_of_range() {
        let wav = write_samples(8_000, 8, &[0.1, 0.2, 0.3, 0.4]);
        let mut reader = WavReader::new(&wav).unwrap();

        reader.set_sample_position(2).unwrap();
        assert_eq!(reader.sample_position(), 2);
        reader.read_sample().unwrap();
        assert_eq!(reader.sample_position(), 3);

        assert_eq!(reader.set_sample_position(4), Err(TapeError::OutOfRange));
        assert_eq!(reader.set_sample_position(100), Err(TapeError::OutOfRange));
    }

    #[test]
    fn test_unknown_chunks_skipped() {
        // Hand-build a container with a junk chunk (odd size, so padded)
        // between fmt and data.
        let mut wav = Vec::new();
        wav.extend_from_slice(b"RIFF");
        wav.extend_from_slice(&0u32.to_le_bytes());
        wav.extend_from_slice(b"WAVE");

        wav.extend_from_slice(b"fmt ");
        wav.extend_from_slice(&16u32.to_le_bytes());
        wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
        wav.extend_from_slice(&1u16.to_le_bytes()); // mono
        wav.extend_from_slice(&8000u32.to_le_bytes());
        wav.extend_from_slice(&8000u32.to_le_bytes());
        wav.extend_from_slice(&1u16.to_le_bytes());
        wav.extend_from_slice(&8u16.to_le_bytes());

        wav.extend_from_slice(b"junk");
        wav.extend_from_slice(&3u32.to_le_bytes());
        wav.extend_from_slice(&[0xAA, 0xBB, 0xCC, 0x00]); // body + pad byte

        wav.extend_from_slice(b"data");
        wav.extend_from_slice(&2u32.to_le_bytes());
        wav.extend_from_slice(&[0, 255]);

        let riff_size = (wav.len() - 8) as u32;
        wav[4..8].copy_from_slice(&riff_size.to_le_bytes());

        let mut reader = WavReader::new(&wav).unwrap();
        assert_eq!(reader.sample_count(), 2);
        assert_eq!(reader.read_sample().unwrap(), -1.0);
        assert_eq!(reader.read_sample().unwrap(), 1.0);
    }

    #[test]
    fn test_missing_chunks_rejected() {
        let mut wav = Vec::new();
        wav.extend_from_slice(b"RIFF");
        wav.extend_from_slice(&4u32.to_le_bytes());
        wav.extend_from_slice(b"WAVE");

        assert_eq!(
            WavReader::new(&wav).err(),
            Some(TapeError::MalformedContainer(
                "could not find WAVE fmt and data chunks"
            ))
        );
    }

    #[test]
    fn test_bad_magic_rejected() {
        assert!(matches!(
            WavReader::new(b"RIFX\x00\x00\x00\x00WAVE"),
            Err(TapeError::MalformedContainer(_))
        ));

        let mut wav = write_samples(8_000, 8, &[0.0]);
        wav[8..12].copy_from_slice(b"AVI ");
        assert_eq!(
            WavReader::new(&wav).err(),
            Some(TapeError::MalformedContainer("missing WAVE identifier"))
        );
    }

    #[test]
    fn test_duplicate_data_chunk_rejected() {
        let mut wav = Vec::new();
        wav.extend_from_slice(b"RIFF");
        wav.extend_from_slice(&0u32.to_le_bytes());
        wav.extend_from_slice(b"WAVE");
        wav.extend_from_slice(b"data");
        wav.extend_from_slice(&0u32.to_le_bytes());
        wav.extend_from_slice(b"data");
        wav.extend_from_slice(&0u32.to_le_bytes());
        let riff_size = (wav.len() - 8) as u32;
        wav[4..8].copy_from_slice(&riff_size.to_le_bytes());

        assert_eq!(
            WavReader::new(&wav).err(),
            Some(TapeError::MalformedContainer(
                "found more than one data chunk"
            ))
        );
    }

    #[test]
    fn test_unsupported_formats_rejected() {
        // Stereo.
        let mut wav = write_samples(8_000, 8, &[0.0]);
        wav[22..24].copy_from_slice(&2u16.to_le_bytes());
        assert_eq!(
            WavReader::new(&wav).err(),
            Some(TapeError::UnsupportedFormat(
                "only mono WAV files are supported"
            ))
        );

        // Float PCM.
        let mut wav = write_samples(8_000, 8, &[0.0]);
        wav[20..22].copy_from_slice(&3u16.to_le_bytes());
        assert_eq!(
            WavReader::new(&wav).err(),
            Some(TapeError::UnsupportedFormat(
                "only integer PCM WAV files are supported"
            ))
        );

        // 24-bit samples.
        let mut wav = write_samples(8_000, 8, &[0.0]);
        wav[32..34].copy_from_slice(&3u16.to_le_bytes());
        wav[34..36].copy_from_slice(&24u16.to_le_bytes());
        assert_eq!(
            WavReader::new(&wav).err(),
            Some(TapeError::UnsupportedFormat(
                "only 8- or 16-bit WAV files are supported"
            ))
        );

        assert_eq!(
            WavWriter::new(8_000, 24).err(),
            Some(TapeError::UnsupportedFormat(
                "only 8- or 16-bit samples are supported"
            ))
        );
    }

    #[test]
    fn test_truncated_data_chunk_rejected() {
        let mut wav = write_samples(8_000, 8, &[0.0, 0.0]);
        // Claim more data than the buffer holds.
        wav[40..44].copy_from_slice(&100u32.to_le_bytes());
        assert_eq!(
            WavReader::new(&wav).err(),
            Some(TapeError::MalformedContainer(
                "chunk body overruns the container"
            ))
        );
    }

    #[test]
    fn test_writer_output_parses_under_hound() {
        let samples = [0.0f32, 0.9, -0.9, 0.3, -0.3];
        let wav = write_samples(20_000, 16, &samples);

        let mut hound_reader = hound::WavReader::new(std::io::Cursor::new(&wav)).unwrap();
        let spec = hound_reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 20_000);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(spec.sample_format, hound::SampleFormat::Int);

        let hound_samples: Vec<i16> = hound_reader
            .samples::<i16>()
            .collect::<std::result::Result<_, _>>()
            .unwrap();
        assert_eq!(hound_samples.len(), samples.len());

        let mut reader = WavReader::new(&wav).unwrap();
        for &h in &hound_samples {
            let ours = reader.read_sample().unwrap();
            let theirs = if h < 0 {
                h as f32 / 32768.0
            } else {
                h as f32 / 32767.0
            };
            assert!((ours - theirs).abs() < 1e-6);
        }
    }

    #[test]
    fn test_patched_sizes() {
        let wav = write_samples(8_000, 8, &[0.0; 10]);
        let riff_size = u32::from_le_bytes(wav[4..8].try_into().unwrap());
        assert_eq!(riff_size as usize, wav.len() - 8);
        let data_size = u32::from_le_bytes(wav[40..44].try_into().unwrap());
        assert_eq!(data_size, 10);
    }
}
