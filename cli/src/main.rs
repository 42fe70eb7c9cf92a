use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tapewave_core::{
    decode_from_envelope, demodulate, encode_to_envelope, envelope, modulate, ModulatorConfig,
    WavReader,
};

#[derive(Parser)]
#[command(name = "tapewave")]
#[command(about = "Convert binary data to and from cassette-interface FSK audio")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Suppress status output
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode a binary (or .tap) file to WAV audio
    Encode {
        /// Input file (raw binary, or a tape container if --tap or *.tap)
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Output WAV file
        #[arg(value_name = "OUTPUT.WAV")]
        output: PathBuf,

        /// Treat the input as an already-wrapped tape container
        #[arg(long)]
        tap: bool,

        /// Leader (pilot tone) duration in seconds
        #[arg(short, long, default_value = "3.0")]
        sync: f32,

        /// Output sample rate in Hz
        #[arg(long, default_value = "20000")]
        sample_rate: u32,

        /// Baud rate (wave cycles per second for 0 bits)
        #[arg(long, default_value = "2500")]
        baud_rate: u32,

        /// Output sample depth (8 or 16)
        #[arg(long, default_value = "8")]
        bits_per_sample: u16,

        /// Invert the waveform phase
        #[arg(long)]
        reverse_phase: bool,
    },

    /// Decode a WAV (or .tap) file back to binary data
    Decode {
        /// Input file (WAV audio, or a tape container if *.tap)
        #[arg(value_name = "INPUT.WAV")]
        input: PathBuf,

        /// Output file
        #[arg(value_name = "OUTPUT")]
        output: PathBuf,

        /// Write the full tape container instead of the unwrapped data
        #[arg(long)]
        tap: bool,
    },
}

fn has_tap_extension(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("tap"))
        .unwrap_or(false)
}

/// Duration of a WAV buffer, taken from its own fmt/data chunks.
fn audio_seconds(wav: &[u8]) -> tapewave_core::Result<f64> {
    let reader = WavReader::new(wav)?;
    Ok(reader.sample_count() as f64 / reader.sample_rate() as f64)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Encode {
            input,
            output,
            tap,
            sync,
            sample_rate,
            baud_rate,
            bits_per_sample,
            reverse_phase,
        } => {
            let config = ModulatorConfig {
                sample_rate,
                baud_rate,
                bits_per_sample,
                sync_seconds: sync,
                reverse_phase,
            };
            encode_command(&input, &output, tap, &config, cli.quiet)
        }
        Commands::Decode { input, output, tap } => {
            decode_command(&input, &output, tap, cli.quiet)
        }
    }
}

fn encode_command(
    input_path: &Path,
    output_path: &Path,
    tap: bool,
    config: &ModulatorConfig,
    quiet: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = std::fs::read(input_path)?;
    log::debug!(
        "encoding with sample_rate={} baud_rate={} bits={} sync={}s reverse_phase={}",
        config.sample_rate,
        config.baud_rate,
        config.bits_per_sample,
        config.sync_seconds,
        config.reverse_phase
    );

    // A .tap input is already an envelope; validate it rather than wrapping.
    let envelope_bytes = if tap || has_tap_extension(input_path) {
        envelope::validate(&data)?;
        data
    } else {
        encode_to_envelope(&data)?
    };

    let wav = modulate(&envelope_bytes, config)?;
    std::fs::write(output_path, &wav)?;

    if !quiet {
        let seconds = audio_seconds(&wav)?;
        println!(
            "Read {} bytes from {} and wrote {:.2} seconds of audio to {}.",
            envelope_bytes.len(),
            input_path.display(),
            seconds,
            output_path.display()
        );
    }
    Ok(())
}

fn decode_command(
    input_path: &Path,
    output_path: &Path,
    tap: bool,
    quiet: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = std::fs::read(input_path)?;

    // A .tap input is already an envelope; otherwise demodulate the audio.
    let envelope_bytes = if has_tap_extension(input_path) {
        envelope::validate(&data)?;
        data
    } else {
        demodulate(&data)?
    };

    let write_tap = tap || has_tap_extension(output_path);
    let out = if write_tap {
        envelope_bytes.clone()
    } else {
        decode_from_envelope(&envelope_bytes)?
    };
    std::fs::write(output_path, &out)?;

    if !quiet {
        println!(
            "Read {} bytes from {} and wrote {} bytes to {}.",
            envelope_bytes.len(),
            input_path.display(),
            out.len(),
            output_path.display()
        );
    }
    Ok(())
}
