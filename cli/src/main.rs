use clap::{Parser, Subcommand};
use hound::WavSpec;
use std::fs::File;
use std::path::{Path, PathBuf};
use thiserror::Error;
use ultrasonic_core::{Modem, ModemError, ModemParameters};

#[derive(Debug, Error)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("Invalid config file: {0}")]
    Config(#[from] serde_json::Error),

    #[error(transparent)]
    Modem(#[from] ModemError),

    #[error("{0}")]
    Usage(String),
}

#[derive(Parser)]
#[command(name = "ultrasonic")]
#[command(about = "Near-ultrasonic FSK modem for short messages")]
struct Cli {
    /// JSON file with modem parameters (missing fields use defaults)
    #[arg(long, global = true, value_name = "PARAMS.JSON")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode a message to a 16-bit mono WAV file
    Encode {
        /// Message text (omit when using --input)
        message: Option<String>,

        /// Read the message bytes from a file instead
        #[arg(short, long, value_name = "INPUT.BIN")]
        input: Option<PathBuf>,

        /// Output WAV file
        #[arg(short, long, value_name = "OUTPUT.WAV")]
        output: PathBuf,
    },

    /// Decode a WAV file back to the message
    Decode {
        /// Input WAV file
        #[arg(value_name = "INPUT.WAV")]
        input: PathBuf,

        /// Write decoded bytes here instead of printing them
        #[arg(short, long, value_name = "OUTPUT.BIN")]
        output: Option<PathBuf>,

        /// Print the raw frame bits without synchronisation or FEC
        #[arg(long)]
        raw_bits: bool,
    },

    /// Report the dominant frequency of a WAV file
    Check {
        /// Input WAV file
        #[arg(value_name = "INPUT.WAV")]
        input: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let params = load_parameters(cli.config.as_deref())?;

    match cli.command {
        Commands::Encode { message, input, output } => {
            encode_command(params, message, input.as_deref(), &output)?
        }
        Commands::Decode { input, output, raw_bits } => {
            decode_command(params, &input, output.as_deref(), raw_bits)?
        }
        Commands::Check { input } => check_command(params, &input)?,
    }

    Ok(())
}

fn load_parameters(path: Option<&Path>) -> Result<ModemParameters, CliError> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            let params: ModemParameters = serde_json::from_str(&text)?;
            log::info!("Loaded parameters from {}", path.display());
            Ok(params)
        }
        None => Ok(ModemParameters::default()),
    }
}

fn encode_command(
    params: ModemParameters,
    message: Option<String>,
    input: Option<&Path>,
    output: &Path,
) -> Result<(), CliError> {
    let data = match (message, input) {
        (Some(text), None) => text.into_bytes(),
        (None, Some(path)) => {
            let data = std::fs::read(path)?;
            println!("Read {} bytes from {}", data.len(), path.display());
            data
        }
        _ => {
            return Err(CliError::Usage(
                "provide either a message or --input, not both".to_string(),
            ))
        }
    };

    let sample_rate = params.sample_rate;
    let modem = Modem::new(params)?;
    let samples = modem.encode(&data)?;
    println!("Encoded {} bytes to {} audio samples", data.len(), samples.len());

    write_wav(output, sample_rate, &samples)?;
    println!("Wrote {}", output.display());
    Ok(())
}

fn decode_command(
    params: ModemParameters,
    input: &Path,
    output: Option<&Path>,
    raw_bits: bool,
) -> Result<(), CliError> {
    let samples = read_wav(input, params.sample_rate)?;
    println!("Extracted {} samples", samples.len());

    let mut modem = Modem::new(params)?;

    if raw_bits {
        let bits = modem.decode(&samples)?;
        let text: String = bits.iter().map(|&b| if b { '1' } else { '0' }).collect();
        println!("{}", text);
        return Ok(());
    }

    let data = modem.receive_text(&samples)?;
    println!("Decoded {} bytes", data.len());

    match output {
        Some(path) => {
            std::fs::write(path, &data)?;
            println!("Wrote {} bytes to {}", data.len(), path.display());
        }
        None => println!("{}", String::from_utf8_lossy(&data)),
    }
    Ok(())
}

fn check_command(params: ModemParameters, input: &Path) -> Result<(), CliError> {
    let samples = read_wav(input, params.sample_rate)?;
    let mut modem = Modem::new(params)?;

    let freq = modem.dominant_frequency(&samples)?;
    let in_band = modem.is_in_band(&samples)?;
    println!(
        "Dominant frequency: {:.1} Hz ({})",
        freq,
        if in_band { "in band" } else { "out of band" }
    );
    Ok(())
}

fn write_wav(path: &Path, sample_rate: u32, samples: &[i16]) -> Result<(), CliError> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let file = File::create(path)?;
    let mut writer = hound::WavWriter::new(file, spec)?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}

fn read_wav(path: &Path, expected_rate: u32) -> Result<Vec<i16>, CliError> {
    let file = File::open(path)?;
    let mut reader = hound::WavReader::new(file)?;

    let spec = reader.spec();
    println!(
        "Read WAV: {} Hz, {} channels, {} bits",
        spec.sample_rate, spec.channels, spec.bits_per_sample
    );
    if spec.sample_rate != expected_rate {
        log::warn!(
            "WAV sample rate {} differs from configured {}",
            spec.sample_rate,
            expected_rate
        );
    }

    // Keep the first channel only
    let channels = spec.channels.max(1) as usize;
    let samples = match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .step_by(channels)
            .collect::<Result<Vec<_>, _>>()?,
        (hound::SampleFormat::Float, 32) => reader
            .samples::<f32>()
            .step_by(channels)
            .map(|s| s.map(|x| (x.clamp(-1.0, 1.0) * 32767.0) as i16))
            .collect::<Result<Vec<_>, _>>()?,
        _ => {
            return Err(CliError::Usage(format!(
                "unsupported WAV format: {:?} {} bits",
                spec.sample_format, spec.bits_per_sample
            )))
        }
    };

    Ok(samples)
}
