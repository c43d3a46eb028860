//! Near-ultrasonic acoustic modem for short messages
//!
//! Binary (or 2^k-ary) FSK with Hann-shaped continuous-phase tones, a chirp
//! preamble for synchronisation and Reed-Solomon FEC over a fixed codeword.

pub mod config;
pub mod demod;
pub mod error;
pub mod fft;
pub mod framing;
pub mod history;
pub mod modem;
pub mod stream;
pub mod sync;
pub mod tone;

pub use config::{DetectionThresholds, ModemParameters};
pub use demod::SpectralDemodulator;
pub use error::{ModemError, Result};
pub use fft::TransformEngine;
pub use framing::{bits_of, bytes_from_bits, Framer};
pub use history::SpectralHistory;
pub use modem::Modem;
pub use stream::StreamDemodulator;
pub use sync::PreambleDetector;
pub use tone::ToneSynthesizer;

// Default session parameters
pub const DEFAULT_SAMPLE_RATE: u32 = 48000;
pub const DEFAULT_SAMPLES_PER_FRAME: usize = 512; // ~10.7 ms per symbol
pub const DEFAULT_MARKER_BITS: usize = 16;
pub const DEFAULT_MARKER_FRAMES: usize = 16;
pub const DEFAULT_F0: f32 = 15000.0; // Hz
pub const DEFAULT_DF: f32 = 1000.0; // Hz
pub const DEFAULT_NUM_FREQS: usize = 2;
pub const DEFAULT_PREAMBLE_SAMPLES: usize = 2048; // 4 frames

// FEC configuration
pub const DEFAULT_RS_MSG_LENGTH: usize = 32;
pub const DEFAULT_RS_ECC_LENGTH: usize = 8;
pub const MAX_CODEWORD_LENGTH: usize = 255; // GF(2^8)

// Detection
pub const DEFAULT_PREAMBLE_THRESHOLD: f32 = 0.4; // full-scale chirp sits at 0.5
pub const DEFAULT_PREAMBLE_MIN_ENERGY: f32 = 0.02; // ~0.2 of full scale
pub const DEFAULT_NOISE_FLOOR: f32 = 0.01;
pub const DEFAULT_RELATIVE_THRESHOLD: f32 = 1.2;
pub const SPECTRUM_HISTORY_SIZE: usize = 8;

/// Peak sample value of synthesized audio
pub const FULL_SCALE: i16 = 32767;

/// Map a PCM sample into [-1, 1).
#[inline]
pub fn normalize_sample(sample: i16) -> f32 {
    sample as f32 / 32768.0
}
