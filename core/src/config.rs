//! Session configuration for the modem.
//!
//! `ModemParameters` is the record callers get and set; every derived table
//! (tone frequencies, codec, transform size) is computed from it.

use crate::error::{ModemError, Result};
use crate::{
    DEFAULT_DF, DEFAULT_F0, DEFAULT_MARKER_BITS, DEFAULT_MARKER_FRAMES, DEFAULT_NUM_FREQS,
    DEFAULT_PREAMBLE_SAMPLES, DEFAULT_RS_ECC_LENGTH, DEFAULT_RS_MSG_LENGTH,
    DEFAULT_SAMPLES_PER_FRAME, DEFAULT_SAMPLE_RATE, MAX_CODEWORD_LENGTH,
};

/// Physical and framing parameters of one modem session.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ModemParameters {
    pub sample_rate: u32,
    /// Samples per symbol frame
    pub samples_per_frame: usize,
    pub marker_bits: usize,
    pub marker_frames: usize,
    /// Lowest tone frequency in Hz
    pub f0: f32,
    /// Spacing between adjacent tones in Hz
    pub df: f32,
    pub num_freqs: usize,
    /// Message bytes per Reed-Solomon codeword
    pub rs_msg_length: usize,
    /// Parity bytes per Reed-Solomon codeword
    pub rs_ecc_length: usize,
    /// Preamble length in samples
    pub preamble_samples: usize,
}

impl Default for ModemParameters {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            samples_per_frame: DEFAULT_SAMPLES_PER_FRAME,
            marker_bits: DEFAULT_MARKER_BITS,
            marker_frames: DEFAULT_MARKER_FRAMES,
            f0: DEFAULT_F0,
            df: DEFAULT_DF,
            num_freqs: DEFAULT_NUM_FREQS,
            rs_msg_length: DEFAULT_RS_MSG_LENGTH,
            rs_ecc_length: DEFAULT_RS_ECC_LENGTH,
            preamble_samples: DEFAULT_PREAMBLE_SAMPLES,
        }
    }
}

impl ModemParameters {
    /// Check every invariant the rest of the pipeline relies on.
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(ModemError::InvalidConfig("sample rate must be positive".to_string()));
        }
        if self.samples_per_frame == 0 {
            return Err(ModemError::InvalidConfig("samples per frame must be positive".to_string()));
        }
        if self.num_freqs < 2 || !self.num_freqs.is_power_of_two() {
            return Err(ModemError::InvalidConfig(format!(
                "number of tones must be a power of two >= 2, got {}",
                self.num_freqs
            )));
        }
        if self.preamble_samples == 0 {
            return Err(ModemError::InvalidConfig("preamble length must be positive".to_string()));
        }
        if self.marker_bits == 0 || self.marker_frames * self.bits_per_symbol() < self.marker_bits {
            return Err(ModemError::InvalidConfig(format!(
                "{} marker frames cannot carry {} marker bits",
                self.marker_frames, self.marker_bits
            )));
        }
        if !(self.f0 > 0.0) || !(self.df > 0.0) {
            return Err(ModemError::InvalidConfig(format!(
                "f0 and df must be positive, got f0={} df={}",
                self.f0, self.df
            )));
        }

        let nyquist = self.sample_rate as f32 / 2.0;
        let highest = self.highest_frequency();
        if highest >= nyquist {
            return Err(ModemError::InvalidConfig(format!(
                "tone {:.1} Hz is at or above Nyquist ({:.1} Hz)",
                highest, nyquist
            )));
        }

        let bin_width = self.sample_rate as f32 / self.analysis_size() as f32;
        if self.df < bin_width {
            return Err(ModemError::InvalidConfig(format!(
                "tone spacing {:.1} Hz is narrower than one analysis bin ({:.1} Hz)",
                self.df, bin_width
            )));
        }

        if self.rs_ecc_length == 0 || self.rs_ecc_length % 2 != 0 {
            return Err(ModemError::InvalidConfig(format!(
                "parity length must be even and positive, got {}",
                self.rs_ecc_length
            )));
        }
        let codeword = self.codeword_length();
        if codeword == 0 || codeword > MAX_CODEWORD_LENGTH {
            return Err(ModemError::InvalidConfig(format!(
                "codeword length must be in 1..={}, got {}",
                MAX_CODEWORD_LENGTH, codeword
            )));
        }

        Ok(())
    }

    /// Tone table: `f0 + i * df` for every symbol index.
    pub fn frequencies(&self) -> Vec<f32> {
        (0..self.num_freqs)
            .map(|i| self.f0 + i as f32 * self.df)
            .collect()
    }

    pub fn highest_frequency(&self) -> f32 {
        self.f0 + (self.num_freqs.saturating_sub(1)) as f32 * self.df
    }

    pub fn bits_per_symbol(&self) -> usize {
        self.num_freqs.trailing_zeros() as usize
    }

    pub fn codeword_length(&self) -> usize {
        self.rs_msg_length + self.rs_ecc_length
    }

    /// Symbols needed to carry one full codeword.
    pub fn symbols_per_codeword(&self) -> usize {
        let bits = 8 * self.codeword_length();
        let per_symbol = self.bits_per_symbol().max(1);
        (bits + per_symbol - 1) / per_symbol
    }

    /// Transform length used for per-frame analysis.
    pub fn analysis_size(&self) -> usize {
        self.samples_per_frame.next_power_of_two()
    }

    /// Preamble length rounded up to a whole number of frames.
    pub fn preamble_frames(&self) -> usize {
        (self.preamble_samples + self.samples_per_frame - 1) / self.samples_per_frame
    }
}

/// Tunable decision thresholds for synchronisation and bit slicing.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DetectionThresholds {
    /// Mean square per normalised sample a full-scale window must exceed to count as preamble
    pub preamble_energy: f32,
    /// Loudest-window mean square below which a capture is treated as silence
    pub preamble_min_energy: f32,
    /// Tone magnitude (normalised by frame length) below which a frame is silence
    pub noise_floor: f32,
    /// Upper tone must beat the lower tone by this ratio to decide a one
    pub relative: f32,
    /// Raise the noise floor from recent spectral history
    pub smoothing: bool,
}

impl Default for DetectionThresholds {
    fn default() -> Self {
        Self {
            preamble_energy: crate::DEFAULT_PREAMBLE_THRESHOLD,
            preamble_min_energy: crate::DEFAULT_PREAMBLE_MIN_ENERGY,
            noise_floor: crate::DEFAULT_NOISE_FLOOR,
            relative: crate::DEFAULT_RELATIVE_THRESHOLD,
            smoothing: false,
        }
    }
}
