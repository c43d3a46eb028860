//! Continuous-phase FSK tone synthesis.

use std::f64::consts::PI;

use crate::config::ModemParameters;
use crate::error::{ModemError, Result};
use crate::FULL_SCALE;

/// Hann envelope value for sample `i` of a frame of `len` samples.
fn hann(i: usize, len: usize) -> f64 {
    0.5 * (1.0 - (2.0 * PI * i as f64 / len as f64).cos())
}

/// Continuous-phase FSK tone generator
///
/// Each symbol becomes one frame of `samples_per_frame` samples at its tone
/// frequency. The oscillator phase runs on across frame boundaries and each
/// frame is shaped with a Hann envelope to keep energy out of neighbouring bins.
pub struct ToneSynthesizer {
    frequencies: Vec<f32>,
    sample_rate: f64,
    samples_per_frame: usize,
    envelope: Vec<f64>,
}

impl ToneSynthesizer {
    pub fn new(params: &ModemParameters) -> Self {
        let samples_per_frame = params.samples_per_frame;
        Self {
            frequencies: params.frequencies(),
            sample_rate: params.sample_rate as f64,
            samples_per_frame,
            envelope: (0..samples_per_frame)
                .map(|i| hann(i, samples_per_frame))
                .collect(),
        }
    }

    pub fn samples_per_frame(&self) -> usize {
        self.samples_per_frame
    }

    /// Render `symbols` to 16-bit PCM. Phase starts at zero on every call so
    /// identical input always yields identical output.
    pub fn synthesize(&self, symbols: &[usize]) -> Result<Vec<i16>> {
        if let Some(&bad) = symbols.iter().find(|&&s| s >= self.frequencies.len()) {
            return Err(ModemError::InvalidConfig(format!(
                "symbol {} outside tone table of {}",
                bad,
                self.frequencies.len()
            )));
        }

        let mut samples = Vec::with_capacity(symbols.len() * self.samples_per_frame);
        let mut phase = 0.0f64;

        for &symbol in symbols {
            let step = 2.0 * PI * self.frequencies[symbol] as f64 / self.sample_rate;
            for &amplitude in &self.envelope {
                let value = amplitude * phase.sin() * FULL_SCALE as f64;
                samples.push(value.round().clamp(-(FULL_SCALE as f64), FULL_SCALE as f64) as i16);

                phase += step;
                if phase >= 2.0 * PI {
                    phase -= 2.0 * PI;
                }
            }
        }

        log::debug!(
            "Synthesized {} symbols into {} samples",
            symbols.len(),
            samples.len()
        );
        Ok(samples)
    }
}

/// Group MSB-first bits into symbols of `bits_per_symbol` bits, zero-padding
/// the final symbol.
pub fn bits_to_symbols(bits: &[bool], bits_per_symbol: usize) -> Vec<usize> {
    bits.chunks(bits_per_symbol)
        .map(|chunk| {
            let mut symbol = 0usize;
            for i in 0..bits_per_symbol {
                symbol <<= 1;
                if chunk.get(i).copied().unwrap_or(false) {
                    symbol |= 1;
                }
            }
            symbol
        })
        .collect()
}

/// Expand symbols back to MSB-first bits.
pub fn symbols_to_bits(symbols: &[usize], bits_per_symbol: usize) -> Vec<bool> {
    let mut bits = Vec::with_capacity(symbols.len() * bits_per_symbol);
    for &symbol in symbols {
        for shift in (0..bits_per_symbol).rev() {
            bits.push((symbol >> shift) & 1 == 1);
        }
    }
    bits
}
