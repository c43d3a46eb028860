//! Real-input FFT with cached plan and scratch buffers.
//!
//! The plan, input buffer, output buffer and scratch space are sized for the
//! last transform length and rebuilt only when that length changes.

use realfft::num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};
use std::sync::Arc;

use crate::error::{ModemError, Result};

/// Cached state for one transform length.
struct Plan {
    len: usize,
    r2c: Arc<dyn RealToComplex<f32>>,
    input: Vec<f32>,
    output: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
}

/// Owns the FFT planner and the work buffers for the last used length.
pub struct TransformEngine {
    planner: RealFftPlanner<f32>,
    plan: Option<Plan>,
}

impl TransformEngine {
    pub fn new() -> Self {
        Self {
            planner: RealFftPlanner::new(),
            plan: None,
        }
    }

    /// Length the scratch state is currently sized for, if any.
    pub fn cached_len(&self) -> Option<usize> {
        self.plan.as_ref().map(|p| p.len)
    }

    /// Drop the cached plan so the next call rebuilds it.
    pub fn invalidate(&mut self) {
        self.plan = None;
    }

    /// Forward transform of `samples` zero-padded to `n`.
    ///
    /// Returns `n/2 + 1` bins from DC to Nyquist. The slice borrows the
    /// engine's output buffer and is overwritten by the next call.
    pub fn transform(&mut self, samples: &[f32], n: usize) -> Result<&[Complex<f32>]> {
        if n == 0 || !n.is_power_of_two() {
            return Err(ModemError::InvalidConfig(format!(
                "transform length must be a power of two, got {}",
                n
            )));
        }
        if samples.len() > n {
            return Err(ModemError::InputTooLarge {
                len: samples.len(),
                capacity: n,
            });
        }

        if self.cached_len() != Some(n) {
            log::debug!("Planning real FFT of length {}", n);
            let r2c = self.planner.plan_fft_forward(n);
            self.plan = Some(Plan {
                len: n,
                input: r2c.make_input_vec(),
                output: r2c.make_output_vec(),
                scratch: r2c.make_scratch_vec(),
                r2c,
            });
        }

        let plan = match self.plan.as_mut() {
            Some(plan) => plan,
            None => return Err(ModemError::FftError("transform plan missing".to_string())),
        };

        plan.input[..samples.len()].copy_from_slice(samples);
        plan.input[samples.len()..].iter_mut().for_each(|x| *x = 0.0);

        plan.r2c
            .process_with_scratch(&mut plan.input, &mut plan.output, &mut plan.scratch)
            .map_err(|e| ModemError::FftError(format!("forward transform failed: {:?}", e)))?;

        Ok(&plan.output)
    }

    /// Magnitudes of the transform of `samples` zero-padded to `n`.
    pub fn magnitudes(&mut self, samples: &[f32], n: usize) -> Result<Vec<f32>> {
        Ok(self.transform(samples, n)?.iter().map(|c| c.norm()).collect())
    }
}

impl Default for TransformEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Nearest integer bin for `frequency` in a transform of length `n`.
pub fn frequency_to_bin(frequency: f32, n: usize, sample_rate: u32) -> usize {
    (frequency * n as f32 / sample_rate as f32).round() as usize
}

/// Centre frequency of `bin` in a transform of length `n`.
pub fn bin_to_frequency(bin: usize, n: usize, sample_rate: u32) -> f32 {
    bin as f32 * sample_rate as f32 / n as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn tone(freq: f32, len: usize, sample_rate: f32) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * PI * freq * i as f32 / sample_rate).sin())
            .collect()
    }

    #[test]
    fn test_output_length() {
        let mut engine = TransformEngine::new();
        let spectrum = engine.transform(&[0.0; 512], 512).unwrap();
        assert_eq!(spectrum.len(), 257);
    }

    #[test]
    fn test_tone_peaks_at_expected_bin() {
        let mut engine = TransformEngine::new();
        let signal = tone(15000.0, 512, 48000.0);
        let mags = engine.magnitudes(&signal, 512).unwrap();

        let peak = mags
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak, frequency_to_bin(15000.0, 512, 48000));
        assert_eq!(peak, 160);
    }

    #[test]
    fn test_short_input_zero_padded() {
        let mut engine = TransformEngine::new();
        let signal = tone(16000.0, 480, 48000.0);

        let padded = {
            let mut v = signal.clone();
            v.resize(512, 0.0);
            engine.magnitudes(&v, 512).unwrap()
        };
        let implicit = engine.magnitudes(&signal, 512).unwrap();

        for (a, b) in padded.iter().zip(implicit.iter()) {
            assert!((a - b).abs() < 1e-4);
        }
    }

    #[test]
    fn test_input_too_large() {
        let mut engine = TransformEngine::new();
        match engine.transform(&[0.0; 600], 512) {
            Err(ModemError::InputTooLarge { len, capacity }) => {
                assert_eq!(len, 600);
                assert_eq!(capacity, 512);
            }
            other => panic!("Expected InputTooLarge, got {:?}", other.map(|s| s.len())),
        }
    }

    #[test]
    fn test_non_power_of_two_rejected() {
        let mut engine = TransformEngine::new();
        assert!(engine.transform(&[0.0; 10], 480).is_err());
        assert!(engine.transform(&[], 0).is_err());
    }

    #[test]
    fn test_resize_does_not_change_results() {
        let mut engine = TransformEngine::new();
        let signal = tone(15000.0, 256, 48000.0);

        let first = engine.magnitudes(&signal, 512).unwrap();
        assert_eq!(engine.cached_len(), Some(512));

        let _ = engine.magnitudes(&signal, 1024).unwrap();
        assert_eq!(engine.cached_len(), Some(1024));

        let again = engine.magnitudes(&signal, 512).unwrap();
        assert_eq!(engine.cached_len(), Some(512));
        assert_eq!(first, again);

        let mut fresh = TransformEngine::new();
        assert_eq!(fresh.magnitudes(&signal, 512).unwrap(), first);
    }

    #[test]
    fn test_invalidate_clears_cache() {
        let mut engine = TransformEngine::new();
        let _ = engine.transform(&[1.0; 8], 8).unwrap();
        assert_eq!(engine.cached_len(), Some(8));
        engine.invalidate();
        assert_eq!(engine.cached_len(), None);
    }
}
