use std::f64::consts::PI;

use crate::config::ModemParameters;
use crate::{normalize_sample, FULL_SCALE};

/// Generates a linear chirp sweeping from `start_freq` to `end_freq`
pub fn generate_chirp(
    duration_samples: usize,
    start_freq: f32,
    end_freq: f32,
    sample_rate: u32,
) -> Vec<i16> {
    let sample_rate = sample_rate as f64;
    let duration = duration_samples as f64 / sample_rate;
    let k = if duration > 0.0 {
        (end_freq as f64 - start_freq as f64) / duration
    } else {
        0.0
    };

    (0..duration_samples)
        .map(|n| {
            let t = n as f64 / sample_rate;
            let phase = 2.0 * PI * (start_freq as f64 * t + k * t * t / 2.0);
            (FULL_SCALE as f64 * phase.sin()).round() as i16
        })
        .collect()
}

/// Generates the preamble: an ascending chirp spanning the tone table
pub fn generate_preamble(params: &ModemParameters) -> Vec<i16> {
    generate_chirp(
        params.preamble_samples,
        params.f0,
        params.highest_frequency(),
        params.sample_rate,
    )
}

/// Mean square of a full-scale sine, normalised
const FULL_SCALE_MEAN_SQUARE: f64 = 0.5;

/// Sliding-window energy detector for the preamble
///
/// The threshold is stated for a full-scale capture. Quieter captures scale it
/// down by their loudest window, so the crossing keeps the same position
/// relative to the preamble at any gain. Captures whose loudest window stays
/// below `min_energy` are treated as silence.
#[derive(Debug, Clone)]
pub struct PreambleDetector {
    window: usize,
    threshold: f32,
    min_energy: f32,
}

impl PreambleDetector {
    /// `threshold` is the mean square per normalised sample a full-scale
    /// window must exceed, so the absolute energy bound is `threshold * window`.
    pub fn new(window: usize, threshold: f32) -> Self {
        Self {
            window,
            threshold,
            min_energy: crate::DEFAULT_PREAMBLE_MIN_ENERGY,
        }
    }

    pub fn with_min_energy(mut self, min_energy: f32) -> Self {
        self.min_energy = min_energy;
        self
    }

    pub fn min_energy(&self) -> f32 {
        self.min_energy
    }

    pub fn set_min_energy(&mut self, min_energy: f32) {
        self.min_energy = min_energy;
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn set_threshold(&mut self, threshold: f32) {
        self.threshold = threshold;
    }

    /// Prefix sums of squared normalised samples.
    fn energy_prefix(signal: &[i16]) -> Vec<f64> {
        let mut prefix = vec![0.0f64; signal.len() + 1];
        for (k, &s) in signal.iter().enumerate() {
            let x = normalize_sample(s) as f64;
            prefix[k + 1] = prefix[k] + x * x;
        }
        prefix
    }

    fn window_energy(&self, prefix: &[f64], i: usize) -> f64 {
        prefix[i + self.window] - prefix[i]
    }

    /// First offset whose window energy exceeds the level-scaled threshold.
    pub fn detect(&self, signal: &[i16]) -> Option<usize> {
        if self.window == 0 || signal.len() < self.window {
            return None;
        }

        let prefix = Self::energy_prefix(signal);
        let offsets = 0..=signal.len() - self.window;
        let window = self.window as f64;

        let peak = offsets
            .clone()
            .map(|i| self.window_energy(&prefix, i))
            .fold(0.0f64, f64::max);
        if peak <= self.min_energy as f64 * window {
            return None;
        }

        let level = (peak / (FULL_SCALE_MEAN_SQUARE * window)).min(1.0);
        let bound = self.threshold as f64 * window * level;
        if level < 1.0 {
            log::debug!("Capture at {:.1}% of full-scale energy", level * 100.0);
        }

        offsets.into_iter().find(|&i| self.window_energy(&prefix, i) > bound)
    }

    /// Like [`detect`](Self::detect), but reports absence as `signal.len()`.
    pub fn detect_or_len(&self, signal: &[i16]) -> usize {
        self.detect(signal).unwrap_or(signal.len())
    }

    /// Locate the preamble start: the energy peak within one window after the
    /// first threshold crossing.
    pub fn align(&self, signal: &[i16]) -> Option<usize> {
        let first = self.detect(signal)?;
        let prefix = Self::energy_prefix(signal);
        let last = (first + self.window).min(signal.len() - self.window);

        let mut best = first;
        let mut best_energy = f64::MIN;
        for i in first..=last {
            let energy = self.window_energy(&prefix, i);
            if energy > best_energy {
                best_energy = energy;
                best = i;
            }
        }

        log::debug!(
            "Preamble crossing at {}, energy peak at {} ({:.1})",
            first,
            best,
            best_energy
        );
        Some(best)
    }
}
