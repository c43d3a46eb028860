//! Bounded history of recent frame spectra.
//!
//! The demodulator pushes one spectrum per frame and can read back an
//! averaged magnitude spectrum to estimate the background level.

use std::cmp::Ordering;
use std::collections::VecDeque;

use realfft::num_complex::Complex;

use crate::error::{ModemError, Result};
use crate::SPECTRUM_HISTORY_SIZE;

pub struct SpectralHistory {
    capacity: usize,
    spectra: VecDeque<Vec<Complex<f32>>>,
}

impl SpectralHistory {
    pub fn new() -> Self {
        Self::with_capacity(SPECTRUM_HISTORY_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            spectra: VecDeque::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.spectra.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spectra.is_empty()
    }

    pub fn clear(&mut self) {
        self.spectra.clear();
    }

    /// Append a spectrum, evicting the oldest once full.
    pub fn push(&mut self, spectrum: &[Complex<f32>]) {
        if self.spectra.len() == self.capacity {
            self.spectra.pop_front();
        }
        self.spectra.push_back(spectrum.to_vec());
    }

    /// Element-wise mean magnitude over every retained spectrum.
    ///
    /// Spectra of differing lengths are averaged over their common prefix.
    pub fn average_spectrum(&self) -> Result<Vec<f32>> {
        let len = match self.spectra.iter().map(|s| s.len()).min() {
            Some(len) => len,
            None => return Err(ModemError::EmptyHistory),
        };

        let mut sum = vec![0.0f32; len];
        for spectrum in &self.spectra {
            for (acc, bin) in sum.iter_mut().zip(spectrum.iter()) {
                *acc += bin.norm();
            }
        }

        let count = self.spectra.len() as f32;
        sum.iter_mut().for_each(|x| *x /= count);
        Ok(sum)
    }

    /// Scale magnitudes so the largest is 1.
    pub fn normalize(spectrum: &[f32]) -> Result<Vec<f32>> {
        let peak = spectrum.iter().cloned().fold(0.0f32, f32::max);
        if !(peak > 0.0) {
            return Err(ModemError::DegenerateSpectrum);
        }
        Ok(spectrum.iter().map(|&x| x / peak).collect())
    }

    /// Median of the averaged spectrum, as a background level estimate.
    pub fn background_level(&self) -> Result<f32> {
        let average = self.average_spectrum()?;
        let peak = average.iter().cloned().fold(0.0f32, f32::max);
        let mut normalized = Self::normalize(&average)?;
        normalized.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        Ok(normalized[normalized.len() / 2] * peak)
    }
}

impl Default for SpectralHistory {
    fn default() -> Self {
        Self::new()
    }
}
