use crate::config::{DetectionThresholds, ModemParameters};
use crate::error::Result;
use crate::fft::{frequency_to_bin, TransformEngine};
use crate::history::SpectralHistory;
use crate::normalize_sample;
use crate::tone::symbols_to_bits;

/// The smoothed floor sits this far above the median background bin.
const SMOOTHING_FLOOR_MARGIN: f32 = 4.0;

/// Frame-synchronous FFT demodulator
///
/// Each frame is normalised, transformed at the analysis length and reduced
/// to the magnitude at every tone bin. Binary decisions use an energy ratio
/// so a uniform channel gain does not move the decision boundary; frames
/// where no tone clears the noise floor decode as symbol 0.
pub struct SpectralDemodulator {
    engine: TransformEngine,
    history: SpectralHistory,
    thresholds: DetectionThresholds,
    samples_per_frame: usize,
    analysis_size: usize,
    bins: Vec<usize>,
    bits_per_symbol: usize,
    frame: Vec<f32>,
}

impl SpectralDemodulator {
    pub fn new(params: &ModemParameters, thresholds: DetectionThresholds) -> Self {
        let analysis_size = params.analysis_size();
        let bins = params
            .frequencies()
            .iter()
            .map(|&f| frequency_to_bin(f, analysis_size, params.sample_rate))
            .collect();

        Self {
            engine: TransformEngine::new(),
            history: SpectralHistory::new(),
            thresholds,
            samples_per_frame: params.samples_per_frame,
            analysis_size,
            bins,
            bits_per_symbol: params.bits_per_symbol(),
            frame: Vec::with_capacity(analysis_size),
        }
    }

    pub fn thresholds(&self) -> &DetectionThresholds {
        &self.thresholds
    }

    pub fn set_thresholds(&mut self, thresholds: DetectionThresholds) {
        self.thresholds = thresholds;
        self.history.clear();
    }

    pub fn samples_per_frame(&self) -> usize {
        self.samples_per_frame
    }

    /// FFT bin index of every tone.
    pub fn tone_bins(&self) -> &[usize] {
        &self.bins
    }

    pub fn history(&self) -> &SpectralHistory {
        &self.history
    }

    /// Forget smoothing state between independent signals.
    pub fn reset(&mut self) {
        self.history.clear();
    }

    /// Magnitude at each tone bin, scaled by the frame length.
    pub fn tone_magnitudes(&mut self, frame: &[i16]) -> Result<Vec<f32>> {
        self.frame.clear();
        self.frame.extend(frame.iter().map(|&s| normalize_sample(s)));

        let spectrum = self.engine.transform(&self.frame, self.analysis_size)?;
        let scale = self.samples_per_frame as f32;
        let mags = self.bins.iter().map(|&b| spectrum[b].norm() / scale).collect();

        if self.thresholds.smoothing {
            self.history.push(spectrum);
        }
        Ok(mags)
    }

    fn noise_floor(&self) -> f32 {
        let floor = self.thresholds.noise_floor;
        if !self.thresholds.smoothing || self.history.is_empty() {
            return floor;
        }

        match self.history.background_level() {
            Ok(level) => {
                floor.max(SMOOTHING_FLOOR_MARGIN * level / self.samples_per_frame as f32)
            }
            Err(e) => {
                log::warn!("No smoothing baseline ({}), using fixed floor", e);
                floor
            }
        }
    }

    /// Mean magnitude spectrum over all frames of `samples`, scaled by the
    /// frame length. Smoothing history is left untouched.
    pub fn average_magnitudes(&mut self, samples: &[i16]) -> Result<Vec<f32>> {
        let mut sum = vec![0.0f32; self.analysis_size / 2 + 1];
        let mut frames = 0usize;

        for frame in samples.chunks(self.samples_per_frame) {
            self.frame.clear();
            self.frame.extend(frame.iter().map(|&s| normalize_sample(s)));
            let spectrum = self.engine.transform(&self.frame, self.analysis_size)?;
            for (acc, bin) in sum.iter_mut().zip(spectrum.iter()) {
                *acc += bin.norm();
            }
            frames += 1;
        }

        if frames > 0 {
            let scale = (frames * self.samples_per_frame) as f32;
            sum.iter_mut().for_each(|x| *x /= scale);
        }
        Ok(sum)
    }

    /// Decide the symbol carried by one frame.
    pub fn demodulate_symbol(&mut self, frame: &[i16]) -> Result<usize> {
        // Baseline comes from earlier frames only.
        let floor = self.noise_floor();
        let mags = self.tone_magnitudes(frame)?;

        if mags.iter().all(|&m| m < floor) {
            return Ok(0);
        }

        if mags.len() == 2 {
            return Ok(if mags[1] > mags[0] * self.thresholds.relative { 1 } else { 0 });
        }

        let mut best = 0;
        for (i, &m) in mags.iter().enumerate() {
            if m > mags[best] {
                best = i;
            }
        }
        Ok(best)
    }

    /// Decide the bit carried by one binary-FSK frame.
    pub fn demodulate_frame(&mut self, frame: &[i16]) -> Result<bool> {
        Ok(self.demodulate_symbol(frame)? & 1 == 1)
    }

    /// Demodulate consecutive non-overlapping frames. A trailing partial
    /// frame is zero-padded and still yields a symbol.
    pub fn demodulate(&mut self, samples: &[i16]) -> Result<Vec<bool>> {
        let mut symbols = Vec::with_capacity(samples.len() / self.samples_per_frame + 1);
        for frame in samples.chunks(self.samples_per_frame) {
            symbols.push(self.demodulate_symbol(frame)?);
        }
        log::debug!(
            "Demodulated {} frames from {} samples",
            symbols.len(),
            samples.len()
        );
        Ok(symbols_to_bits(&symbols, self.bits_per_symbol))
    }
}
