//! Incremental demodulation over PCM delivered in arbitrary chunks.
//!
//! ```text
//! push(chunk) -> buffer -> complete frames -> SpectralDemodulator -> bits -> bytes
//! ```

use crate::config::{DetectionThresholds, ModemParameters};
use crate::demod::SpectralDemodulator;
use crate::error::Result;
use crate::tone::symbols_to_bits;

/// Stateful wrapper that turns a chunked PCM stream into bits and bytes.
///
/// Frame boundaries are counted from the first pushed sample, so the result
/// matches whole-buffer demodulation of the concatenated input.
pub struct StreamDemodulator {
    demod: SpectralDemodulator,
    bits_per_symbol: usize,
    pending: Vec<i16>,
    current_byte: u8,
    bit_count: u8,
    bytes: Vec<u8>,
    frames: usize,
}

impl StreamDemodulator {
    pub fn new(params: &ModemParameters, thresholds: DetectionThresholds) -> Self {
        Self {
            demod: SpectralDemodulator::new(params, thresholds),
            bits_per_symbol: params.bits_per_symbol(),
            pending: Vec::with_capacity(params.samples_per_frame),
            current_byte: 0,
            bit_count: 0,
            bytes: Vec::new(),
            frames: 0,
        }
    }

    /// Frames demodulated so far.
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Samples waiting for a frame to fill up.
    pub fn pending_samples(&self) -> usize {
        self.pending.len()
    }

    /// Feed PCM and return the bits of every frame completed by it.
    pub fn push(&mut self, chunk: &[i16]) -> Result<Vec<bool>> {
        let frame_len = self.demod.samples_per_frame();
        let mut symbols = Vec::new();
        let mut rest = chunk;

        while !rest.is_empty() {
            let take = (frame_len - self.pending.len()).min(rest.len());
            self.pending.extend_from_slice(&rest[..take]);
            rest = &rest[take..];

            if self.pending.len() == frame_len {
                symbols.push(self.demod.demodulate_symbol(&self.pending)?);
                self.pending.clear();
            }
        }

        Ok(self.accept(&symbols))
    }

    /// Demodulate any buffered partial frame (zero-padded) and return its bits.
    pub fn finish(&mut self) -> Result<Vec<bool>> {
        if self.pending.is_empty() {
            return Ok(Vec::new());
        }
        let symbol = self.demod.demodulate_symbol(&self.pending)?;
        self.pending.clear();
        Ok(self.accept(&[symbol]))
    }

    /// Drain the bytes assembled so far (MSB first).
    pub fn take_bytes(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.bytes)
    }

    /// Drop all buffered samples, bits and smoothing state.
    pub fn reset(&mut self) {
        self.demod.reset();
        self.pending.clear();
        self.current_byte = 0;
        self.bit_count = 0;
        self.bytes.clear();
        self.frames = 0;
    }

    fn accept(&mut self, symbols: &[usize]) -> Vec<bool> {
        self.frames += symbols.len();
        let bits = symbols_to_bits(symbols, self.bits_per_symbol);
        for &bit in &bits {
            self.current_byte = (self.current_byte << 1) | bit as u8;
            self.bit_count += 1;
            if self.bit_count == 8 {
                self.bytes.push(self.current_byte);
                self.current_byte = 0;
                self.bit_count = 0;
            }
        }
        bits
    }
}
