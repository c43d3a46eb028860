use crate::config::{DetectionThresholds, ModemParameters};
use crate::demod::SpectralDemodulator;
use crate::error::{ModemError, Result};
use crate::fft::bin_to_frequency;
use crate::framing::{bits_of, bytes_from_bits, Framer};
use crate::history::SpectralHistory;
use crate::sync::{generate_preamble, PreambleDetector};
use crate::tone::{bits_to_symbols, ToneSynthesizer};

/// Everything derived from one `ModemParameters`. Built in full before it
/// replaces the previous session, so a failed rebuild leaves the old one intact.
struct Session {
    frequencies: Vec<f32>,
    framer: Framer,
    synth: ToneSynthesizer,
    demod: SpectralDemodulator,
    detector: PreambleDetector,
    preamble: Vec<i16>,
}

impl Session {
    fn build(params: &ModemParameters, thresholds: DetectionThresholds) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            frequencies: params.frequencies(),
            framer: Framer::new(params)?,
            synth: ToneSynthesizer::new(params),
            demod: SpectralDemodulator::new(params, thresholds),
            detector: PreambleDetector::new(params.preamble_samples, thresholds.preamble_energy)
                .with_min_energy(thresholds.preamble_min_energy),
            preamble: generate_preamble(params),
        })
    }
}

/// FSK modem: message bytes to PCM and back
///
/// ```text
/// encode:  bytes -> RS codeword -> bits -> symbols -> tones, preamble prepended
/// decode:  PCM -> per-frame FFT -> tone magnitudes -> bits
/// receive: PCM -> preamble sync -> decode one codeword -> RS correction -> bytes
/// ```
pub struct Modem {
    params: ModemParameters,
    thresholds: DetectionThresholds,
    session: Session,
}

impl Modem {
    pub fn new(params: ModemParameters) -> Result<Self> {
        Self::with_thresholds(params, DetectionThresholds::default())
    }

    pub fn with_thresholds(params: ModemParameters, thresholds: DetectionThresholds) -> Result<Self> {
        let session = Session::build(&params, thresholds)?;
        Ok(Self {
            params,
            thresholds,
            session,
        })
    }

    pub fn parameters(&self) -> &ModemParameters {
        &self.params
    }

    /// Replace the configuration and every table derived from it.
    pub fn set_parameters(&mut self, params: ModemParameters) -> Result<()> {
        let session = Session::build(&params, self.thresholds)?;
        log::debug!(
            "Reconfigured modem: {} tones from {} Hz, {} samples/frame, RS({}, {})",
            params.num_freqs,
            params.f0,
            params.samples_per_frame,
            params.codeword_length(),
            params.rs_msg_length
        );
        self.params = params;
        self.session = session;
        Ok(())
    }

    pub fn thresholds(&self) -> &DetectionThresholds {
        &self.thresholds
    }

    pub fn set_thresholds(&mut self, thresholds: DetectionThresholds) {
        self.thresholds = thresholds;
        self.session.demod.set_thresholds(thresholds);
        self.session.detector.set_threshold(thresholds.preamble_energy);
        self.session.detector.set_min_energy(thresholds.preamble_min_energy);
    }

    pub fn frequencies(&self) -> &[f32] {
        &self.session.frequencies
    }

    /// Samples produced by `encode` for any message.
    pub fn encoded_len(&self) -> usize {
        (self.params.preamble_frames() + self.params.symbols_per_codeword())
            * self.params.samples_per_frame
    }

    /// Modulate `message` (at most `rs_msg_length` bytes) into 16-bit PCM:
    /// the preamble padded with silence to whole frames, then one frame per
    /// codeword symbol.
    pub fn encode(&self, message: &[u8]) -> Result<Vec<i16>> {
        let codeword = self.session.framer.encode_message(message)?;
        let symbols = bits_to_symbols(&bits_of(&codeword), self.params.bits_per_symbol());
        let data = self.session.synth.synthesize(&symbols)?;

        let preamble_len = self.params.preamble_frames() * self.params.samples_per_frame;
        let mut samples = Vec::with_capacity(preamble_len + data.len());
        samples.extend_from_slice(&self.session.preamble);
        samples.resize(preamble_len, 0);
        samples.extend_from_slice(&data);

        log::debug!(
            "Encoded {} bytes into {} samples ({} symbols)",
            message.len(),
            samples.len(),
            symbols.len()
        );
        Ok(samples)
    }

    /// Demodulate every frame of `samples` from the first sample on. No
    /// synchronisation or error correction is applied.
    pub fn decode(&mut self, samples: &[i16]) -> Result<Vec<bool>> {
        self.session.demod.reset();
        self.session.demod.demodulate(samples)
    }

    /// Locate the preamble, demodulate one codeword after it and correct it.
    /// Returns the full `rs_msg_length` data block, zero padding included.
    pub fn receive(&mut self, samples: &[i16]) -> Result<Vec<u8>> {
        let start = match self.session.detector.align(samples) {
            Some(start) => start,
            None => {
                log::warn!("No preamble in {} samples", samples.len());
                return Err(ModemError::PreambleNotFound);
            }
        };

        let frame = self.params.samples_per_frame;
        let data_start = start + self.params.preamble_frames() * frame;
        let data_len = self.params.symbols_per_codeword() * frame;

        // Alignment may land a few samples late; a final frame that is only
        // partly captured is zero-padded like any trailing frame.
        let available = samples.len().saturating_sub(data_start).min(data_len);
        if available + frame <= data_len {
            return Err(ModemError::InsufficientData {
                needed: data_start + data_len,
                got: samples.len(),
            });
        }
        if available < data_len {
            log::debug!(
                "Last data frame short by {} samples, zero-padding",
                data_len - available
            );
        }

        self.session.demod.reset();
        let mut bits = self
            .session
            .demod
            .demodulate(&samples[data_start..data_start + available])?;
        bits.resize(8 * self.params.codeword_length(), false);

        let codeword = bytes_from_bits(&bits);
        self.session.framer.decode_message(&codeword)
    }

    /// `receive`, with trailing zero padding removed.
    pub fn receive_text(&mut self, samples: &[i16]) -> Result<Vec<u8>> {
        let mut data = self.receive(samples)?;
        while data.last() == Some(&0) {
            data.pop();
        }
        Ok(data)
    }

    /// Frequency of the strongest non-DC bin, averaged over all frames.
    pub fn dominant_frequency(&mut self, samples: &[i16]) -> Result<f32> {
        let average = self.session.demod.average_magnitudes(samples)?;
        let normalized = SpectralHistory::normalize(&average)?;

        let peak = normalized
            .iter()
            .enumerate()
            .skip(1)
            .fold((0usize, 0.0f32), |best, (i, &m)| if m > best.1 { (i, m) } else { best });

        Ok(bin_to_frequency(
            peak.0,
            self.params.analysis_size(),
            self.params.sample_rate,
        ))
    }

    /// Whether the dominant frequency lies within the tone table (± df/2).
    pub fn is_in_band(&mut self, samples: &[i16]) -> Result<bool> {
        let freq = self.dominant_frequency(samples)?;
        let half = self.params.df / 2.0;
        Ok(freq >= self.params.f0 - half && freq <= self.params.highest_frequency() + half)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_length() {
        let modem = Modem::new(ModemParameters::default()).unwrap();
        let samples = modem.encode(b"Hi").unwrap();
        assert_eq!(samples.len(), 2048 + 8 * 40 * 512);
        assert_eq!(samples.len(), modem.encoded_len());
    }

    #[test]
    fn test_preamble_padded_to_frames() {
        let params = ModemParameters {
            samples_per_frame: 480,
            ..Default::default()
        };
        let modem = Modem::new(params).unwrap();
        let samples = modem.encode(b"pad").unwrap();
        assert_eq!(samples.len(), (5 + 320) * 480);
        assert!(samples[2048..2400].iter().all(|&s| s == 0));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let params = ModemParameters {
            f0: 30000.0,
            ..Default::default()
        };
        assert!(matches!(
            Modem::new(params),
            Err(ModemError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_failed_reconfiguration_keeps_session() {
        let mut modem = Modem::new(ModemParameters::default()).unwrap();
        let before = modem.encode(b"keep").unwrap();

        let bad = ModemParameters {
            num_freqs: 3,
            ..Default::default()
        };
        assert!(modem.set_parameters(bad).is_err());
        assert_eq!(modem.parameters(), &ModemParameters::default());
        assert_eq!(modem.encode(b"keep").unwrap(), before);
    }

    #[test]
    fn test_message_too_long() {
        let modem = Modem::new(ModemParameters::default()).unwrap();
        assert!(matches!(
            modem.encode(&[b'x'; 33]),
            Err(ModemError::MessageTooLong { .. })
        ));
    }

    #[test]
    fn test_receive_without_preamble() {
        let mut modem = Modem::new(ModemParameters::default()).unwrap();
        assert!(matches!(
            modem.receive(&vec![0i16; 50_000]),
            Err(ModemError::PreambleNotFound)
        ));
    }

    #[test]
    fn test_receive_truncated_signal() {
        let mut modem = Modem::new(ModemParameters::default()).unwrap();
        let samples = modem.encode(b"cut").unwrap();
        assert!(matches!(
            modem.receive(&samples[..samples.len() / 2]),
            Err(ModemError::InsufficientData { .. })
        ));
    }

    #[test]
    fn test_receive_short_last_frame() {
        let mut modem = Modem::new(ModemParameters::default()).unwrap();
        let samples = modem.encode(b"tail").unwrap();

        // Capture ends inside the last frame, as when sync lands a few samples late
        for cut in [1usize, 5, 100, 511] {
            let decoded = modem.receive_text(&samples[..samples.len() - cut]).unwrap();
            assert_eq!(decoded, b"tail", "Failed with {} samples cut", cut);
        }

        // A whole missing frame is still an error
        assert!(matches!(
            modem.receive(&samples[..samples.len() - 512]),
            Err(ModemError::InsufficientData { .. })
        ));
    }

    #[test]
    fn test_dominant_frequency_in_band() {
        let mut modem = Modem::new(ModemParameters::default()).unwrap();
        let samples = modem.encode(b"Test Message").unwrap();
        let freq = modem.dominant_frequency(&samples).unwrap();
        assert!((14900.0..=16100.0).contains(&freq), "dominant {}", freq);
        assert!(modem.is_in_band(&samples).unwrap());
    }

    #[test]
    fn test_dominant_frequency_of_silence() {
        let mut modem = Modem::new(ModemParameters::default()).unwrap();
        assert!(matches!(
            modem.dominant_frequency(&[0i16; 1024]),
            Err(ModemError::DegenerateSpectrum)
        ));
    }
}
