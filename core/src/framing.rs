use reed_solomon::{Decoder, Encoder};

use crate::config::ModemParameters;
use crate::error::{ModemError, Result};

/// Reed-Solomon codec sized for one codeword
///
/// Messages are zero-padded to `msg_len` bytes and extended with `ecc_len`
/// parity bytes. Up to `ecc_len / 2` byte errors per codeword are corrected.
pub struct Framer {
    encoder: Encoder,
    decoder: Decoder,
    msg_len: usize,
    ecc_len: usize,
}

impl Framer {
    pub fn new(params: &ModemParameters) -> Result<Self> {
        let msg_len = params.rs_msg_length;
        let ecc_len = params.rs_ecc_length;
        if ecc_len == 0 || msg_len + ecc_len == 0 || msg_len + ecc_len > crate::MAX_CODEWORD_LENGTH {
            return Err(ModemError::InvalidConfig(format!(
                "unsupported Reed-Solomon geometry ({} data + {} parity)",
                msg_len, ecc_len
            )));
        }

        Ok(Self {
            encoder: Encoder::new(ecc_len),
            decoder: Decoder::new(ecc_len),
            msg_len,
            ecc_len,
        })
    }

    pub fn message_length(&self) -> usize {
        self.msg_len
    }

    pub fn codeword_length(&self) -> usize {
        self.msg_len + self.ecc_len
    }

    /// Encode a message into a full codeword (data bytes first, then parity).
    pub fn encode_message(&self, message: &[u8]) -> Result<Vec<u8>> {
        if message.len() > self.msg_len {
            return Err(ModemError::MessageTooLong {
                len: message.len(),
                max: self.msg_len,
            });
        }

        let mut padded = message.to_vec();
        padded.resize(self.msg_len, 0);

        let codeword = self.encoder.encode(&padded);
        Ok(codeword.to_vec())
    }

    /// Correct and strip a codeword, returning the `msg_len` data bytes.
    pub fn decode_message(&self, codeword: &[u8]) -> Result<Vec<u8>> {
        if codeword.len() != self.codeword_length() {
            log::warn!(
                "Codeword length {} does not match configured {}",
                codeword.len(),
                self.codeword_length()
            );
            return Err(ModemError::CorrectionFailed);
        }

        let mut buffer = codeword.to_vec();
        let (recovered, corrected) = self
            .decoder
            .correct_err_count(&mut buffer, None)
            .map_err(|e| {
                log::warn!("Reed-Solomon decode failed: {:?}", e);
                ModemError::CorrectionFailed
            })?;

        if corrected > 0 {
            log::debug!("Reed-Solomon corrected {} byte errors", corrected);
        }
        Ok(recovered.data().to_vec())
    }
}

/// Expand bytes to bits, MSB first.
pub fn bits_of(bytes: &[u8]) -> Vec<bool> {
    bytes
        .iter()
        .flat_map(|&byte| (0..8).rev().map(move |i| (byte >> i) & 1 == 1))
        .collect()
}

/// Pack MSB-first bits into bytes. A trailing partial byte is dropped.
pub fn bytes_from_bits(bits: &[bool]) -> Vec<u8> {
    bits.chunks_exact(8)
        .map(|chunk| chunk.iter().fold(0u8, |acc, &bit| (acc << 1) | bit as u8))
        .collect()
}
