use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModemError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Input of {len} samples exceeds transform capacity of {capacity}")]
    InputTooLarge { len: usize, capacity: usize },

    #[error("Message of {len} bytes exceeds capacity of {max} bytes")]
    MessageTooLong { len: usize, max: usize },

    #[error("Failed to detect preamble")]
    PreambleNotFound,

    #[error("Insufficient data: need {needed} samples, got {got}")]
    InsufficientData { needed: usize, got: usize },

    #[error("Reed-Solomon correction failed")]
    CorrectionFailed,

    #[error("Spectral history is empty")]
    EmptyHistory,

    #[error("Spectrum has zero peak magnitude")]
    DegenerateSpectrum,

    #[error("FFT error: {0}")]
    FftError(String),
}

pub type Result<T> = std::result::Result<T, ModemError>;
