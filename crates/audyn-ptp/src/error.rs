#[derive(Debug, thiserror::Error)]
pub enum PtpError {
    #[error("invalid PTP clock configuration: {0}")]
    ConfigInvalid(String),

    #[error("I/O failure reading clock: {0}")]
    Io(#[from] std::io::Error),

    #[error("RTP epoch has not been established yet")]
    EpochNotSet,

    #[error("sample rate does not match the established epoch")]
    SampleRateMismatch,

    #[error("conversion produced a negative absolute time")]
    NegativeTime,
}
