#[derive(Debug, thiserror::Error)]
pub enum WavError {
    #[error("invalid WAV configuration: {0}")]
    ConfigInvalid(String),

    #[error("WAV I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("data chunk would exceed the 4 GiB RIFF/WAVE size limit")]
    SizeLimitHit,
}
