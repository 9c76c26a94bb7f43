#[derive(Debug, thiserror::Error)]
pub enum ReceiverError {
    #[error("invalid RTP receiver configuration: {0}")]
    ConfigInvalid(String),

    #[error("socket setup failed: {0}")]
    Io(#[from] std::io::Error),
}
