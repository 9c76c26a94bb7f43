#[derive(Debug, thiserror::Error)]
pub enum OpusError {
    #[error("invalid Opus configuration: {0}")]
    ConfigInvalid(String),

    #[error("Opus I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("Opus encoder failure: {0}")]
    Encoder(#[from] audiopus::Error),

    #[error("input sample count overflowed during channel multiplication")]
    Overflow,

    #[error("FIFO overflow: more than {0} frames buffered without draining")]
    FifoOverflow(usize),

    #[error("write called after the encoder was closed")]
    Closed,
}
