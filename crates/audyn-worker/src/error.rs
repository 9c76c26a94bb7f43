#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("archive policy error: {0}")]
    Archive(#[from] audyn_archive::ArchiveError),

    #[error("WAV writer error: {0}")]
    Wav(#[from] audyn_wav::WavError),

    #[error("Opus writer error: {0}")]
    Opus(#[from] audyn_opus::OpusError),

    #[error("unsupported archive suffix: {0} (expected \"wav\" or \"opus\")")]
    UnknownSuffix(String),
}
