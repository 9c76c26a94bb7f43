#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("invalid archive configuration: {0}")]
    ConfigInvalid(String),

    #[error("failed to create archive directory {path}: {source}")]
    CreateDir {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}
