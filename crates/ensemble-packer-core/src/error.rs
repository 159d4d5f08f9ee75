use thiserror::Error;

#[derive(Debug, Error)]
pub enum PackError {
    #[error("Invalid dimensions: {width}x{height} (both sides must be > 0)")]
    InvalidDimension { width: u32, height: u32 },
    #[error("Unsupported configuration: {0}")]
    UnsupportedConfiguration(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Candidate index {index} out of range ({len} candidates)")]
    CandidateIndexOutOfRange { index: usize, len: usize },
}

pub type Result<T> = std::result::Result<T, PackError>;

/// Fails fast on a zero-sized item before any search begins.
pub(crate) fn check_item(width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(PackError::InvalidDimension { width, height });
    }
    Ok(())
}
