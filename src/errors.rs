use std::io::ErrorKind;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DemuxError>;

#[derive(Error, Debug)]
pub enum DemuxError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Release error: {0} {1}")]
    Release(String, String),
}

impl From<DemuxError> for std::io::Error {
    fn from(err: DemuxError) -> Self {
        match err {
            DemuxError::Io(err) => err,
            other => std::io::Error::new(ErrorKind::Other, other),
        }
    }
}
