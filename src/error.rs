use derive_more::{Display, Error};
use std::path::PathBuf;

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("could not load configuration")]
    Config,
    #[display("could not read '{}'", _0.display())]
    Read(#[error(not(source))] PathBuf),
    #[display("invalid metadata: {_0}")]
    Metadata(#[error(not(source))] String),
    #[display("no metadata available for this document")]
    Analysis,
    #[display("metadata cache error")]
    Cache,
    #[display("could not write output")]
    Output,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Read(_) | ErrorKind::Cache)
    }
}
