use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Invalid composition: {0}")]
    InvalidComposition(String),

    #[error("Every category has reached its population")]
    Exhausted,

    #[error("Weighted draw walked past the last category")]
    NoCategoryMatched,

    #[error("Display sink closed")]
    SinkClosed,

    #[error("IO error: {0}")]
    Io(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}
