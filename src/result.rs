use std::fmt::Display;

use miette::miette;

#[derive(Debug)]
pub enum Error {
    /// A source did not signal enough data before its deadline.
    /// Never fatal: the caller proceeds as if the data had arrived.
    LoadTimeout,

    /// The media resource could not fetch or decode its source.
    /// Terminal for the clip instance that hit it.
    DecodeOrNetworkFailure(String),

    /// An index outside of the catalog bounds.
    InvalidIndex { index: usize, len: usize },

    Miette(miette::Report),
}

impl From<miette::Report> for Error {
    fn from(err: miette::Report) -> Self {
        Error::Miette(err)
    }
}

impl From<Error> for miette::Report {
    fn from(err: Error) -> Self {
        match err {
            Error::Miette(err) => err,
            err => miette!("{err}"),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::LoadTimeout => write!(f, "Load timed out"),
            Error::DecodeOrNetworkFailure(reason) => write!(f, "Content unavailable: {reason}"),
            Error::InvalidIndex { index, len } => {
                write!(f, "Index {index} is out of the catalog bounds (len {len})")
            }
            Error::Miette(report) => write!(f, "{report}"),
        }
    }
}

impl Error {
    pub fn wrap_err_with<D, F>(self, f: F) -> Error
    where
        D: Display + Send + Sync + 'static,
        F: FnOnce() -> D,
    {
        match self {
            Error::Miette(report) => Error::Miette(report.wrap_err(f())),
            err => err,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

pub fn err_msg(msg: &'static str) -> Error {
    Error::Miette(miette!(msg))
}

pub fn bail<T>(msg: &'static str) -> Result<T> {
    Err(err_msg(msg))
}
