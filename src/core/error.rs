use thiserror::Error as ThisError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Io,
    InvalidIndex,
    InvalidArgument,
    InvalidState,
    UnsupportedOperation,
    SearchInterrupted,
    Internal,
}

#[derive(Debug, ThisError)]
#[error("{kind:?}: {context}")]
pub struct Error {
    pub kind: ErrorKind,
    pub context: String,
}

impl Error {
    pub fn new(kind: ErrorKind, context: String) -> Self {
        Error { kind, context }
    }

    /// Corrupt or mismatched index data. Never worth retrying.
    pub fn invalid_index(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::InvalidIndex, context.into())
    }

    pub fn invalid_argument(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::InvalidArgument, context.into())
    }

    pub fn invalid_state(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::InvalidState, context.into())
    }

    /// A resource limit was hit (too many groups, too many hits, ...)
    pub fn unsupported(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::UnsupportedOperation, context.into())
    }

    pub fn interrupted() -> Self {
        Error::new(ErrorKind::SearchInterrupted, "search was interrupted".to_string())
    }

    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }

    /// Re-tag an error that happened while touching index files.
    pub fn into_invalid_index(self, file: &str) -> Self {
        match self.kind {
            ErrorKind::InvalidIndex => self,
            _ => Error::invalid_index(format!("{}: {}", file, self.context)),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error {
            kind: ErrorKind::Io,
            context: err.to_string(),
        }
    }
}

impl From<std::string::FromUtf8Error> for Error {
    fn from(err: std::string::FromUtf8Error) -> Self {
        Error {
            kind: ErrorKind::InvalidIndex,
            context: format!("invalid UTF-8 in index: {}", err),
        }
    }
}

impl From<fst::Error> for Error {
    fn from(err: fst::Error) -> Self {
        Error {
            kind: ErrorKind::InvalidIndex,
            context: format!("FST error: {}", err),
        }
    }
}

impl From<regex::Error> for Error {
    fn from(err: regex::Error) -> Self {
        Error {
            kind: ErrorKind::InvalidArgument,
            context: format!("bad pattern: {}", err),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
