use thiserror::Error as ThisError;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors from constructing messages, streams, uris and uploaded files.
///
/// Transport and emission errors live in `client::ClientError` and `emitter::EmitError`.
#[derive(ThisError, Debug)]
pub enum Error {
    #[error("Invalid HTTP method: {0:?}")]
    InvalidMethod(String),
    #[error("Cannot determine HTTP method")]
    UndeterminedMethod,
    #[error("Invalid status code: {0}")]
    InvalidStatus(u16),
    #[error("Invalid reason phrase: {0:?}")]
    InvalidReason(String),
    #[error("Invalid uri {uri:?}: {reason}")]
    InvalidUri { uri: String, reason: String },
    #[error("Invalid file opening mode {0:?}")]
    InvalidMode(String),
    #[error("Invalid header: {0}")]
    InvalidHeader(String),
    #[error("Uploaded file is not available: {0}")]
    UploadUnavailable(&'static str),
    // open failures and other io are passed through untouched
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Coarse classification of an `Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller handed in something malformed.
    InvalidInput,
    /// The file system or another byte source failed.
    Io,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        use Error::*;
        match self {
            Io(_) => ErrorKind::Io,
            InvalidMethod(_)
            | UndeterminedMethod
            | InvalidStatus(_)
            | InvalidReason(_)
            | InvalidUri { .. }
            | InvalidMode(_)
            | InvalidHeader(_)
            | UploadUnavailable(_) => ErrorKind::InvalidInput,
        }
    }

    pub fn is_invalid_input(&self) -> bool {
        self.kind() == ErrorKind::InvalidInput
    }

    pub(crate) fn invalid_uri<S: Into<String>, R: ToString>(uri: S, reason: R) -> Self {
        Error::InvalidUri {
            uri: uri.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<http::header::InvalidHeaderName> for Error {
    fn from(err: http::header::InvalidHeaderName) -> Self {
        Error::InvalidHeader(err.to_string())
    }
}

impl From<http::header::InvalidHeaderValue> for Error {
    fn from(err: http::header::InvalidHeaderValue) -> Self {
        Error::InvalidHeader(err.to_string())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(Error::UndeterminedMethod.kind(), ErrorKind::InvalidInput);
        assert_eq!(Error::InvalidMode("z".into()).kind(), ErrorKind::InvalidInput);

        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: Error = io_err.into();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(!err.is_invalid_input());
        assert_eq!(err.to_string(), "gone");
    }
}
