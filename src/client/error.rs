use std::error::Error as StdError;
use std::fmt;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failure of a client exchange. Opaque to the factory, which passes it through.
#[derive(Debug)]
pub struct ClientError {
    kind: Kind,
    source: Option<BoxError>,
}

impl ClientError {
    pub(crate) fn new<E: Into<BoxError>>(kind: Kind, err: Option<E>) -> Self {
        Self {
            kind,
            source: err.map(Into::into),
        }
    }

    /// The request could not be turned into bytes.
    pub fn is_encode(&self) -> bool {
        matches!(self.kind, Kind::Encode(_))
    }

    /// The response could not be parsed.
    pub fn is_decode(&self) -> bool {
        matches!(self.kind, Kind::Decode(_))
    }

    /// No connection to the remote host.
    pub fn is_connect(&self) -> bool {
        matches!(self.kind, Kind::Connect)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.kind, Kind::Timeout)
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Kind::*;
        let prefix = match &self.kind {
            Encode(Some(msg)) => format!("Encode error: {}", msg),
            Encode(None) => "Encode error".to_owned(),
            Decode(Some(msg)) => format!("Decode error: {}", msg),
            Decode(None) => "Decode error".to_owned(),
            Connect => "Connect error".to_owned(),
            Io => "Io error".to_owned(),
            Timeout => return write!(f, "Request timed out"),
        };
        match self.source {
            Some(ref err) => write!(f, "{}: {}", prefix, err),
            None => write!(f, "{}", prefix),
        }
    }
}

#[derive(Debug)]
pub(crate) enum Kind {
    Encode(Option<String>),
    Decode(Option<String>),
    Connect,
    Io,
    Timeout,
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source.as_ref().map(|e| &**e as _)
    }
}

pub(crate) fn encode<S: Into<Option<String>>>(msg: S) -> ClientError {
    ClientError::new(Kind::Encode(msg.into()), None::<ClientError>)
}

pub(crate) fn encode_io<E: Into<BoxError>>(err: E) -> ClientError {
    ClientError::new(Kind::Encode(None), Some(err))
}

pub(crate) fn decode<S: Into<Option<String>>>(msg: S) -> ClientError {
    ClientError::new(Kind::Decode(msg.into()), None::<ClientError>)
}

pub(crate) fn decode_err<E: Into<BoxError>>(err: E) -> ClientError {
    ClientError::new(Kind::Decode(None), Some(err))
}

pub(crate) fn connect<E: Into<BoxError>>(err: E) -> ClientError {
    ClientError::new(Kind::Connect, Some(err))
}

pub(crate) fn io<E: Into<BoxError>>(err: E) -> ClientError {
    ClientError::new(Kind::Io, Some(err))
}

pub(crate) fn timeout() -> ClientError {
    ClientError::new(Kind::Timeout, None::<ClientError>)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(encode("Missing hostname".to_owned()).to_string(), "Encode error: Missing hostname");
        assert_eq!(timeout().to_string(), "Request timed out");

        let err = io(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe"));
        assert_eq!(err.to_string(), "Io error: pipe");
        assert!(err.source().is_some());
        assert!(!err.is_timeout());
    }
}
