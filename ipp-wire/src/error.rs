//!
//! IPP error
//!
use std::{fmt, io, num::ParseIntError};

use bytes::Bytes;

use crate::{encoder::EncodeError, parser::IppParseError, transport::HttpStatus};

/// Broad failure category, used to tell input mistakes from network and protocol faults
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ErrorKind {
    /// Invalid caller input, detected before any network activity
    Input,
    /// Request frame could not be encoded
    Encoding,
    /// Connection, timeout, I/O or HTTP-level failure
    Transport,
    /// Response bytes could not be decoded
    Decoding,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let text = match self {
            ErrorKind::Input => "input",
            ErrorKind::Encoding => "encoding",
            ErrorKind::Transport => "transport",
            ErrorKind::Decoding => "decoding",
        };
        f.write_str(text)
    }
}

/// IPP error
#[allow(clippy::large_enum_variant)]
#[derive(Debug, thiserror::Error)]
pub enum IppError {
    #[error("Missing printer URI host")]
    /// Printer URI has no host
    MissingUri,

    #[error("Unsupported printer URI scheme: '{0}'")]
    /// Printer URI scheme cannot be mapped to HTTP
    UnsupportedScheme(String),

    #[error("Invalid limit value '{value}': {source}")]
    /// Non-numeric `limit` parameter
    InvalidLimit {
        value: String,
        #[source]
        source: ParseIntError,
    },

    #[error(transparent)]
    /// Frame encoding error
    EncodeError(#[from] EncodeError),

    #[error(transparent)]
    /// Client error
    ClientError(#[from] ureq::Error),

    #[error(transparent)]
    /// Network I/O error
    IoError(#[from] io::Error),

    #[error("HTTP request error: {status}")]
    /// Non-success HTTP status, the response body is kept for diagnostics
    RequestError { status: HttpStatus, body: Bytes },

    #[error("Response parse error: {source}")]
    /// Response could not be decoded, the offending bytes are kept for diagnostics
    ParseError {
        #[source]
        source: IppParseError,
        response: Bytes,
    },
}

impl IppError {
    /// Failure category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            IppError::MissingUri
            | IppError::UnsupportedScheme(_)
            | IppError::InvalidLimit { .. } => ErrorKind::Input,
            IppError::EncodeError(_) => ErrorKind::Encoding,
            IppError::ClientError(_) | IppError::IoError(_) | IppError::RequestError { .. } => ErrorKind::Transport,
            IppError::ParseError { .. } => ErrorKind::Decoding,
        }
    }

    /// Only transport failures may succeed when the same call is repeated
    pub fn is_retriable(&self) -> bool {
        self.kind() == ErrorKind::Transport
    }

    /// Raw response bytes attached to the error, if any
    pub fn response_bytes(&self) -> Option<&Bytes> {
        match self {
            IppError::ParseError { response, .. } => Some(response),
            IppError::RequestError { body, .. } => Some(body),
            _ => None,
        }
    }
}

/// Failure of a single IPP operation call, wrapping the cause
#[derive(Debug, thiserror::Error)]
#[error("IPP operation {operation:#06x} failed: {source}")]
pub struct OperationError {
    operation: u16,
    #[source]
    source: IppError,
}

impl OperationError {
    pub(crate) fn new(operation: u16, source: IppError) -> Self {
        OperationError { operation, source }
    }

    /// Operation code of the failed call
    pub fn operation(&self) -> u16 {
        self.operation
    }

    /// Failure category of the cause
    pub fn kind(&self) -> ErrorKind {
        self.source.kind()
    }

    /// Return the cause
    pub fn inner(&self) -> &IppError {
        &self.source
    }

    /// Consume and return the cause
    pub fn into_inner(self) -> IppError {
        self.source
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(IppError::MissingUri.kind(), ErrorKind::Input);
        let limit = "ten".parse::<i32>().unwrap_err();
        let err = IppError::InvalidLimit {
            value: "ten".to_owned(),
            source: limit,
        };
        assert_eq!(err.kind(), ErrorKind::Input);
        assert!(!err.is_retriable());
        assert!(IppError::from(io::Error::from(io::ErrorKind::TimedOut)).is_retriable());
    }

    #[test]
    fn test_operation_error_preserves_cause() {
        let err = OperationError::new(
            0x000b,
            IppError::ParseError {
                source: IppParseError::UnexpectedEof(3),
                response: Bytes::from_static(b"\x01\x01\x00"),
            },
        );
        assert_eq!(err.kind(), ErrorKind::Decoding);
        assert_eq!(err.to_string(), "IPP operation 0x000b failed: Response parse error: Unexpected end of data at offset 3");
        assert_eq!(err.inner().response_bytes().map(|b| b.len()), Some(3));

        let cause = err.source().and_then(|e| e.source()).map(|e| e.to_string());
        assert_eq!(cause.as_deref(), Some("Unexpected end of data at offset 3"));
    }
}
