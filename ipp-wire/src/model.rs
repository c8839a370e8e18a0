//!
//! Base IPP definitions and tags
//!
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use enum_primitive_derive::Primitive;

/// IPP protocol version
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct IppVersion(pub u16);

impl IppVersion {
    pub const fn v1_1() -> Self {
        IppVersion(0x0101)
    }
    pub const fn v2_0() -> Self {
        IppVersion(0x0200)
    }
}

impl Default for IppVersion {
    fn default() -> Self {
        IppVersion::v1_1()
    }
}

impl fmt::Display for IppVersion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}", self.0 >> 8, self.0 & 0xff)
    }
}

/// Well-known IPP operation codes.
///
/// Any operation code can be sent, this enum only names the common ones.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Primitive, Debug, Copy, Clone, Eq, PartialEq)]
#[allow(clippy::upper_case_acronyms)]
pub enum Operation {
    PrintJob = 0x0002,
    ValidateJob = 0x0004,
    GetJobs = 0x000A,
    GetPrinterAttributes = 0x000B,

    CupsGetDefault = 0x4001,
    CupsGetPrinters = 0x4002,
    CupsGetPPD = 0x400F,
}

impl From<Operation> for u16 {
    fn from(operation: Operation) -> u16 {
        operation as u16
    }
}

/// printer-state constants
#[derive(Primitive, Debug, Copy, Clone, Eq, PartialEq)]
pub enum PrinterState {
    Idle = 3,
    Processing = 4,
    Stopped = 5,
}

/// group delimiter tags
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Primitive, Debug, Copy, Clone, PartialEq, Hash, Eq)]
pub enum DelimiterTag {
    OperationAttributes = 0x01,
    JobAttributes = 0x02,
    EndOfAttributes = 0x03,
    PrinterAttributes = 0x04,
    UnsupportedAttributes = 0x05,
}

/// IPP value tags
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Primitive, Debug, Copy, Clone, Eq, PartialEq)]
pub enum ValueTag {
    Unsupported = 0x10,
    Unknown = 0x12,
    NoValue = 0x13,
    Integer = 0x21,
    Boolean = 0x22,
    Enum = 0x23,
    OctetStringUnspecified = 0x30,
    DateTime = 0x31,
    Resolution = 0x32,
    RangeOfInteger = 0x33,
    BegCollection = 0x34,
    TextWithLanguage = 0x35,
    NameWithLanguage = 0x36,
    EndCollection = 0x37,
    TextWithoutLanguage = 0x41,
    NameWithoutLanguage = 0x42,
    Keyword = 0x44,
    Uri = 0x45,
    UriScheme = 0x46,
    Charset = 0x47,
    NaturalLanguage = 0x48,
    MimeMediaType = 0x49,
    MemberAttrName = 0x4a,
}

/// IPP status codes
#[derive(Primitive, Debug, Copy, Clone, Eq, PartialEq)]
pub enum StatusCode {
    SuccessfulOk = 0x0000,
    SuccessfulOkIgnoredOrSubstitutedAttributes = 0x0001,
    SuccessfulOkConflictingAttributes = 0x0002,
    ClientErrorBadRequest = 0x0400,
    ClientErrorForbidden = 0x0401,
    ClientErrorNotAuthenticated = 0x0402,
    ClientErrorNotAuthorized = 0x0403,
    ClientErrorNotPossible = 0x0404,
    ClientErrorTimeout = 0x0405,
    ClientErrorNotFound = 0x0406,
    ClientErrorGone = 0x0407,
    ClientErrorRequestEntityTooLong = 0x0408,
    ClientErrorRequestValueTooLong = 0x0409,
    ClientErrorDocumentFormatNotSupported = 0x040A,
    ClientErrorAttributesOrValuesNotSupported = 0x040B,
    ClientErrorUriSchemeNotSupported = 0x040C,
    ClientErrorCharsetNotSupported = 0x040D,
    ClientErrorConflictingAttributes = 0x040E,
    ClientErrorCompressionNotSupported = 0x040F,
    ClientErrorCompressionError = 0x0410,
    ClientErrorDocumentFormatError = 0x0411,
    ClientErrorDocumentAccessError = 0x0412,
    ServerErrorInternalError = 0x0500,
    ServerErrorOperationNotSupported = 0x0501,
    ServerErrorServiceUnavailable = 0x0502,
    ServerErrorVersionNotSupported = 0x0503,
    ServerErrorDeviceError = 0x0504,
    ServerErrorTemporaryError = 0x0505,
    ServerErrorNotAcceptingJobs = 0x0506,
    ServerErrorBusy = 0x0507,
    ServerErrorJobCanceled = 0x0508,
    ServerErrorMultipleDocumentJobsNotSupported = 0x0509,
    UnknownStatusCode = 0xffff,
}

impl StatusCode {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            StatusCode::SuccessfulOk
                | StatusCode::SuccessfulOkIgnoredOrSubstitutedAttributes
                | StatusCode::SuccessfulOkConflictingAttributes
        )
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let text = match self {
            StatusCode::SuccessfulOk => "No error",
            StatusCode::SuccessfulOkIgnoredOrSubstitutedAttributes => "Ignored or substituted attributes",
            StatusCode::SuccessfulOkConflictingAttributes => "Conflicting attributes",
            StatusCode::ClientErrorBadRequest => "Bad request",
            StatusCode::ClientErrorForbidden => "Forbidden",
            StatusCode::ClientErrorNotAuthenticated => "Not authenticated",
            StatusCode::ClientErrorNotAuthorized => "Not authorized",
            StatusCode::ClientErrorNotPossible => "Not possible",
            StatusCode::ClientErrorTimeout => "Timeout",
            StatusCode::ClientErrorNotFound => "Not found",
            StatusCode::ClientErrorGone => "Gone",
            StatusCode::ClientErrorRequestEntityTooLong => "Entity too long",
            StatusCode::ClientErrorRequestValueTooLong => "Request value too long",
            StatusCode::ClientErrorDocumentFormatNotSupported => "Document format not supported",
            StatusCode::ClientErrorAttributesOrValuesNotSupported => "Attributes or values not supported",
            StatusCode::ClientErrorUriSchemeNotSupported => "Uri scheme not supported",
            StatusCode::ClientErrorCharsetNotSupported => "Charset not supported",
            StatusCode::ClientErrorConflictingAttributes => "Conflicting attributes",
            StatusCode::ClientErrorCompressionNotSupported => "Compression not supported",
            StatusCode::ClientErrorCompressionError => "Compression error",
            StatusCode::ClientErrorDocumentFormatError => "Document format error",
            StatusCode::ClientErrorDocumentAccessError => "Document access error",
            StatusCode::ServerErrorInternalError => "Internal error",
            StatusCode::ServerErrorOperationNotSupported => "Operation not supported",
            StatusCode::ServerErrorServiceUnavailable => "Service unavailable",
            StatusCode::ServerErrorVersionNotSupported => "Version not supported",
            StatusCode::ServerErrorDeviceError => "Device error",
            StatusCode::ServerErrorTemporaryError => "Temporary error",
            StatusCode::ServerErrorNotAcceptingJobs => "Not accepting jobs",
            StatusCode::ServerErrorBusy => "Busy",
            StatusCode::ServerErrorJobCanceled => "Job canceled",
            StatusCode::ServerErrorMultipleDocumentJobsNotSupported => "Multiple document jobs not supported",
            StatusCode::UnknownStatusCode => "Unknown status code",
        };
        f.write_str(text)
    }
}
