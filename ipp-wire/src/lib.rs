//!
//! IPP client codec and transport for Rust.
//!
//! An [`IppOperation`](operation::IppOperation) is bound to one operation code. Each call
//! normalizes the printer URI, encodes a request frame from a handful of named parameters,
//! posts the frame (optionally followed by a document stream) over HTTP and decodes the response.
//!
//! The following feature flags are supported:
//! * `tls` - enable TLS support via `rustls` (enabled by default)
//! * `native-tls` - enable TLS support via the platform TLS library
//! * `serde` - derive serde traits for the decoded model
//!
//! Implementation notes:
//! * `ipp://` and `ipps://` URIs are sent over `http://` and `https://` respectively.
//! * the port in the printer URI is ignored, the transport port defaults to 631.
//! * calls are independent: one operation instance can be shared between threads.
//!
//! Usage example:
//!
//!```rust,no_run
//! use ipp_wire::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let uri: Uri = "ipp://localhost:631/printers/test-printer".parse()?;
//!     let params = IppParams::new()
//!         .user_name("nobody")
//!         .requested_attributes(["printer-state", "printer-info"]);
//!
//!     let result = IppOperation::get_printer_attributes().execute(&uri, Some(&params), None)?;
//!     if result.status_code().map_or(false, |s| s.is_success()) {
//!         for group in result.attributes().groups_of(DelimiterTag::PrinterAttributes) {
//!             for attr in group.attributes().values() {
//!                 println!("{}: {}", attr.name(), attr.value());
//!             }
//!         }
//!     }
//!     Ok(())
//! }
//!```

use num_traits::FromPrimitive;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::model::{IppVersion, StatusCode};

pub mod attribute;
pub mod encoder;
pub mod error;
pub mod model;
pub mod operation;
pub mod parser;
pub mod reader;
pub mod request;
pub mod transport;
pub mod uri;
pub mod value;

pub mod prelude {
    //!
    //! Common imports
    //!
    pub use http::Uri;
    pub use num_traits::FromPrimitive as _;

    pub use crate::{
        attribute::{IppAttribute, IppAttributeGroup, IppAttributes},
        encoder::{Frame, FrameWriter},
        error::{ErrorKind, IppError, OperationError},
        model::*,
        operation::{IppOperation, IppResult},
        request::{IppParams, RequestBuilder},
        transport::{HttpStatus, HttpTransport, HttpTransportBuilder, Transport},
        uri::PrinterUri,
        value::IppValue,
    };

    pub use super::IppHeader;
}

/// IPP request and response header
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IppHeader {
    /// IPP protocol version
    pub version: IppVersion,
    /// Operation tag for requests, status for responses
    pub operation_or_status: u16,
    /// ID of the request
    pub request_id: u32,
}

impl IppHeader {
    /// Create IPP header
    pub fn new(version: IppVersion, operation_or_status: u16, request_id: u32) -> IppHeader {
        IppHeader {
            version,
            operation_or_status,
            request_id,
        }
    }

    /// Decode and get IPP status code from the header
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.operation_or_status).unwrap_or(StatusCode::UnknownStatusCode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_status_code() {
        let header = IppHeader::new(IppVersion::v1_1(), 0x0406, 7);
        assert_eq!(header.status_code(), StatusCode::ClientErrorNotFound);

        let header = IppHeader::new(IppVersion::v1_1(), 0x7777, 7);
        assert_eq!(header.status_code(), StatusCode::UnknownStatusCode);
    }
}
