//!
//! Printer URI normalization
//!
use http::Uri;

use crate::error::IppError;

// logical scheme -> transport scheme
const SCHEME_MAP: &[(&str, &str)] = &[("ipp", "http"), ("ipps", "https"), ("http", "http"), ("https", "https")];

/// Printer URI split into the parts used by the encoder and the transport.
///
/// The encoded `printer-uri` attribute is `scheme://host/path` with the scheme mapped
/// to its transport equivalent and the port, user info and query dropped.
/// The connection port is supplied separately by the transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrinterUri {
    scheme: &'static str,
    host: String,
    path: String,
}

impl PrinterUri {
    /// Normalize a printer URI.
    ///
    /// Fails with [`IppError::MissingUri`] for a URI without host and with
    /// [`IppError::UnsupportedScheme`] for a scheme other than ipp, ipps, http or https.
    pub fn new(uri: &Uri) -> Result<PrinterUri, IppError> {
        let host = match uri.host() {
            Some(host) if !host.is_empty() => host.to_owned(),
            _ => return Err(IppError::MissingUri),
        };

        let given = uri.scheme_str().unwrap_or_default().to_ascii_lowercase();
        let scheme = SCHEME_MAP
            .iter()
            .find(|(from, _)| *from == given)
            .map(|(_, to)| *to)
            .ok_or(IppError::UnsupportedScheme(given))?;

        let path = match uri.path() {
            "" => "/".to_owned(),
            path => path.to_owned(),
        };

        Ok(PrinterUri { scheme, host, path })
    }

    /// Transport scheme, http or https
    pub fn scheme(&self) -> &str {
        self.scheme
    }

    /// Printer host name
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Resource path on the printer
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Value of the encoded `printer-uri` attribute
    pub fn to_attribute_value(&self) -> String {
        format!("{}://{}{}", self.scheme, self.host, self.path)
    }

    /// URL the HTTP request is sent to
    pub fn transport_url(&self, port: u16) -> String {
        format!("{}://{}:{}{}", self.scheme, self.host, port, self.path)
    }
}

impl TryFrom<&Uri> for PrinterUri {
    type Error = IppError;

    fn try_from(uri: &Uri) -> Result<Self, Self::Error> {
        PrinterUri::new(uri)
    }
}
