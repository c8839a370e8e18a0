//!
//! HTTP transport for IPP frames
//!
use std::{
    collections::BTreeMap,
    fmt,
    io::{self, Read},
    time::Duration,
};

use base64::Engine;
use bytes::Bytes;
use log::debug;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use ureq::{unversioned::resolver::DefaultResolver, Agent, SendBody};

use crate::{encoder::Frame, error::IppError, uri::PrinterUri};

use self::status::{StatusLineConnector, StatusSlot};

mod status;

/// Standard IPP port
pub const IPP_PORT: u16 = 631;

/// IPP media type of the request and response bodies
pub const IPP_MIME_TYPE: &str = "application/ipp";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(10);

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"), ";ureq");

/// HTTP status of a response: numeric code and reason phrase
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpStatus {
    code: u16,
    reason: String,
}

impl HttpStatus {
    /// Create status from code and reason phrase
    pub fn new<S>(code: u16, reason: S) -> Self
    where
        S: AsRef<str>,
    {
        HttpStatus {
            code,
            reason: reason.as_ref().to_owned(),
        }
    }

    /// Numeric status code
    pub fn code(&self) -> u16 {
        self.code
    }

    /// Reason phrase, e.g. `OK`
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Check for a 2xx status
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.code)
    }
}

impl From<http::StatusCode> for HttpStatus {
    fn from(status: http::StatusCode) -> Self {
        HttpStatus::new(status.as_u16(), status.canonical_reason().unwrap_or_default())
    }
}

impl fmt::Display for HttpStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.reason.is_empty() {
            write!(f, "{}", self.code)
        } else {
            write!(f, "{} {}", self.code, self.reason)
        }
    }
}

/// Raw outcome of one HTTP exchange
#[derive(Clone, Debug)]
pub struct TransportResponse {
    /// HTTP status line
    pub status: HttpStatus,
    /// Complete response body, empty if the server sent none
    pub body: Bytes,
}

/// Carrier of a single IPP request.
///
/// Implementations send the frame followed by the optional document and return the raw response.
/// The document is read once, front to back.
pub trait Transport {
    /// Send the frame and document to the printer
    fn send(
        &self,
        target: &PrinterUri,
        frame: &Frame,
        document: Option<&mut dyn Read>,
    ) -> Result<TransportResponse, IppError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send(
        &self,
        target: &PrinterUri,
        frame: &Frame,
        document: Option<&mut dyn Read>,
    ) -> Result<TransportResponse, IppError> {
        (**self).send(target, frame, document)
    }
}

/// HTTP request body: the frame bytes, then the document bytes.
///
/// The document is pulled lazily as the body is read, it is never buffered as a whole.
pub struct RequestBody<'a> {
    frame: io::Cursor<Bytes>,
    document: Option<&'a mut dyn Read>,
}

impl<'a> RequestBody<'a> {
    /// Create body from the frame and optional document
    pub fn new(frame: &Frame, document: Option<&'a mut dyn Read>) -> Self {
        RequestBody {
            frame: frame.to_reader(),
            document,
        }
    }

    /// Check if a document follows the frame
    pub fn has_document(&self) -> bool {
        self.document.is_some()
    }
}

impl Read for RequestBody<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let read = self.frame.read(buf)?;
        if read > 0 || buf.is_empty() {
            return Ok(read);
        }
        match self.document {
            Some(ref mut document) => document.read(buf),
            None => Ok(0),
        }
    }
}

/// Builder to create HTTP transport
#[derive(Clone)]
pub struct HttpTransportBuilder {
    port: u16,
    connect_timeout: Duration,
    response_timeout: Duration,
    send_timeout: Option<Duration>,
    expect_continue: bool,
    headers: BTreeMap<String, String>,
    #[cfg(feature = "__tls")]
    ignore_tls_errors: bool,
}

impl HttpTransportBuilder {
    fn new() -> Self {
        HttpTransportBuilder {
            port: IPP_PORT,
            connect_timeout: CONNECT_TIMEOUT,
            response_timeout: RESPONSE_TIMEOUT,
            send_timeout: None,
            expect_continue: true,
            headers: BTreeMap::new(),
            #[cfg(feature = "__tls")]
            ignore_tls_errors: false,
        }
    }

    /// Set connection port. Default is 631, any port in the printer URI is ignored.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set connect timeout. Default is 10 seconds.
    pub fn connect_timeout(mut self, duration: Duration) -> Self {
        self.connect_timeout = duration;
        self
    }

    /// Set timeout for receiving the response. Default is 10 seconds.
    pub fn response_timeout(mut self, duration: Duration) -> Self {
        self.response_timeout = duration;
        self
    }

    /// Set timeout for sending the whole document. Default is the response timeout.
    pub fn send_timeout(mut self, duration: Duration) -> Self {
        self.send_timeout = Some(duration);
        self
    }

    /// Enable or disable `Expect: 100-continue` for requests with a document. Default is true.
    pub fn expect_continue(mut self, flag: bool) -> Self {
        self.expect_continue = flag;
        self
    }

    #[cfg(feature = "__tls")]
    /// Enable or disable ignoring of TLS handshake errors. Default is false.
    pub fn ignore_tls_errors(mut self, flag: bool) -> Self {
        self.ignore_tls_errors = flag;
        self
    }

    /// Add a custom HTTP header
    pub fn http_header<K, V>(mut self, key: K, value: V) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.headers
            .insert(key.as_ref().to_ascii_lowercase(), value.as_ref().to_owned());
        self
    }

    /// Add basic auth header (RFC 7617)
    pub fn basic_auth<U, P>(self, username: U, password: P) -> Self
    where
        U: AsRef<str>,
        P: AsRef<str>,
    {
        let authz =
            base64::engine::general_purpose::STANDARD.encode(format!("{}:{}", username.as_ref(), password.as_ref()));
        self.http_header("authorization", format!("Basic {authz}"))
    }

    /// Build the transport
    pub fn build(self) -> HttpTransport {
        HttpTransport(self)
    }
}

impl fmt::Debug for HttpTransportBuilder {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let headers = self
            .headers
            .iter()
            .map(|(k, v)| (k.as_str(), if k == "authorization" { "<redacted>" } else { v.as_str() }))
            .collect::<BTreeMap<_, _>>();

        let mut s = f.debug_struct("HttpTransportBuilder");
        s.field("port", &self.port)
            .field("connect_timeout", &self.connect_timeout)
            .field("response_timeout", &self.response_timeout)
            .field("send_timeout", &self.send_timeout)
            .field("expect_continue", &self.expect_continue)
            .field("headers", &headers);
        #[cfg(feature = "__tls")]
        s.field("ignore_tls_errors", &self.ignore_tls_errors);
        s.finish()
    }
}

/// Blocking HTTP transport.
///
/// Every call creates its own agent, so no connection outlives the call that opened it.
#[derive(Clone, Debug)]
pub struct HttpTransport(HttpTransportBuilder);

impl HttpTransport {
    /// Create transport with default options
    pub fn new() -> Self {
        HttpTransport::builder().build()
    }

    /// Create transport builder for setting extra options
    pub fn builder() -> HttpTransportBuilder {
        HttpTransportBuilder::new()
    }

    /// Connection port
    pub fn port(&self) -> u16 {
        self.0.port
    }

    fn agent(&self, slot: StatusSlot) -> Agent {
        let builder = Agent::config_builder()
            .timeout_connect(Some(self.0.connect_timeout))
            .timeout_send_request(Some(self.0.response_timeout))
            .timeout_send_body(Some(self.0.send_timeout.unwrap_or(self.0.response_timeout)))
            .timeout_recv_response(Some(self.0.response_timeout))
            .timeout_recv_body(Some(self.0.response_timeout))
            .http_status_as_error(false);

        #[cfg(feature = "__tls")]
        let builder = {
            use ureq::tls::TlsConfig;

            let tls_config = TlsConfig::builder().disable_verification(self.0.ignore_tls_errors);

            #[cfg(not(feature = "tls"))]
            let tls_config = tls_config
                .provider(ureq::tls::TlsProvider::NativeTls)
                .root_certs(ureq::tls::RootCerts::PlatformVerifier);

            builder.tls_config(tls_config.build())
        };

        let config = builder.user_agent(USER_AGENT).build();
        Agent::with_parts(config, StatusLineConnector::new(slot), DefaultResolver::default())
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        HttpTransport::new()
    }
}

impl Transport for HttpTransport {
    fn send(
        &self,
        target: &PrinterUri,
        frame: &Frame,
        document: Option<&mut dyn Read>,
    ) -> Result<TransportResponse, IppError> {
        let url = target.transport_url(self.0.port);
        let mut body = RequestBody::new(frame, document);

        debug!("Sending IPP request to {url}, frame size: {}", frame.len());

        let slot = StatusSlot::default();
        let mut req = self.agent(slot.clone()).post(&url).header("content-type", IPP_MIME_TYPE);

        for (k, v) in &self.0.headers {
            req = req.header(k, v);
        }

        let response = if body.has_document() {
            if self.0.expect_continue {
                req = req.header("expect", "100-continue");
            }
            // unknown total length, sent chunked
            req.send(SendBody::from_reader(&mut body))?
        } else {
            req.send(frame.as_bytes())?
        };

        // reason phrase from the wire if the captured line matches, canonical one otherwise
        let status = match slot.take() {
            Some(status) if status.code() == response.status().as_u16() => status,
            _ => HttpStatus::from(response.status()),
        };
        debug!("Response status: {status}");

        let mut data = Vec::new();
        response.into_body().into_reader().read_to_end(&mut data)?;
        let body = Bytes::from(data);

        debug!("Response size: {}", body.len());

        if status.is_success() {
            Ok(TransportResponse { status, body })
        } else {
            Err(IppError::RequestError { status, body })
        }
    }
}
