//!
//! IPP operation: build, send, decode
//!
use std::io::Read;

use bytes::Bytes;
use http::Uri;
use log::debug;

use crate::{
    attribute::IppAttributes,
    encoder::Frame,
    error::{IppError, OperationError},
    model::{IppVersion, Operation, StatusCode},
    parser::decode_response,
    request::{IppParams, RequestBuilder},
    transport::{HttpStatus, HttpTransport, Transport, TransportResponse},
    uri::PrinterUri,
    IppHeader,
};

/// Outcome of one IPP operation call
#[derive(Clone, Debug)]
pub struct IppResult {
    http_status: HttpStatus,
    header: Option<IppHeader>,
    attributes: IppAttributes,
    payload: Bytes,
    raw: Bytes,
}

impl IppResult {
    fn from_response(response: TransportResponse) -> Result<IppResult, IppError> {
        let TransportResponse { status, body } = response;

        if body.is_empty() {
            debug!("Empty response body");
            return Ok(IppResult {
                http_status: status,
                header: None,
                attributes: IppAttributes::new(),
                payload: Bytes::new(),
                raw: body,
            });
        }

        let (header, attributes, payload) = decode_response(body.clone())
            .map_err(|source| IppError::ParseError {
                source,
                response: body.clone(),
            })?
            .into_parts();

        Ok(IppResult {
            http_status: status,
            header: Some(header),
            attributes,
            payload,
            raw: body,
        })
    }

    /// HTTP status of the response
    pub fn http_status(&self) -> &HttpStatus {
        &self.http_status
    }

    /// HTTP reason phrase
    pub fn status_line(&self) -> &str {
        self.http_status.reason()
    }

    /// IPP header, `None` if the server sent an empty body
    pub fn header(&self) -> Option<&IppHeader> {
        self.header.as_ref()
    }

    /// IPP status code, `None` if the server sent an empty body
    pub fn status_code(&self) -> Option<StatusCode> {
        self.header.as_ref().map(IppHeader::status_code)
    }

    /// Decoded attribute groups
    pub fn attributes(&self) -> &IppAttributes {
        &self.attributes
    }

    /// Bytes following the attributes in the response
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Complete response body as received
    pub fn raw(&self) -> &Bytes {
        &self.raw
    }

    /// Consume the result and return the attributes
    pub fn into_attributes(self) -> IppAttributes {
        self.attributes
    }
}

/// IPP operation bound to an operation code and a transport.
///
/// An instance holds no per-call state and can be shared between threads.
/// Each call reads its document once; the same stream must not be handed to two calls.
#[derive(Clone, Debug)]
pub struct IppOperation<T = HttpTransport> {
    builder: RequestBuilder,
    transport: T,
}

impl IppOperation<HttpTransport> {
    /// Create operation with the default HTTP transport
    pub fn new<O>(operation: O) -> Self
    where
        O: Into<u16>,
    {
        IppOperation::with_transport(operation, HttpTransport::new())
    }

    /// Get-Printer-Attributes operation
    pub fn get_printer_attributes() -> Self {
        IppOperation::new(Operation::GetPrinterAttributes)
    }

    /// Get-Jobs operation
    pub fn get_jobs() -> Self {
        IppOperation::new(Operation::GetJobs)
    }

    /// Print-Job operation, the document is passed to [`IppOperation::execute`]
    pub fn print_job() -> Self {
        IppOperation::new(Operation::PrintJob)
    }

    /// Validate-Job operation
    pub fn validate_job() -> Self {
        IppOperation::new(Operation::ValidateJob)
    }

    /// CUPS-Get-Printers operation
    pub fn cups_get_printers() -> Self {
        IppOperation::new(Operation::CupsGetPrinters)
    }

    /// CUPS-Get-Default operation
    pub fn cups_get_default() -> Self {
        IppOperation::new(Operation::CupsGetDefault)
    }
}

impl<T> IppOperation<T>
where
    T: Transport,
{
    /// Create operation with a custom transport
    pub fn with_transport<O>(operation: O, transport: T) -> Self
    where
        O: Into<u16>,
    {
        IppOperation {
            builder: RequestBuilder::new(operation),
            transport,
        }
    }

    /// Set IPP protocol version, default is 1.1
    pub fn with_version(mut self, version: IppVersion) -> Self {
        self.builder = self.builder.version(version);
        self
    }

    /// Set initial frame buffer capacity, default is 8 KiB
    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.builder = self.builder.capacity(capacity);
        self
    }

    /// Operation code
    pub fn operation(&self) -> u16 {
        self.builder.operation()
    }

    /// Transport used by this operation
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Encode the request frame without sending it
    pub fn frame(&self, uri: &Uri, params: Option<&IppParams>) -> Result<Frame, OperationError> {
        self.builder
            .build(uri, params)
            .map_err(|e| OperationError::new(self.operation(), e))
    }

    /// Send the operation to the printer and decode the response.
    ///
    /// The optional document is sent after the request frame. A single attempt is made.
    pub fn execute(
        &self,
        uri: &Uri,
        params: Option<&IppParams>,
        document: Option<&mut dyn Read>,
    ) -> Result<IppResult, OperationError> {
        self.run(uri, params, document)
            .map_err(|e| OperationError::new(self.operation(), e))
    }

    fn run(&self, uri: &Uri, params: Option<&IppParams>, document: Option<&mut dyn Read>) -> Result<IppResult, IppError> {
        let target = PrinterUri::new(uri)?;
        let frame = self.builder.build_for(&target, params)?;

        debug!(
            "Executing operation {:#06x} on {}, document: {}",
            self.operation(),
            target.to_attribute_value(),
            document.is_some()
        );

        let response = self.transport.send(&target, &frame, document)?;
        let result = IppResult::from_response(response)?;

        if let Some(status) = result.status_code() {
            debug!("IPP status: {status}, HTTP status: {}", result.http_status());
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use std::{io, sync::Mutex, thread, time::Duration};

    use bytes::{BufMut, BytesMut};

    use super::*;
    use crate::{
        attribute::IppAttribute,
        encoder::FrameWriter,
        error::ErrorKind,
        model::{DelimiterTag, ValueTag},
        transport::tests::serve_once,
        value::IppValue,
    };

    // echoes the requesting user back in a printer group and in the status line
    struct EchoTransport {
        documents: Mutex<Vec<Vec<u8>>>,
    }

    impl EchoTransport {
        fn new() -> Self {
            EchoTransport {
                documents: Mutex::new(Vec::new()),
            }
        }
    }

    impl Transport for EchoTransport {
        fn send(
            &self,
            _target: &PrinterUri,
            frame: &Frame,
            document: Option<&mut dyn Read>,
        ) -> Result<TransportResponse, IppError> {
            let request = decode_response(Bytes::copy_from_slice(frame.as_bytes())).unwrap();
            let user = request
                .attributes()
                .get(DelimiterTag::OperationAttributes, IppAttribute::REQUESTING_USER_NAME)
                .map(|a| a.value().to_string())
                .unwrap_or_default();

            if let Some(document) = document {
                let mut data = Vec::new();
                document.read_to_end(&mut data)?;
                self.documents.lock().unwrap().push(data);
            }

            // make concurrent calls overlap
            thread::sleep(Duration::from_millis(5));

            let mut writer = FrameWriter::new();
            writer
                .operation(IppVersion::v1_1(), StatusCode::SuccessfulOk as u16, request.header().request_id)
                .unwrap()
                .group(DelimiterTag::PrinterAttributes)
                .name(Some(IppAttribute::PRINTER_NAME), &user)
                .unwrap();

            Ok(TransportResponse {
                status: HttpStatus::new(200, format!("OK {user}")),
                body: writer.end().into_bytes(),
            })
        }
    }

    struct FailingTransport;

    impl Transport for FailingTransport {
        fn send(&self, _: &PrinterUri, _: &Frame, _: Option<&mut dyn Read>) -> Result<TransportResponse, IppError> {
            Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused").into())
        }
    }

    struct FixedTransport(Bytes);

    impl Transport for FixedTransport {
        fn send(&self, _: &PrinterUri, _: &Frame, _: Option<&mut dyn Read>) -> Result<TransportResponse, IppError> {
            Ok(TransportResponse {
                status: HttpStatus::new(200, "OK"),
                body: self.0.clone(),
            })
        }
    }

    fn uri() -> Uri {
        "ipp://localhost/printers/test".parse().unwrap()
    }

    #[test]
    fn test_operation_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<IppOperation>();
        assert_send_sync::<IppOperation<EchoTransport>>();
    }

    #[test]
    fn test_execute_decodes_response() {
        let operation = IppOperation::with_transport(Operation::GetPrinterAttributes, EchoTransport::new());
        let params = IppParams::new().user_name("dave");

        let result = operation.execute(&uri(), Some(&params), None).unwrap();
        assert_eq!(result.status_line(), "OK dave");
        assert_eq!(result.status_code(), Some(StatusCode::SuccessfulOk));
        assert_eq!(
            result
                .attributes()
                .get(DelimiterTag::PrinterAttributes, IppAttribute::PRINTER_NAME)
                .map(|a| a.value()),
            Some(&IppValue::NameWithoutLanguage("dave".to_owned()))
        );
    }

    #[test]
    fn test_execute_passes_document() {
        let transport = EchoTransport::new();
        let operation = IppOperation::with_transport(Operation::PrintJob, &transport);

        let mut document = io::Cursor::new(b"print me".to_vec());
        operation.execute(&uri(), None, Some(&mut document)).unwrap();

        assert_eq!(transport.documents.lock().unwrap().as_slice(), &[b"print me".to_vec()]);
    }

    #[test]
    fn test_concurrent_calls_keep_their_results() {
        let operation = IppOperation::with_transport(Operation::GetPrinterAttributes, EchoTransport::new());

        thread::scope(|scope| {
            let handles = (0..16)
                .map(|i| {
                    let operation = &operation;
                    scope.spawn(move || {
                        let user = format!("user-{i}");
                        let params = IppParams::new().user_name(&user);
                        let result = operation.execute(&uri(), Some(&params), None).unwrap();
                        (user, result)
                    })
                })
                .collect::<Vec<_>>();

            for handle in handles {
                let (user, result) = handle.join().unwrap();
                assert_eq!(result.status_line(), format!("OK {user}"));
                let name = result
                    .attributes()
                    .get(DelimiterTag::PrinterAttributes, IppAttribute::PRINTER_NAME)
                    .map(|a| a.value().to_string());
                assert_eq!(name, Some(user));
            }
        });
    }

    #[test]
    fn test_input_error_before_transport() {
        let operation = IppOperation::with_transport(Operation::GetJobs, FailingTransport);
        let params = IppParams::new().set(IppAttribute::LIMIT, "many");

        let err = operation.execute(&uri(), Some(&params), None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Input);
        assert_eq!(err.operation(), Operation::GetJobs as u16);
    }

    #[test]
    fn test_transport_error_is_wrapped() {
        let operation = IppOperation::with_transport(Operation::GetJobs, FailingTransport);

        let err = operation.execute(&uri(), None, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert!(err.inner().is_retriable());
        assert!(matches!(err.into_inner(), IppError::IoError(e) if e.kind() == io::ErrorKind::ConnectionRefused));
    }

    #[test]
    fn test_decoding_error_keeps_bytes() {
        let garbage = Bytes::from_static(b"<html>oops</html>");
        let operation = IppOperation::with_transport(Operation::GetJobs, FixedTransport(garbage.clone()));

        let err = operation.execute(&uri(), None, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decoding);
        assert_eq!(err.inner().response_bytes(), Some(&garbage));
    }

    #[test]
    fn test_empty_response_body() {
        let operation = IppOperation::with_transport(Operation::GetJobs, FixedTransport(Bytes::new()));

        let result = operation.execute(&uri(), None, None).unwrap();
        assert!(result.raw().is_empty());
        assert!(result.header().is_none());
        assert!(result.attributes().groups().is_empty());
        assert_eq!(result.http_status().code(), 200);
    }

    #[test]
    fn test_response_payload() {
        let mut body = BytesMut::new();
        body.put_slice(&[1, 1, 0, 0, 0, 0, 0, 1, 3]);
        body.put_slice(b"*PPD-Adobe");
        let operation = IppOperation::with_transport(Operation::CupsGetPPD, FixedTransport(body.freeze()));

        let result = operation.execute(&uri(), None, None).unwrap();
        assert_eq!(result.payload().as_ref(), b"*PPD-Adobe");
        assert_eq!(result.raw().len(), 19);
    }

    #[test]
    fn test_frame_uses_configured_version() {
        let operation = IppOperation::get_printer_attributes()
            .with_version(IppVersion::v2_0())
            .with_buffer_capacity(64);
        let frame = operation.frame(&uri(), None).unwrap();
        assert_eq!(&frame.as_bytes()[0..4], &[0x02, 0x00, 0x00, 0x0b]);
        assert_eq!(frame.as_bytes()[8], DelimiterTag::OperationAttributes as u8);
        assert_eq!(frame.as_bytes()[9], ValueTag::Charset as u8);
    }

    #[test]
    fn test_execute_over_http() {
        let response = vec![
            0x01, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x04, 0x23, 0x00, 0x0d, b'p', b'r', b'i', b'n', b't', b'e',
            b'r', b'-', b's', b't', b'a', b't', b'e', 0x00, 0x04, 0x00, 0x00, 0x00, 0x03, 0x03,
        ];
        let (port, server) = serve_once("200 Everything Fine", response);
        let transport = HttpTransport::builder().port(port).build();
        let operation = IppOperation::with_transport(Operation::GetPrinterAttributes, transport);

        let params = IppParams::new().requested_attributes(["printer-state"]);
        let result = operation
            .execute(&"ipp://127.0.0.1:631/printers/test".parse().unwrap(), Some(&params), None)
            .unwrap();

        assert_eq!(result.status_line(), "Everything Fine");
        assert_eq!(
            result
                .attributes()
                .get(DelimiterTag::PrinterAttributes, IppAttribute::PRINTER_STATE)
                .and_then(|a| a.value().as_enum()),
            Some(&3)
        );

        let request = server.join().unwrap();
        let sent = decode_response(Bytes::from(request.body)).unwrap();
        assert_eq!(sent.header().operation_or_status, Operation::GetPrinterAttributes as u16);
        assert_eq!(
            sent.attributes()
                .get(DelimiterTag::OperationAttributes, IppAttribute::PRINTER_URI)
                .map(|a| a.value().to_string())
                .as_deref(),
            Some("http://127.0.0.1/printers/test")
        );
    }

    #[test]
    fn test_empty_http_body() {
        let (port, server) = serve_once("200 OK", Vec::new());
        let operation = IppOperation::with_transport(
            Operation::GetPrinterAttributes,
            HttpTransport::builder().port(port).build(),
        );

        let result = operation.execute(&uri(), None, None).unwrap();
        assert!(result.raw().is_empty());
        assert_eq!(result.status_line(), "OK");
        server.join().unwrap();
    }
}
