//!
//! IPP request builder
//!
use std::{
    collections::{BTreeMap, HashMap},
    sync::atomic::{AtomicU32, Ordering},
};

use http::Uri;
use log::debug;

use crate::{
    attribute::IppAttribute,
    encoder::{Frame, FrameWriter, DEFAULT_FRAME_CAPACITY},
    error::IppError,
    model::IppVersion,
    uri::PrinterUri,
};

static REQUEST_ID: AtomicU32 = AtomicU32::new(1);

fn next_request_id() -> u32 {
    REQUEST_ID.fetch_add(1, Ordering::Relaxed)
}

/// Named request parameters, mapped onto well-known operation attributes.
///
/// Recognized keys are `requesting-user-name`, `limit` and `requested-attributes`,
/// other keys are ignored when the frame is built.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IppParams {
    values: BTreeMap<String, String>,
}

impl IppParams {
    /// Create empty parameter set
    pub fn new() -> Self {
        IppParams::default()
    }

    /// Set a parameter
    pub fn set<K, V>(mut self, key: K, value: V) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.values.insert(key.as_ref().to_owned(), value.as_ref().to_owned());
        self
    }

    /// Specify requesting-user-name attribute
    pub fn user_name<S>(self, user_name: S) -> Self
    where
        S: AsRef<str>,
    {
        self.set(IppAttribute::REQUESTING_USER_NAME, user_name)
    }

    /// Specify limit attribute
    pub fn limit(self, limit: u32) -> Self {
        self.set(IppAttribute::LIMIT, limit.to_string())
    }

    /// Specify requested-attributes attribute
    pub fn requested_attributes<I, T>(self, attributes: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let list = attributes
            .into_iter()
            .map(|a| a.as_ref().to_owned())
            .collect::<Vec<_>>()
            .join(" ");
        self.set(IppAttribute::REQUESTED_ATTRIBUTES, list)
    }

    /// Get a parameter value
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Check if no parameters are set
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for IppParams
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(IppParams::new(), |params, (k, v)| params.set(k, v))
    }
}

impl From<HashMap<String, String>> for IppParams {
    fn from(map: HashMap<String, String>) -> Self {
        IppParams {
            values: map.into_iter().collect(),
        }
    }
}

/// Builder of IPP request frames for one operation code
#[derive(Clone, Debug)]
pub struct RequestBuilder {
    version: IppVersion,
    operation: u16,
    capacity: usize,
}

impl RequestBuilder {
    /// Create request builder for a given operation
    pub fn new<O>(operation: O) -> Self
    where
        O: Into<u16>,
    {
        RequestBuilder {
            version: IppVersion::default(),
            operation: operation.into(),
            capacity: DEFAULT_FRAME_CAPACITY,
        }
    }

    /// Set IPP protocol version, default is 1.1
    pub fn version(mut self, version: IppVersion) -> Self {
        self.version = version;
        self
    }

    /// Set initial frame buffer capacity
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Operation code
    pub fn operation(&self) -> u16 {
        self.operation
    }

    /// Build a request frame for the printer URI and the optional parameters.
    ///
    /// Field order is fixed: header, charset, natural language, `printer-uri`,
    /// then `requesting-user-name`, `limit` and `requested-attributes` when present.
    pub fn build(&self, uri: &Uri, params: Option<&IppParams>) -> Result<Frame, IppError> {
        let printer_uri = PrinterUri::new(uri)?;
        self.build_for(&printer_uri, params)
    }

    pub(crate) fn build_for(&self, printer_uri: &PrinterUri, params: Option<&IppParams>) -> Result<Frame, IppError> {
        // validate before anything is written
        let limit = params
            .and_then(|p| p.get(IppAttribute::LIMIT))
            .map(|value| {
                value.parse::<i32>().map_err(|source| IppError::InvalidLimit {
                    value: value.to_owned(),
                    source,
                })
            })
            .transpose()?;

        let mut writer = FrameWriter::with_capacity(self.capacity);
        writer
            .operation(self.version, self.operation, next_request_id())?
            .uri(IppAttribute::PRINTER_URI, &printer_uri.to_attribute_value())?;

        if let Some(params) = params {
            if let Some(user_name) = params.get(IppAttribute::REQUESTING_USER_NAME) {
                writer.name(Some(IppAttribute::REQUESTING_USER_NAME), user_name)?;
            }

            if let Some(limit) = limit {
                writer.integer(Some(IppAttribute::LIMIT), limit)?;
            }

            if let Some(attributes) = params.get(IppAttribute::REQUESTED_ATTRIBUTES) {
                let mut name = Some(IppAttribute::REQUESTED_ATTRIBUTES);
                for keyword in attributes.split_whitespace() {
                    writer.keyword(name.take(), keyword)?;
                }
            }
        }

        let frame = writer.end();
        debug!("Encoded IPP frame: operation {:#06x}, {} bytes", self.operation, frame.len());

        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::{
        error::ErrorKind,
        model::{DelimiterTag, Operation, ValueTag},
        parser::decode_response,
        value::IppValue,
    };

    // (tag, name, value) of every field in the operation group
    fn fields(frame: &Frame) -> Vec<(u8, String, Vec<u8>)> {
        let data = frame.as_bytes();
        assert_eq!(data[8], DelimiterTag::OperationAttributes as u8);
        let mut pos = 9;
        let mut result = Vec::new();
        while data[pos] != DelimiterTag::EndOfAttributes as u8 {
            let tag = data[pos];
            let name_len = u16::from_be_bytes([data[pos + 1], data[pos + 2]]) as usize;
            let name = String::from_utf8(data[pos + 3..pos + 3 + name_len].to_vec()).unwrap();
            pos += 3 + name_len;
            let value_len = u16::from_be_bytes([data[pos], data[pos + 1]]) as usize;
            let value = data[pos + 2..pos + 2 + value_len].to_vec();
            pos += 2 + value_len;
            result.push((tag, name, value));
        }
        assert_eq!(pos, data.len() - 1);
        result
    }

    fn uri() -> Uri {
        "ipp://localhost:631/printers/test".parse().unwrap()
    }

    #[test]
    fn test_build_without_params() {
        let frame = RequestBuilder::new(Operation::GetPrinterAttributes)
            .build(&uri(), None)
            .unwrap();

        assert_eq!(&frame.as_bytes()[0..4], &[0x01, 0x01, 0x00, 0x0b]);
        assert_eq!(frame.as_bytes().last(), Some(&0x03));

        let fields = fields(&frame);
        assert_eq!(fields.len(), 3);
        let uris = fields
            .iter()
            .filter(|(_, name, _)| name == IppAttribute::PRINTER_URI)
            .collect::<Vec<_>>();
        assert_eq!(uris.len(), 1);
        assert_eq!(uris[0].0, ValueTag::Uri as u8);
        assert_eq!(uris[0].2, b"http://localhost/printers/test");
    }

    #[test]
    fn test_build_with_all_params() {
        let params = IppParams::new()
            .user_name("alice")
            .limit(25)
            .requested_attributes(["printer-name", "printer-state", "printer-info"]);
        let frame = RequestBuilder::new(Operation::CupsGetPrinters)
            .build(&uri(), Some(&params))
            .unwrap();

        let fields = fields(&frame);
        let names = fields.iter().map(|(_, name, _)| name.as_str()).collect::<Vec<_>>();
        assert_eq!(
            names,
            vec![
                IppAttribute::ATTRIBUTES_CHARSET,
                IppAttribute::ATTRIBUTES_NATURAL_LANGUAGE,
                IppAttribute::PRINTER_URI,
                IppAttribute::REQUESTING_USER_NAME,
                IppAttribute::LIMIT,
                IppAttribute::REQUESTED_ATTRIBUTES,
                "",
                "",
            ]
        );
        assert_eq!(fields[3], (ValueTag::NameWithoutLanguage as u8, names[3].to_owned(), b"alice".to_vec()));
        assert_eq!(fields[4], (ValueTag::Integer as u8, "limit".to_owned(), vec![0, 0, 0, 25]));

        let keywords = fields
            .iter()
            .filter(|(tag, _, _)| *tag == ValueTag::Keyword as u8)
            .map(|(_, _, value)| String::from_utf8(value.clone()).unwrap())
            .collect::<Vec<_>>();
        assert_eq!(keywords, vec!["printer-name", "printer-state", "printer-info"]);
    }

    #[test]
    fn test_requested_attributes_tokens() {
        let params = IppParams::new().set(IppAttribute::REQUESTED_ATTRIBUTES, "a  b c");
        let frame = RequestBuilder::new(Operation::GetPrinterAttributes)
            .build(&uri(), Some(&params))
            .unwrap();

        let keywords = fields(&frame)
            .into_iter()
            .filter(|(tag, _, _)| *tag == ValueTag::Keyword as u8)
            .collect::<Vec<_>>();
        assert_eq!(keywords.len(), 3);
        assert_eq!(keywords[0].1, "requested-attributes");
        assert_eq!(keywords[0].2, b"a");
        assert_eq!(keywords[1], (ValueTag::Keyword as u8, String::new(), b"b".to_vec()));
        assert_eq!(keywords[2], (ValueTag::Keyword as u8, String::new(), b"c".to_vec()));
    }

    #[test]
    fn test_empty_requested_attributes() {
        let params = IppParams::new().set(IppAttribute::REQUESTED_ATTRIBUTES, "   ");
        let frame = RequestBuilder::new(Operation::GetPrinterAttributes)
            .build(&uri(), Some(&params))
            .unwrap();
        assert_eq!(fields(&frame).len(), 3);
    }

    #[test]
    fn test_absent_params_are_omitted() {
        let params = IppParams::new().set("job-name", "ignored");
        let with_params = RequestBuilder::new(Operation::GetJobs)
            .build(&uri(), Some(&params))
            .unwrap();
        assert_eq!(fields(&with_params).len(), 3);
    }

    #[test]
    fn test_invalid_limit() {
        let params = IppParams::new().user_name("bob").set(IppAttribute::LIMIT, "ten");
        let err = RequestBuilder::new(Operation::GetJobs)
            .build(&uri(), Some(&params))
            .unwrap_err();
        assert!(matches!(err, IppError::InvalidLimit { ref value, .. } if value == "ten"));
        assert_eq!(err.kind(), ErrorKind::Input);
    }

    #[test]
    fn test_limit_with_whitespace() {
        for limit in [" 5", "5 ", "5\n", ""] {
            let params = IppParams::new().set(IppAttribute::LIMIT, limit);
            let err = RequestBuilder::new(Operation::GetJobs)
                .build(&uri(), Some(&params))
                .unwrap_err();
            assert!(matches!(err, IppError::InvalidLimit { ref value, .. } if value == limit));
        }
    }

    #[test]
    fn test_missing_uri() {
        let uri = "/printers/test".parse::<Uri>().unwrap();
        let err = RequestBuilder::new(Operation::GetJobs).build(&uri, None).unwrap_err();
        assert!(matches!(err, IppError::MissingUri));
    }

    #[test]
    fn test_request_ids_are_distinct() {
        let builder = RequestBuilder::new(Operation::GetPrinterAttributes);
        let first = builder.build(&uri(), None).unwrap().request_id().unwrap();
        let second = builder.build(&uri(), None).unwrap().request_id().unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_decode_round_trip() {
        let params = IppParams::new().user_name("carol").requested_attributes(["all"]);
        let frame = RequestBuilder::new(Operation::GetPrinterAttributes)
            .version(IppVersion::v2_0())
            .build(&"ipps://printer.local:443/ipp/print".parse().unwrap(), Some(&params))
            .unwrap();

        let decoded = decode_response(Bytes::copy_from_slice(frame.as_bytes())).unwrap();
        assert_eq!(decoded.header().version, IppVersion::v2_0());
        assert_eq!(decoded.header().operation_or_status, Operation::GetPrinterAttributes as u16);
        assert_eq!(
            decoded
                .attributes()
                .get(DelimiterTag::OperationAttributes, IppAttribute::PRINTER_URI)
                .map(|a| a.value()),
            Some(&IppValue::Uri("https://printer.local/ipp/print".to_owned()))
        );
        assert_eq!(
            decoded
                .attributes()
                .get(DelimiterTag::OperationAttributes, IppAttribute::REQUESTED_ATTRIBUTES)
                .map(|a| a.value()),
            Some(&IppValue::Keyword("all".to_owned()))
        );
    }
}
