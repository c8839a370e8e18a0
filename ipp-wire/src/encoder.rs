//!
//! IPP request frame encoder
//!
//! A frame is written through [`FrameWriter`], one tagged field at a time, and
//! sealed with [`FrameWriter::end`]. Sealing consumes the writer, so a finished
//! [`Frame`] can no longer be appended to.
//!
use std::io;

use bytes::{BufMut, Bytes, BytesMut};

use crate::{
    attribute::IppAttribute,
    model::{DelimiterTag, IppVersion, ValueTag},
};

/// Initial capacity of the frame buffer
pub const DEFAULT_FRAME_CAPACITY: usize = 8192;

const DEFAULT_CHARSET: &str = "utf-8";
const DEFAULT_NATURAL_LANGUAGE: &str = "en";

/// Frame encoding error
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EncodeError {
    #[error("Attribute name is too long: {0} bytes")]
    NameTooLong(usize),

    #[error("Value of '{name}' is too long: {len} bytes")]
    ValueTooLong { name: String, len: usize },
}

fn field_len(len: usize) -> Option<u16> {
    u16::try_from(len).ok()
}

/// Writer for a single IPP request frame
#[derive(Debug)]
pub struct FrameWriter {
    buffer: BytesMut,
    // name of the last named field, for continuation values
    last_name: String,
}

impl FrameWriter {
    /// Create a writer with the default initial capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_FRAME_CAPACITY)
    }

    /// Create a writer with a given initial capacity. The buffer grows as needed.
    pub fn with_capacity(capacity: usize) -> Self {
        FrameWriter {
            buffer: BytesMut::with_capacity(capacity),
            last_name: String::new(),
        }
    }

    /// Write the operation header: version, operation id and request id, followed by the
    /// operation attributes group tag and the mandatory charset and natural language attributes.
    pub fn operation(
        &mut self,
        version: IppVersion,
        operation: u16,
        request_id: u32,
    ) -> Result<&mut Self, EncodeError> {
        self.buffer.put_u16(version.0);
        self.buffer.put_u16(operation);
        self.buffer.put_u32(request_id);
        self.buffer.put_u8(DelimiterTag::OperationAttributes as u8);

        self.charset(IppAttribute::ATTRIBUTES_CHARSET, DEFAULT_CHARSET)?;
        self.natural_language(IppAttribute::ATTRIBUTES_NATURAL_LANGUAGE, DEFAULT_NATURAL_LANGUAGE)
    }

    /// Write a single field: `[tag][name-length][name][value-length][value]`.
    ///
    /// A `None` name writes a continuation field (name length 0) which adds another value to the previous attribute.
    pub fn field(&mut self, tag: ValueTag, name: Option<&str>, value: &[u8]) -> Result<&mut Self, EncodeError> {
        let name = name.unwrap_or_default();
        let name_len = field_len(name.len()).ok_or(EncodeError::NameTooLong(name.len()))?;

        let value_len = field_len(value.len()).ok_or_else(|| EncodeError::ValueTooLong {
            name: if name.is_empty() {
                self.last_name.clone()
            } else {
                name.to_owned()
            },
            len: value.len(),
        })?;

        if !name.is_empty() {
            self.last_name = name.to_owned();
        }

        self.buffer.put_u8(tag as u8);
        self.buffer.put_u16(name_len);
        self.buffer.put_slice(name.as_bytes());
        self.buffer.put_u16(value_len);
        self.buffer.put_slice(value);

        Ok(self)
    }

    /// Write a `uri` field
    pub fn uri(&mut self, name: &str, value: &str) -> Result<&mut Self, EncodeError> {
        self.field(ValueTag::Uri, Some(name), value.as_bytes())
    }

    /// Write a `charset` field
    pub fn charset(&mut self, name: &str, value: &str) -> Result<&mut Self, EncodeError> {
        self.field(ValueTag::Charset, Some(name), value.as_bytes())
    }

    /// Write a `naturalLanguage` field
    pub fn natural_language(&mut self, name: &str, value: &str) -> Result<&mut Self, EncodeError> {
        self.field(ValueTag::NaturalLanguage, Some(name), value.as_bytes())
    }

    /// Write a `nameWithoutLanguage` field
    pub fn name(&mut self, name: Option<&str>, value: &str) -> Result<&mut Self, EncodeError> {
        self.field(ValueTag::NameWithoutLanguage, name, value.as_bytes())
    }

    /// Write a `textWithoutLanguage` field
    pub fn text(&mut self, name: Option<&str>, value: &str) -> Result<&mut Self, EncodeError> {
        self.field(ValueTag::TextWithoutLanguage, name, value.as_bytes())
    }

    /// Write a `keyword` field
    pub fn keyword(&mut self, name: Option<&str>, value: &str) -> Result<&mut Self, EncodeError> {
        self.field(ValueTag::Keyword, name, value.as_bytes())
    }

    /// Write an `integer` field
    pub fn integer(&mut self, name: Option<&str>, value: i32) -> Result<&mut Self, EncodeError> {
        self.field(ValueTag::Integer, name, &value.to_be_bytes())
    }

    /// Start a new attribute group
    pub fn group(&mut self, tag: DelimiterTag) -> &mut Self {
        self.buffer.put_u8(tag as u8);
        self.last_name.clear();
        self
    }

    /// Number of bytes written so far
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if nothing has been written yet
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Append the end-of-attributes tag and seal the frame
    pub fn end(mut self) -> Frame {
        self.buffer.put_u8(DelimiterTag::EndOfAttributes as u8);
        Frame {
            bytes: self.buffer.freeze(),
        }
    }
}

impl Default for FrameWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Sealed IPP request frame, ready for transmission
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    bytes: Bytes,
}

impl Frame {
    /// Frame contents
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Frame length in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Always false for a sealed frame, it holds at least the end-of-attributes tag
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Operation id from the frame header, if the header is complete
    pub fn operation(&self) -> Option<u16> {
        self.bytes.get(2..4).map(|b| u16::from_be_bytes([b[0], b[1]]))
    }

    /// Request id from the frame header, if the header is complete
    pub fn request_id(&self) -> Option<u32> {
        self.bytes.get(4..8).map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Return a reader over the frame bytes
    pub fn to_reader(&self) -> io::Cursor<Bytes> {
        io::Cursor::new(self.bytes.clone())
    }

    /// Consume the frame and return the bytes
    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}
