//!
//! IPP reader over an in-memory response body
//!
use bytes::{Buf, Bytes};

use crate::{model::IppVersion, parser::IppParseError, IppHeader};

/// IPP reader contains a set of methods to read IPP elements from a byte buffer.
///
/// Every read is bounds-checked: running out of data yields
/// [`IppParseError::UnexpectedEof`] with the offset where the read started.
pub struct IppReader {
    inner: Bytes,
    start_len: usize,
}

impl IppReader {
    /// Create IppReader from the response bytes
    pub fn new(inner: Bytes) -> Self {
        let start_len = inner.len();
        IppReader { inner, start_len }
    }

    /// Current offset from the start of the data
    pub fn position(&self) -> usize {
        self.start_len - self.inner.remaining()
    }

    fn ensure(&self, len: usize) -> Result<(), IppParseError> {
        if self.inner.remaining() < len {
            Err(IppParseError::UnexpectedEof(self.position()))
        } else {
            Ok(())
        }
    }

    fn read_bytes(&mut self, len: usize) -> Result<Bytes, IppParseError> {
        self.ensure(len)?;
        Ok(self.inner.split_to(len))
    }

    fn read_u8(&mut self) -> Result<u8, IppParseError> {
        self.ensure(1)?;
        Ok(self.inner.get_u8())
    }

    fn read_u16(&mut self) -> Result<u16, IppParseError> {
        self.ensure(2)?;
        Ok(self.inner.get_u16())
    }

    fn read_u32(&mut self) -> Result<u32, IppParseError> {
        self.ensure(4)?;
        Ok(self.inner.get_u32())
    }

    /// Read tag
    pub fn read_tag(&mut self) -> Result<u8, IppParseError> {
        self.read_u8()
    }

    /// Read IPP name from [len; name] element
    pub fn read_name(&mut self) -> Result<String, IppParseError> {
        let name_len = self.read_u16()? as usize;
        self.read_bytes(name_len)
            .map(|b| String::from_utf8_lossy(&b).into_owned())
    }

    /// Read IPP value from [len; value] element
    pub fn read_value(&mut self) -> Result<Bytes, IppParseError> {
        let value_len = self.read_u16()? as usize;
        self.read_bytes(value_len)
    }

    /// Read IPP header
    pub fn read_header(&mut self) -> Result<IppHeader, IppParseError> {
        let version = IppVersion(self.read_u16()?);
        let operation_status = self.read_u16()?;
        let request_id = self.read_u32()?;

        Ok(IppHeader::new(version, operation_status, request_id))
    }

    /// Return the bytes not consumed yet
    pub fn into_remaining(self) -> Bytes {
        self.inner
    }
}

impl From<Bytes> for IppReader {
    fn from(data: Bytes) -> Self {
        IppReader::new(data)
    }
}
