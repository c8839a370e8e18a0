//!
//! IPP response decoder
//!
use std::collections::BTreeMap;

use bytes::Bytes;
use log::{error, trace};
use num_traits::FromPrimitive;

use crate::{
    attribute::{IppAttribute, IppAttributeGroup, IppAttributes},
    model::{DelimiterTag, ValueTag},
    reader::IppReader,
    value::IppValue,
    IppHeader,
};

/// Parse error enum
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IppParseError {
    #[error("Invalid tag: {0:#04x}")]
    InvalidTag(u8),

    #[error("Invalid IPP collection")]
    InvalidCollection,

    #[error("Unexpected end of data at offset {0}")]
    UnexpectedEof(usize),

    #[error("Invalid length {len} for value tag {tag:#04x}")]
    InvalidValueLength { tag: u8, len: usize },
}

/// Decoded IPP message: header, attribute groups and the trailing bytes after the end-of-attributes tag
#[derive(Clone, Debug)]
pub struct IppResponse {
    header: IppHeader,
    attributes: IppAttributes,
    payload: Bytes,
}

impl IppResponse {
    /// Get IPP header
    pub fn header(&self) -> &IppHeader {
        &self.header
    }

    /// Get attributes
    pub fn attributes(&self) -> &IppAttributes {
        &self.attributes
    }

    /// Bytes following the end-of-attributes tag, e.g. a PPD file returned by CUPS-Get-PPD
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Split into header, attributes and payload
    pub fn into_parts(self) -> (IppHeader, IppAttributes, Bytes) {
        (self.header, self.attributes, self.payload)
    }
}

// create a single value from one-element list, list otherwise
fn list_or_value(mut list: Vec<IppValue>) -> IppValue {
    if list.len() == 1 {
        list.remove(0)
    } else {
        IppValue::Array(list)
    }
}

struct ParserState {
    current_group: Option<IppAttributeGroup>,
    last_name: Option<String>,
    context: Vec<Vec<IppValue>>,
    attributes: IppAttributes,
}

impl ParserState {
    fn new() -> Self {
        ParserState {
            current_group: None,
            last_name: None,
            context: vec![vec![]],
            attributes: IppAttributes::new(),
        }
    }

    fn add_last_attribute(&mut self) {
        if let Some(last_name) = self.last_name.take() {
            if let (Some(val_list), Some(group)) = (self.context.pop(), self.current_group.as_mut()) {
                let attr = IppAttribute::new(&last_name, list_or_value(val_list));
                group.attributes_mut().insert(last_name, attr);
            }
            self.context.push(vec![]);
        }
    }

    fn parse_delimiter(&mut self, tag: u8) -> Result<DelimiterTag, IppParseError> {
        trace!("Delimiter tag: {tag:0x}");

        let tag = DelimiterTag::from_u8(tag).ok_or(IppParseError::InvalidTag(tag))?;

        self.add_last_attribute();

        if let Some(group) = self.current_group.take() {
            self.attributes.groups_mut().push(group);
        }

        if tag != DelimiterTag::EndOfAttributes {
            self.current_group = Some(IppAttributeGroup::new(tag));
        }

        Ok(tag)
    }

    fn parse_value(&mut self, tag: u8, name: String, value: Bytes) -> Result<(), IppParseError> {
        let ipp_value = IppValue::parse(tag, value)?;

        trace!("Value tag: {tag:0x}: {name}: {ipp_value}");

        if !name.is_empty() {
            // single attribute or begin of array
            self.add_last_attribute();
            self.last_name = Some(name);
        } else if self.last_name.is_none() {
            // a continuation value needs a preceding named value
            error!("Value without attribute name");
            return Err(IppParseError::InvalidTag(tag));
        }

        if tag == ValueTag::BegCollection as u8 {
            trace!("Begin collection");
            if !matches!(ipp_value, IppValue::Other { ref data, .. } if data.is_empty()) {
                error!("Invalid begin collection attribute");
                return Err(IppParseError::InvalidCollection);
            }
            self.context.push(vec![]);
        } else if tag == ValueTag::EndCollection as u8 {
            trace!("End collection");
            if !matches!(ipp_value, IppValue::Other { ref data, .. } if data.is_empty()) || self.context.len() < 2 {
                error!("Invalid end collection attribute");
                return Err(IppParseError::InvalidCollection);
            }
            if let Some(arr) = self.context.pop() {
                let mut map: BTreeMap<String, IppValue> = BTreeMap::new();
                for idx in (0..arr.len()).step_by(2) {
                    if let (Some(IppValue::MemberAttrName(k)), Some(v)) = (arr.get(idx), arr.get(idx + 1)) {
                        map.insert(k.to_string(), v.clone());
                    }
                }
                if let Some(val_list) = self.context.last_mut() {
                    val_list.push(IppValue::Collection(map));
                }
            }
        } else if let Some(val_list) = self.context.last_mut() {
            val_list.push(ipp_value);
        }
        Ok(())
    }
}

/// IPP message parser over a complete response body
pub struct IppParser {
    reader: IppReader,
    state: ParserState,
}

impl IppParser {
    /// Create IPP parser from anything convertible to IppReader
    pub fn new<T>(reader: T) -> IppParser
    where
        T: Into<IppReader>,
    {
        IppParser {
            reader: reader.into(),
            state: ParserState::new(),
        }
    }

    fn parse_value(&mut self, tag: u8) -> Result<(), IppParseError> {
        // value tag
        let name = self.reader.read_name()?;
        let value = self.reader.read_value()?;

        self.state.parse_value(tag, name, value)
    }

    /// Parse IPP message. The bytes after the end-of-attributes tag are returned untouched as payload.
    pub fn parse(mut self) -> Result<IppResponse, IppParseError> {
        let header = self.reader.read_header()?;
        trace!("IPP header: {header:?}");

        loop {
            match self.reader.read_tag()? {
                tag @ 0x01..=0x05 => {
                    if self.state.parse_delimiter(tag)? == DelimiterTag::EndOfAttributes {
                        break;
                    }
                }
                tag @ 0x10..=0x4a => {
                    if self.state.current_group.is_none() {
                        error!("Value outside of attribute group");
                        return Err(IppParseError::InvalidTag(tag));
                    }
                    self.parse_value(tag)?
                }
                tag => {
                    return Err(IppParseError::InvalidTag(tag));
                }
            }
        }

        Ok(IppResponse {
            header,
            attributes: self.state.attributes,
            payload: self.reader.into_remaining(),
        })
    }
}

/// Decode raw response bytes into an IPP message
pub fn decode_response(data: Bytes) -> Result<IppResponse, IppParseError> {
    IppParser::new(data).parse()
}
