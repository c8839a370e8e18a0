//!
//! Decoded IPP attribute values
//!
use std::{collections::BTreeMap, fmt};

use bytes::{Buf, Bytes};
use enum_as_inner::EnumAsInner;
use num_traits::FromPrimitive;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{model::ValueTag, parser::IppParseError};

/// IPP attribute values as defined in [RFC 8010](https://tools.ietf.org/html/rfc8010)
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq, EnumAsInner)]
pub enum IppValue {
    Integer(i32),
    Enum(i32),
    OctetString(String),
    TextWithoutLanguage(String),
    NameWithoutLanguage(String),
    TextWithLanguage {
        language: String,
        text: String,
    },
    NameWithLanguage {
        language: String,
        name: String,
    },
    Charset(String),
    NaturalLanguage(String),
    Uri(String),
    UriScheme(String),
    RangeOfInteger {
        min: i32,
        max: i32,
    },
    Boolean(bool),
    Keyword(String),
    Array(Vec<IppValue>),
    Collection(BTreeMap<String, IppValue>),
    MimeMediaType(String),
    DateTime {
        year: u16,
        month: u8,
        day: u8,
        hour: u8,
        minutes: u8,
        seconds: u8,
        deci_seconds: u8,
        utc_dir: char,
        utc_hours: u8,
        utc_mins: u8,
    },
    MemberAttrName(String),
    Resolution {
        cross_feed: i32,
        feed: i32,
        units: i8,
    },
    NoValue,
    Other {
        tag: u8,
        data: Bytes,
    },
}

fn lossy(data: &Bytes) -> String {
    String::from_utf8_lossy(data).into_owned()
}

// fixed-size values must carry exactly the expected number of bytes
fn expect_len(tag: u8, data: &Bytes, len: usize) -> Result<(), IppParseError> {
    if data.len() == len {
        Ok(())
    } else {
        Err(IppParseError::InvalidValueLength { tag, len: data.len() })
    }
}

// [len:2][language][len:2][text]
fn parse_with_language(tag: u8, mut data: Bytes) -> Result<(String, String), IppParseError> {
    let take = |data: &mut Bytes| -> Result<String, IppParseError> {
        if data.remaining() < 2 {
            return Err(IppParseError::InvalidValueLength { tag, len: data.len() });
        }
        let len = data.get_u16() as usize;
        if data.remaining() < len {
            return Err(IppParseError::InvalidValueLength { tag, len: data.len() });
        }
        Ok(lossy(&data.split_to(len)))
    };
    let language = take(&mut data)?;
    let text = take(&mut data)?;
    Ok((language, text))
}

impl IppValue {
    /// Return the value tag this value was encoded with
    pub fn to_tag(&self) -> u8 {
        match *self {
            IppValue::Integer(_) => ValueTag::Integer as u8,
            IppValue::Enum(_) => ValueTag::Enum as u8,
            IppValue::RangeOfInteger { .. } => ValueTag::RangeOfInteger as u8,
            IppValue::Boolean(_) => ValueTag::Boolean as u8,
            IppValue::Keyword(_) => ValueTag::Keyword as u8,
            IppValue::OctetString(_) => ValueTag::OctetStringUnspecified as u8,
            IppValue::TextWithoutLanguage(_) => ValueTag::TextWithoutLanguage as u8,
            IppValue::NameWithoutLanguage(_) => ValueTag::NameWithoutLanguage as u8,
            IppValue::TextWithLanguage { .. } => ValueTag::TextWithLanguage as u8,
            IppValue::NameWithLanguage { .. } => ValueTag::NameWithLanguage as u8,
            IppValue::Charset(_) => ValueTag::Charset as u8,
            IppValue::NaturalLanguage(_) => ValueTag::NaturalLanguage as u8,
            IppValue::Uri(_) => ValueTag::Uri as u8,
            IppValue::UriScheme(_) => ValueTag::UriScheme as u8,
            IppValue::MimeMediaType(_) => ValueTag::MimeMediaType as u8,
            IppValue::Array(ref array) => array.first().map(|v| v.to_tag()).unwrap_or(ValueTag::Unknown as u8),
            IppValue::Collection(_) => ValueTag::BegCollection as u8,
            IppValue::DateTime { .. } => ValueTag::DateTime as u8,
            IppValue::MemberAttrName(_) => ValueTag::MemberAttrName as u8,
            IppValue::Resolution { .. } => ValueTag::Resolution as u8,
            IppValue::Other { tag, .. } => tag,
            IppValue::NoValue => ValueTag::NoValue as u8,
        }
    }

    /// Parse value from byte array which does not include the value length field.
    ///
    /// Fixed-size values are checked against their wire size, so a truncated
    /// or oversized value is reported instead of read past.
    pub fn parse(value_tag: u8, mut data: Bytes) -> Result<IppValue, IppParseError> {
        let ipp_tag = match ValueTag::from_u8(value_tag) {
            Some(x) => x,
            None => {
                return Ok(IppValue::Other { tag: value_tag, data });
            }
        };

        let value = match ipp_tag {
            ValueTag::Integer => {
                expect_len(value_tag, &data, 4)?;
                IppValue::Integer(data.get_i32())
            }
            ValueTag::Enum => {
                expect_len(value_tag, &data, 4)?;
                IppValue::Enum(data.get_i32())
            }
            ValueTag::Boolean => {
                expect_len(value_tag, &data, 1)?;
                IppValue::Boolean(data.get_u8() != 0)
            }
            ValueTag::RangeOfInteger => {
                expect_len(value_tag, &data, 8)?;
                IppValue::RangeOfInteger {
                    min: data.get_i32(),
                    max: data.get_i32(),
                }
            }
            ValueTag::Resolution => {
                expect_len(value_tag, &data, 9)?;
                IppValue::Resolution {
                    cross_feed: data.get_i32(),
                    feed: data.get_i32(),
                    units: data.get_i8(),
                }
            }
            ValueTag::DateTime => {
                expect_len(value_tag, &data, 11)?;
                IppValue::DateTime {
                    year: data.get_u16(),
                    month: data.get_u8(),
                    day: data.get_u8(),
                    hour: data.get_u8(),
                    minutes: data.get_u8(),
                    seconds: data.get_u8(),
                    deci_seconds: data.get_u8(),
                    utc_dir: data.get_u8() as char,
                    utc_hours: data.get_u8(),
                    utc_mins: data.get_u8(),
                }
            }
            ValueTag::TextWithLanguage => {
                let (language, text) = parse_with_language(value_tag, data)?;
                IppValue::TextWithLanguage { language, text }
            }
            ValueTag::NameWithLanguage => {
                let (language, name) = parse_with_language(value_tag, data)?;
                IppValue::NameWithLanguage { language, name }
            }
            ValueTag::OctetStringUnspecified => IppValue::OctetString(lossy(&data)),
            ValueTag::TextWithoutLanguage => IppValue::TextWithoutLanguage(lossy(&data)),
            ValueTag::NameWithoutLanguage => IppValue::NameWithoutLanguage(lossy(&data)),
            ValueTag::Charset => IppValue::Charset(lossy(&data)),
            ValueTag::NaturalLanguage => IppValue::NaturalLanguage(lossy(&data)),
            ValueTag::Uri => IppValue::Uri(lossy(&data)),
            ValueTag::UriScheme => IppValue::UriScheme(lossy(&data)),
            ValueTag::Keyword => IppValue::Keyword(lossy(&data)),
            ValueTag::MimeMediaType => IppValue::MimeMediaType(lossy(&data)),
            ValueTag::MemberAttrName => IppValue::MemberAttrName(lossy(&data)),
            ValueTag::NoValue => IppValue::NoValue,
            _ => IppValue::Other { tag: value_tag, data },
        };
        Ok(value)
    }
}

impl fmt::Display for IppValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            IppValue::Integer(i) | IppValue::Enum(i) => write!(f, "{i}"),
            IppValue::RangeOfInteger { min, max } => write!(f, "{min}..{max}"),
            IppValue::Boolean(b) => write!(f, "{}", if b { "true" } else { "false" }),
            IppValue::Keyword(ref s)
            | IppValue::OctetString(ref s)
            | IppValue::TextWithoutLanguage(ref s)
            | IppValue::NameWithoutLanguage(ref s)
            | IppValue::Charset(ref s)
            | IppValue::NaturalLanguage(ref s)
            | IppValue::Uri(ref s)
            | IppValue::UriScheme(ref s)
            | IppValue::MimeMediaType(ref s)
            | IppValue::MemberAttrName(ref s) => write!(f, "{s}"),
            IppValue::TextWithLanguage {
                ref language,
                ref text,
            } => write!(f, "{language}:{text}"),
            IppValue::NameWithLanguage {
                ref language,
                ref name,
            } => write!(f, "{language}:{name}"),
            IppValue::Array(ref array) => {
                let s: Vec<String> = array.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", s.join(", "))
            }
            IppValue::Collection(ref coll) => {
                let s: Vec<String> = coll.iter().map(|(k, v)| format!("{k}={v}")).collect();
                write!(f, "<{}>", s.join(", "))
            }
            IppValue::DateTime {
                year,
                month,
                day,
                hour,
                minutes,
                seconds,
                deci_seconds,
                utc_dir,
                utc_hours,
                utc_mins,
            } => write!(
                f,
                "{year}-{month}-{day},{hour}:{minutes}:{seconds}.{deci_seconds},{utc_dir}{utc_hours}:{utc_mins}utc"
            ),
            IppValue::Resolution {
                cross_feed,
                feed,
                units,
            } => {
                write!(f, "{}x{}{}", cross_feed, feed, if units == 3 { "in" } else { "cm" })
            }
            IppValue::NoValue => Ok(()),
            IppValue::Other { tag, ref data } => write!(f, "{tag:0x}: {data:?}"),
        }
    }
}

impl<'a> IntoIterator for &'a IppValue {
    type Item = &'a IppValue;
    type IntoIter = std::slice::Iter<'a, IppValue>;

    /// Iterate over array elements, or over the value itself if it is not an array
    fn into_iter(self) -> Self::IntoIter {
        match self {
            IppValue::Array(array) => array.iter(),
            other => std::slice::from_ref(other).iter(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value_check(tag: ValueTag, data: &'static [u8], expected: IppValue) {
        let value = IppValue::parse(tag as u8, Bytes::from_static(data)).unwrap();
        assert_eq!(value, expected);
        assert_eq!(value.to_tag(), tag as u8);
    }

    #[test]
    fn test_parse_fixed_size_values() {
        value_check(ValueTag::Integer, &[0x12, 0x34, 0x56, 0x78], IppValue::Integer(0x1234_5678));
        value_check(ValueTag::Enum, &[0, 0, 0, 3], IppValue::Enum(3));
        value_check(ValueTag::Boolean, &[1], IppValue::Boolean(true));
        value_check(
            ValueTag::RangeOfInteger,
            &[0, 0, 0, 1, 0, 0, 0, 99],
            IppValue::RangeOfInteger { min: 1, max: 99 },
        );
        value_check(
            ValueTag::Resolution,
            &[0, 0, 1, 44, 0, 0, 2, 88, 3],
            IppValue::Resolution {
                cross_feed: 300,
                feed: 600,
                units: 3,
            },
        );
    }

    #[test]
    fn test_parse_strings() {
        value_check(ValueTag::Keyword, b"none", IppValue::Keyword("none".to_owned()));
        value_check(ValueTag::Uri, b"http://host/", IppValue::Uri("http://host/".to_owned()));
        value_check(
            ValueTag::TextWithLanguage,
            &[0, 2, b'e', b'n', 0, 2, b'h', b'i'],
            IppValue::TextWithLanguage {
                language: "en".to_owned(),
                text: "hi".to_owned(),
            },
        );
    }

    #[test]
    fn test_parse_truncated_integer() {
        let result = IppValue::parse(ValueTag::Integer as u8, Bytes::from_static(&[0, 1]));
        assert!(matches!(
            result,
            Err(IppParseError::InvalidValueLength { tag: 0x21, len: 2 })
        ));
    }

    #[test]
    fn test_parse_unknown_tag() {
        let value = IppValue::parse(0x7f, Bytes::from_static(b"raw")).unwrap();
        assert_eq!(
            value,
            IppValue::Other {
                tag: 0x7f,
                data: Bytes::from_static(b"raw")
            }
        );
    }

    #[test]
    fn test_value_iterator() {
        let array = IppValue::Array(vec![IppValue::Integer(1), IppValue::Integer(2)]);
        assert_eq!(array.into_iter().count(), 2);
        let single = IppValue::Keyword("idle".to_owned());
        assert_eq!(single.into_iter().collect::<Vec<_>>(), vec![&single]);
    }
}
