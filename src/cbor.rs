//! # CBOR
//!
//! CBOR helper functions and types shared by the mdoc data model.

use std::io::Cursor;
use std::ops::Deref;

use ciborium::Value;
use serde::de::{self, DeserializeOwned};
use serde::{ser, Deserialize, Serialize};

use crate::{Error, Result};

/// Serialize a value to a CBOR byte vector.
///
/// # Errors
///
/// Returns an [`Error::Encoding`] error if the value cannot be serialized.
pub fn to_vec<T>(value: &T) -> Result<Vec<u8>>
where
    T: Serialize,
{
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| Error::Encoding(e.to_string()))?;
    Ok(buf)
}

/// Deserialize a value from a CBOR byte slice.
///
/// # Errors
///
/// Returns an [`Error::Encoding`] error if the bytes are not valid CBOR or
/// do not describe a `T`.
pub fn from_slice<T>(slice: &[u8]) -> Result<T>
where
    T: DeserializeOwned,
{
    ciborium::from_reader(Cursor::new(&slice)).map_err(|e| Error::Encoding(e.to_string()))
}

/// Wrap types that require tagging with tag 24 (`#6.24(bstr .cbor T)`).
///
/// The encoded bytes are kept alongside the decoded value. Digests are
/// computed over those bytes, so a value decoded from the wire hashes to
/// exactly what its issuer hashed, regardless of how it would re-encode.
#[derive(Clone, Debug, PartialEq)]
pub struct Tag24<T> {
    inner: T,
    bytes: Vec<u8>,
}

impl<T: Serialize> Tag24<T> {
    /// Encode `inner` and wrap it.
    ///
    /// # Errors
    ///
    /// Returns an [`Error::Encoding`] error if `inner` cannot be serialized.
    pub fn new(inner: T) -> Result<Self> {
        let bytes = to_vec(&inner)?;
        Ok(Self { inner, bytes })
    }
}

impl<T> Tag24<T> {
    /// The wrapped value.
    pub const fn inner(&self) -> &T {
        &self.inner
    }

    /// Unwrap, discarding the encoded bytes.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// The encoded form of the wrapped value (the content of the byte string).
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Serialize the tagged value: tag 24 followed by the byte string.
    ///
    /// # Errors
    ///
    /// Returns an [`Error::Encoding`] error if the value cannot be written.
    pub fn to_vec(&self) -> Result<Vec<u8>> {
        to_vec(&self.to_value())
    }

    fn to_value(&self) -> Value {
        Value::Tag(24, Box::new(Value::Bytes(self.bytes.clone())))
    }
}

impl<T> Deref for Tag24<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<T: DeserializeOwned> TryFrom<Value> for Tag24<T> {
    type Error = Error;

    fn try_from(v: Value) -> Result<Self> {
        match v {
            Value::Tag(24, value) => match *value {
                Value::Bytes(bytes) => {
                    let inner: T = from_slice(&bytes)?;
                    Ok(Self { inner, bytes })
                }
                other => Err(Error::Encoding(format!("invalid tag: {other:?}"))),
            },
            other => Err(Error::Encoding(format!("not a tag24: {other:?}"))),
        }
    }
}

impl<T> Serialize for Tag24<T> {
    fn serialize<S: ser::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(s)
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Tag24<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        value.try_into().map_err(de::Error::custom)
    }
}

/// `tdate` (`#6.0(tstr)`) serialization for `chrono` date-times.
pub mod tdate {
    use chrono::{DateTime, SecondsFormat, Utc};
    use ciborium::Value;
    use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize as an RFC 3339 string tagged with tag 0.
    ///
    /// # Errors
    ///
    /// Returns the serializer's error.
    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        to_value(dt).serialize(s)
    }

    /// Deserialize from a tag 0 string. Untagged strings are accepted.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not an RFC 3339 date-time.
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        from_value(Value::deserialize(d)?).map_err(de::Error::custom)
    }

    fn to_value(dt: &DateTime<Utc>) -> Value {
        Value::Tag(0, Box::new(Value::Text(dt.to_rfc3339_opts(SecondsFormat::Secs, true))))
    }

    fn from_value(value: Value) -> Result<DateTime<Utc>, String> {
        let text = match value {
            Value::Tag(0, inner) => match *inner {
                Value::Text(text) => text,
                other => return Err(format!("invalid tdate: {other:?}")),
            },
            Value::Text(text) => text,
            other => return Err(format!("invalid tdate: {other:?}")),
        };
        DateTime::parse_from_rfc3339(&text)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| format!("invalid tdate {text}: {e}"))
    }

    /// Optional `tdate`.
    pub mod option {
        use chrono::{DateTime, Utc};
        use ciborium::Value;
        use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

        /// Serialize `Some` as a `tdate`, `None` as `null`.
        ///
        /// # Errors
        ///
        /// Returns the serializer's error.
        pub fn serialize<S: Serializer>(
            dt: &Option<DateTime<Utc>>, s: S,
        ) -> Result<S::Ok, S::Error> {
            dt.as_ref().map_or(Value::Null, super::to_value).serialize(s)
        }

        /// Deserialize an optional `tdate`.
        ///
        /// # Errors
        ///
        /// Returns an error if a present value is not an RFC 3339 date-time.
        pub fn deserialize<'de, D: Deserializer<'de>>(
            d: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            match Value::deserialize(d)? {
                Value::Null => Ok(None),
                value => super::from_value(value).map(Some).map_err(de::Error::custom),
            }
        }
    }
}
