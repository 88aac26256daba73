//! # Issuer Auth
//!
//! `IssuerAuth` is the issuer's `COSE_Sign1` over the Mobile Security Object
//! (`MobileSecurityObjectBytes` as payload).
//!
//! The envelope is held as the raw `COSE_Sign1` array rather than a parsed
//! [`CoseSign1`] so that a malformed envelope survives decoding and is
//! rejected here, when the MSO is extracted:
//!
//! ```cddl
//! COSE_Sign1 = [
//!     protected : bstr .cbor header_map,
//!     unprotected : header_map,
//!     payload : bstr / nil,
//!     signature : bstr
//! ]
//! ```

use ciborium::Value;
use coset::{AsCborValue, CoseSign1, CoseSign1Builder, HeaderBuilder, TaggedCborSerializable};
use serde::{de, ser, Deserialize, Serialize};

use crate::mso::MobileSecurityObject;
use crate::provider::Algorithm;
use crate::{Error, Result};

/// Index of the payload in the `COSE_Sign1` array.
const PAYLOAD: usize = 2;

/// Signed payload of `MobileSecurityObjectBytes`.
#[derive(Clone, Debug, PartialEq)]
pub struct IssuerAuth {
    tagged: bool,
    elements: Vec<Value>,
}

/// The payload slot of a `COSE_Sign1`.
enum Payload<'a> {
    /// `nil`: no MSO is carried in the envelope.
    Detached,

    /// A byte string holding the encoded MSO.
    Embedded(&'a [u8]),

    /// Anything else.
    Invalid(&'a Value),
}

impl<'a> From<&'a Value> for Payload<'a> {
    fn from(value: &'a Value) -> Self {
        match value {
            Value::Null => Self::Detached,
            Value::Bytes(bytes) => Self::Embedded(bytes),
            other => Self::Invalid(other),
        }
    }
}

impl IssuerAuth {
    /// Wrap a raw, untagged `COSE_Sign1` array.
    #[must_use]
    pub const fn new(elements: Vec<Value>) -> Self {
        Self {
            tagged: false,
            elements,
        }
    }

    /// The raw `COSE_Sign1` elements.
    #[must_use]
    pub fn elements(&self) -> &[Value] {
        &self.elements
    }

    /// Whether the envelope is wrapped in the `COSE_Sign1` tag (18).
    #[must_use]
    pub const fn is_tagged(&self) -> bool {
        self.tagged
    }

    /// Extract the Mobile Security Object from the envelope's payload.
    ///
    /// Returns `Ok(None)` when the payload is `nil`.
    ///
    /// # Errors
    ///
    /// Returns an [`Error::InvalidIssuerAuth`] error if the envelope has fewer
    /// than 3 elements or the payload is neither `nil` nor a byte string, and
    /// an [`Error::Encoding`] error if the byte string is not an encoded MSO.
    pub fn mso(&self) -> Result<Option<MobileSecurityObject>> {
        let Some(payload) = self.elements.get(PAYLOAD) else {
            return Err(Error::InvalidIssuerAuth(format!(
                "expected at least 3 elements, found {}",
                self.elements.len()
            )));
        };

        match Payload::from(payload) {
            Payload::Detached => Ok(None),
            Payload::Embedded(bytes) => MobileSecurityObject::from_payload(bytes).map(Some),
            Payload::Invalid(value) => {
                Err(Error::InvalidIssuerAuth(format!("invalid payload: {value:?}")))
            }
        }
    }

    /// Parse the envelope as a [`CoseSign1`].
    ///
    /// # Errors
    ///
    /// Returns an [`Error::InvalidIssuerAuth`] error if the elements do not
    /// form a valid `COSE_Sign1`.
    pub fn to_cose_sign1(&self) -> Result<CoseSign1> {
        CoseSign1::from_cbor_value(Value::Array(self.elements.clone()))
            .map_err(|e| Error::InvalidIssuerAuth(e.to_string()))
    }

    /// An unsigned `COSE_Sign1` carrying `payload`, with the algorithm in the
    /// protected header and the key id in the unprotected header. The
    /// signature is added once computed over [`CoseSign1::tbs_data`].
    pub(crate) fn unsigned(payload: Vec<u8>, algorithm: Algorithm, key_id: &str) -> CoseSign1 {
        let protected = HeaderBuilder::new().algorithm(algorithm.into()).build();
        let unprotected = HeaderBuilder::new().key_id(key_id.as_bytes().to_vec()).build();
        CoseSign1Builder::new()
            .protected(protected)
            .unprotected(unprotected)
            .payload(payload)
            .build()
    }
}

impl TryFrom<CoseSign1> for IssuerAuth {
    type Error = Error;

    fn try_from(sign1: CoseSign1) -> Result<Self> {
        match sign1.to_cbor_value()? {
            Value::Array(elements) => Ok(Self::new(elements)),
            other => Err(Error::Encoding(format!("COSE_Sign1 is not an array: {other:?}"))),
        }
    }
}

impl TryFrom<Value> for IssuerAuth {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Array(elements) => Ok(Self::new(elements)),
            Value::Tag(tag, inner) if tag == CoseSign1::TAG => match *inner {
                Value::Array(elements) => Ok(Self {
                    tagged: true,
                    elements,
                }),
                other => Err(Error::Encoding(format!("COSE_Sign1 is not an array: {other:?}"))),
            },
            other => Err(Error::Encoding(format!("COSE_Sign1 is not an array: {other:?}"))),
        }
    }
}

impl Serialize for IssuerAuth {
    fn serialize<S: ser::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        let array = Value::Array(self.elements.clone());
        if self.tagged {
            Value::Tag(CoseSign1::TAG, Box::new(array)).serialize(s)
        } else {
            array.serialize(s)
        }
    }
}

impl<'de> Deserialize<'de> for IssuerAuth {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        value.try_into().map_err(de::Error::custom)
    }
}
