//! # Mobile Document (mdoc)
//!
//! See 8.3.2.1.2.2 Device retrieval mdoc response.
//!
//! An mdoc is a document type plus the data elements signed by the issuer
//! (`IssuerSigned`) and those signed by the mobile device (`DeviceSigned`).
//! The issuer authenticates its data elements by signing a Mobile Security
//! Object (MSO) holding a digest of each element. Verification recomputes
//! those digests and checks the issuer's signature over the MSO.

use std::collections::{BTreeMap, BTreeSet};

use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::{DateTime, Utc};
use ciborium::Value;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::cbor::{self, Tag24};
use crate::issuer_auth::IssuerAuth;
use crate::mso::{DigestId, MobileSecurityObject, NameSpace};
use crate::provider::Verifier;
use crate::{Error, Result};

/// A mobile document: the document type, issuer-signed data elements, and
/// device-signed data elements.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MDoc {
    /// Document type. For example, "`org.iso.18013.5.1.mDL`"
    pub doc_type: String,

    /// Returned data elements signed by the issuer
    pub issuer_signed: IssuerSigned,

    /// Returned data elements signed by the mdoc
    pub device_signed: DeviceSigned,
}

impl MDoc {
    /// The Mobile Security Object carried by `IssuerAuth`, or `None` if the
    /// `COSE_Sign1` payload is `nil`.
    ///
    /// # Errors
    ///
    /// Returns an [`Error::InvalidIssuerAuth`] error if the `COSE_Sign1` is
    /// malformed.
    pub fn mso(&self) -> Result<Option<MobileSecurityObject>> {
        self.issuer_signed.issuer_auth.mso()
    }

    /// Names of the issuer-signed name spaces in this document.
    #[must_use]
    pub fn name_spaces(&self) -> BTreeSet<&str> {
        self.issuer_signed
            .name_spaces
            .as_ref()
            .map(|ns| ns.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// The issuer-signed data elements for `name_space`, in document order.
    /// Empty if the name space is not present.
    #[must_use]
    pub fn issuer_signed_items(&self, name_space: &str) -> Vec<&IssuerSignedItem> {
        self.issuer_signed
            .name_spaces
            .as_ref()
            .and_then(|ns| ns.get(name_space))
            .map(|items| items.iter().map(Tag24::inner).collect())
            .unwrap_or_default()
    }

    /// Verify every issuer-signed data element against the digests in the MSO.
    ///
    /// Returns `Ok(false)` if any element is missing from the MSO or does not
    /// match its digest. A document without name spaces verifies.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingMso`] when no MSO is embedded, and an
    /// [`Error::InvalidIssuerAuth`] error if the `COSE_Sign1` is malformed.
    #[instrument(level = "debug", skip_all, fields(doc_type = %self.doc_type))]
    pub fn verify_issuer_signed_items(&self) -> Result<bool> {
        let mso = self.mso()?.ok_or(Error::MissingMso)?;

        let Some(name_spaces) = &self.issuer_signed.name_spaces else {
            return Ok(true);
        };
        for (name_space, items) in name_spaces {
            if !mso.verify_signed_items(name_space, items)? {
                tracing::debug!(name_space = name_space.as_str(), "claim verification failed");
                return Ok(false);
            }
        }

        Ok(true)
    }

    /// Verify the document: every issuer-signed data element must match its
    /// digest in the MSO, and the issuer's signature over the MSO must be
    /// valid for the key selected by `key_id`.
    ///
    /// Data elements are checked first. The verifier is not called when they
    /// fail to verify. An envelope that carries an MSO but is not a complete
    /// `COSE_Sign1` (for example, one without a signature) cannot be
    /// verified and returns `Ok(false)`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingMso`] when no MSO is embedded, an
    /// [`Error::InvalidIssuerAuth`] error if the envelope has fewer than 3
    /// elements or an invalid payload, and an [`Error::Provider`] error if the
    /// verifier fails.
    #[instrument(level = "debug", skip(self, verifier), fields(doc_type = %self.doc_type))]
    pub fn verify(&self, verifier: &impl Verifier, key_id: Option<&str>) -> Result<bool> {
        if !self.verify_issuer_signed_items()? {
            return Ok(false);
        }

        let sign1 = match self.issuer_signed.issuer_auth.to_cose_sign1() {
            Ok(sign1) => sign1,
            Err(e) => {
                tracing::debug!(error = %e, "issuer signature cannot be checked");
                return Ok(false);
            }
        };
        let valid = verifier.verify_sign1(&sign1, key_id).map_err(Error::Provider)?;
        if !valid {
            tracing::debug!("issuer signature is invalid");
        }
        Ok(valid)
    }

    /// Check the MSO was issued for this document's type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingMso`] when no MSO is embedded.
    pub fn verify_doc_type(&self) -> Result<bool> {
        let mso = self.mso()?.ok_or(Error::MissingMso)?;
        Ok(mso.doc_type == self.doc_type)
    }

    /// Check `at` falls within the MSO's validity window.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingMso`] when no MSO is embedded.
    pub fn verify_validity(&self, at: DateTime<Utc>) -> Result<bool> {
        let mso = self.mso()?.ok_or(Error::MissingMso)?;
        Ok(mso.validity_info.is_valid_at(at))
    }

    /// Serialize to CBOR.
    ///
    /// # Errors
    ///
    /// Returns an [`Error::Encoding`] error if the document cannot be encoded.
    pub fn to_vec(&self) -> Result<Vec<u8>> {
        cbor::to_vec(self)
    }

    /// Deserialize from CBOR.
    ///
    /// # Errors
    ///
    /// Returns an [`Error::Encoding`] error if the bytes are not an mdoc.
    pub fn from_slice(slice: &[u8]) -> Result<Self> {
        cbor::from_slice(slice)
    }

    /// Serialize to base64url-encoded CBOR.
    ///
    /// # Errors
    ///
    /// Returns an [`Error::Encoding`] error if the document cannot be encoded.
    pub fn to_base64url(&self) -> Result<String> {
        Ok(Base64UrlUnpadded::encode_string(&self.to_vec()?))
    }

    /// Deserialize from base64url-encoded CBOR.
    ///
    /// # Errors
    ///
    /// Returns an [`Error::Encoding`] error if the string is not a
    /// base64url-encoded mdoc.
    pub fn from_base64url(encoded: &str) -> Result<Self> {
        Self::from_slice(&Base64UrlUnpadded::decode_vec(encoded)?)
    }
}

/// Issuer-signed data elements for each name space (`IssuerNameSpaces`).
pub type IssuerNameSpaces = BTreeMap<NameSpace, Vec<IssuerSignedItemBytes>>;

/// Data elements signed by the issuer
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IssuerSigned {
    /// Returned data elements for each namespace (`IssuerNameSpaces` element)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_spaces: Option<IssuerNameSpaces>,

    /// The mobile security object (MSO) for issuer data authentication.
    /// `COSE_Sign1` with a payload of `MobileSecurityObjectBytes`
    pub issuer_auth: IssuerAuth,
}

/// `IssuerSignedItemBytes` represents the tagged `IssuerSignedItem` after
/// CBOR serialization:  `#6.24(bstr .cbor IssuerSignedItem)`
pub type IssuerSignedItemBytes = Tag24<IssuerSignedItem>;

/// Issuer-signed data element
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IssuerSignedItem {
    /// Id of the digest as added to the MSO `value_digests` parameter.
    #[serde(rename = "digestID")]
    pub digest_id: DigestId,

    /// Random value for issuer data authentication (min. 16 bytes).
    #[serde(with = "serde_bytes")]
    pub random: Vec<u8>,

    /// Data element identifier. For example, "`family_name`"
    pub element_identifier: String,

    /// Data element value. For example, "`Smith`"
    pub element_value: Value,
}

/// Data elements signed by the mobile device. Carried as-is: this crate does
/// not interpret or verify device authentication.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSigned {
    /// `DeviceNameSpacesBytes`
    pub name_spaces: Value,

    /// Device authentication
    pub device_auth: DeviceAuth,
}

impl Default for DeviceSigned {
    fn default() -> Self {
        // #6.24(bstr .cbor {})
        Self {
            name_spaces: Value::Tag(24, Box::new(Value::Bytes(vec![0xa0]))),
            device_auth: DeviceAuth::default(),
        }
    }
}

/// Device authentication: either a `COSE_Sign1` or a `COSE_Mac0`.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeviceAuth {
    /// `COSE_Sign1` device signature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_signature: Option<Value>,

    /// `COSE_Mac0` device MAC
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_mac: Option<Value>,
}

#[cfg(test)]
mod tests {
    use assert_let_bind::assert_let;

    use super::*;

    fn mdoc(name_spaces: Option<IssuerNameSpaces>, payload: Value) -> MDoc {
        MDoc {
            doc_type: "org.iso.18013.5.1.mDL".into(),
            issuer_signed: IssuerSigned {
                name_spaces,
                issuer_auth: IssuerAuth::new(vec![
                    Value::Bytes(vec![0xa0]),
                    Value::Map(vec![]),
                    payload,
                    Value::Bytes(vec![]),
                ]),
            },
            device_signed: DeviceSigned::default(),
        }
    }

    fn item(digest_id: DigestId, identifier: &str) -> IssuerSignedItemBytes {
        Tag24::new(IssuerSignedItem {
            digest_id,
            random: vec![0; 16],
            element_identifier: identifier.into(),
            element_value: Value::Bool(true),
        })
        .unwrap()
    }

    #[test]
    fn no_name_spaces() {
        let mdoc = mdoc(None, Value::Null);
        assert!(mdoc.name_spaces().is_empty());
        assert!(mdoc.issuer_signed_items("org.iso.18013.5.1").is_empty());
    }

    #[test]
    fn items_in_order() {
        let name_spaces = BTreeMap::from([(
            "org.iso.18013.5.1".to_string(),
            vec![item(1, "age_over_18"), item(0, "age_over_21")],
        )]);
        let mdoc = mdoc(Some(name_spaces), Value::Null);

        assert_eq!(mdoc.name_spaces(), BTreeSet::from(["org.iso.18013.5.1"]));
        let items = mdoc.issuer_signed_items("org.iso.18013.5.1");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].element_identifier, "age_over_18");
        assert_eq!(items[1].digest_id, 0);
        assert!(mdoc.issuer_signed_items("org.iso.18013.5.1.aamva").is_empty());
    }

    #[test]
    fn missing_mso() {
        let mdoc = mdoc(None, Value::Null);
        assert_let!(Err(Error::MissingMso), mdoc.verify_issuer_signed_items());
        assert_let!(Err(Error::MissingMso), mdoc.verify_doc_type());
        assert_let!(Err(Error::MissingMso), mdoc.verify_validity(Utc::now()));
    }

    #[test]
    fn malformed_issuer_auth() {
        let mdoc = mdoc(None, Value::Text("payload".into()));
        assert_let!(Err(Error::InvalidIssuerAuth(_)), mdoc.verify_issuer_signed_items());
    }

    #[test]
    fn item_field_names() {
        let bytes = item(3, "age_over_18").bytes().to_vec();
        let value: Value = cbor::from_slice(&bytes).unwrap();
        assert_let!(Value::Map(fields), value);

        let keys: Vec<_> = fields.iter().filter_map(|(k, _)| k.as_text()).collect();
        assert_eq!(keys, ["digestID", "random", "elementIdentifier", "elementValue"]);
        assert_eq!(fields[1].1, Value::Bytes(vec![0; 16]));
    }

    #[test]
    fn cbor_roundtrip() {
        let name_spaces =
            BTreeMap::from([("org.iso.18013.5.1".to_string(), vec![item(0, "age_over_18")])]);
        let mdoc = mdoc(Some(name_spaces), Value::Null);

        let encoded = mdoc.to_base64url().unwrap();
        let decoded = MDoc::from_base64url(&encoded).unwrap();
        assert_eq!(decoded, mdoc);
    }
}
