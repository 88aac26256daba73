//! # Mobile Security Object (MSO)
//!
//! The MSO is used to provide Issuer data authentication for the associated
//! `mdoc`. It contains a digest (e.g. SHA-256) of every issuer-signed data
//! element, together with the document type, the validity window, and the
//! holder's device key. The MSO itself is the payload of the `IssuerAuth`
//! `COSE_Sign1`.
//!
//! See 9.1.2.4 Signing method and structure for MSO.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use ciborium::Value;
use serde::{Deserialize, Serialize};
use serde_bytes::ByteBuf;
use sha2::{Digest as _, Sha256, Sha384, Sha512};

use crate::cbor::{self, tdate, Tag24};
use crate::cose_key::CoseKey;
use crate::mdoc::{IssuerNameSpaces, IssuerSignedItemBytes};
use crate::{Error, Result};

/// Name space of a group of data elements.
pub type NameSpace = String;

/// Digests of all data elements, per name space.
pub type ValueDigests = BTreeMap<NameSpace, DigestIds>;

/// Data element digests keyed by digest ID.
pub type DigestIds = BTreeMap<DigestId, Digest>;

/// `DigestID` is an unsigned integer used to match the hashes in the MSO to
/// the data elements in the mdoc response.
///
/// The Digest ID must be unique within a namespace with no correlation between
/// ID’s for the same namespace/element in different MSO’s.
pub type DigestId = u64;

/// Digest of an `IssuerSignedItemBytes`.
pub type Digest = ByteBuf;

/// An mdoc digital signature is generated over the mobile security object (MSO).
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MobileSecurityObject {
    /// Version of the `MobileSecurityObject`. Must be 1.0.
    pub version: Version,

    /// Message digest algorithm used.
    pub digest_algorithm: DigestAlgorithm,

    /// An ordered set of value digests for each data element in each name space.
    pub value_digests: ValueDigests,

    /// Device key information
    pub device_key_info: DeviceKeyInfo,

    /// The document type of the document being signed.
    pub doc_type: String,

    /// Validity information for the MSO
    pub validity_info: ValidityInfo,
}

impl MobileSecurityObject {
    /// Create an MSO covering every data element in `name_spaces`.
    ///
    /// Each element is digested over its own `IssuerSignedItemBytes`
    /// encoding and recorded under its name space and digest ID.
    ///
    /// # Errors
    ///
    /// Returns an [`Error::Encoding`] error if an item cannot be encoded or
    /// two items in a name space share a digest ID.
    pub fn create_for(
        name_spaces: &IssuerNameSpaces, device_key_info: DeviceKeyInfo,
        doc_type: impl Into<String>, validity_info: ValidityInfo,
        digest_algorithm: DigestAlgorithm,
    ) -> Result<Self> {
        let mut value_digests = ValueDigests::new();

        for (name_space, items) in name_spaces {
            let digests = value_digests.entry(name_space.clone()).or_default();
            for item in items {
                let digest = digest_algorithm.digest(&item.to_vec()?);
                if digests.insert(item.digest_id, ByteBuf::from(digest)).is_some() {
                    return Err(Error::Encoding(format!(
                        "duplicate digest ID {} in name space {name_space}",
                        item.digest_id
                    )));
                }
            }
        }

        Ok(Self {
            version: Version::V1_0,
            digest_algorithm,
            value_digests,
            device_key_info,
            doc_type: doc_type.into(),
            validity_info,
        })
    }

    /// Verify `items` against the digests recorded for `name_space`.
    ///
    /// Returns `Ok(true)` only when every item has a digest recorded under
    /// this name space and its digest ID, and the recorded digest matches the
    /// item's encoding. An empty list of items always verifies.
    ///
    /// # Errors
    ///
    /// Returns an [`crate::Error::Encoding`] error if an item cannot be
    /// encoded.
    pub fn verify_signed_items(
        &self, name_space: &str, items: &[IssuerSignedItemBytes],
    ) -> Result<bool> {
        let digests = self.value_digests.get(name_space);

        for item in items {
            let Some(expected) = digests.and_then(|d| d.get(&item.digest_id)) else {
                tracing::debug!(name_space, digest_id = item.digest_id, "no digest for item");
                return Ok(false);
            };
            let actual = self.digest_algorithm.digest(&item.to_vec()?);
            if actual != expected.as_slice() {
                tracing::debug!(name_space, digest_id = item.digest_id, "digest mismatch");
                return Ok(false);
            }
        }

        Ok(true)
    }

    /// Encode as `MobileSecurityObjectBytes` (`#6.24(bstr .cbor MobileSecurityObject)`),
    /// the form carried in the `IssuerAuth` payload.
    ///
    /// # Errors
    ///
    /// Returns an [`crate::Error::Encoding`] error if the MSO cannot be
    /// encoded.
    pub fn to_payload(&self) -> Result<Vec<u8>> {
        Tag24::new(self)?.to_vec()
    }

    /// Decode an `IssuerAuth` payload. Both tagged (`MobileSecurityObjectBytes`)
    /// and untagged MSO encodings are accepted.
    ///
    /// # Errors
    ///
    /// Returns an [`crate::Error::Encoding`] error if the payload is not an
    /// encoded MSO.
    pub fn from_payload(payload: &[u8]) -> Result<Self> {
        let value: Value = cbor::from_slice(payload)?;
        if matches!(value, Value::Tag(24, _)) {
            return Ok(Tag24::<Self>::try_from(value)?.into_inner());
        }
        Ok(value.deserialized()?)
    }
}

/// Version of the MSO structure.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub enum Version {
    /// Version 1.0
    #[default]
    #[serde(rename = "1.0")]
    V1_0,
}

/// Digest algorithm used by the MSO.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub enum DigestAlgorithm {
    /// SHA-256
    #[default]
    #[serde(rename = "SHA-256")]
    Sha256,

    /// SHA-384
    #[serde(rename = "SHA-384")]
    Sha384,

    /// SHA-512
    #[serde(rename = "SHA-512")]
    Sha512,
}

impl DigestAlgorithm {
    /// Hash `data` using this algorithm.
    #[must_use]
    pub fn digest(self, data: &[u8]) -> Vec<u8> {
        match self {
            Self::Sha256 => Sha256::digest(data).to_vec(),
            Self::Sha384 => Sha384::digest(data).to_vec(),
            Self::Sha512 => Sha512::digest(data).to_vec(),
        }
    }
}

/// Used to hold the mdoc authentication public key and information related to
/// this key. Encoded as an untagged `COSE_Key` element as specified in
/// [RFC 9052] and [RFC 9053].
///
/// [RFC 9052]: https://www.rfc-editor.org/rfc/rfc9052.html
/// [RFC 9053]: https://www.rfc-editor.org/rfc/rfc9053.html
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeviceKeyInfo {
    /// Device key
    pub device_key: CoseKey,

    /// Key authorizations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_authorizations: Option<KeyAuthorization>,

    /// Key info
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_info: Option<BTreeMap<i64, Value>>,
}

impl From<CoseKey> for DeviceKeyInfo {
    fn from(device_key: CoseKey) -> Self {
        Self {
            device_key,
            key_authorizations: None,
            key_info: None,
        }
    }
}

/// Name spaces and data elements the device key is authorized to sign.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct KeyAuthorization {
    /// Authorized name spaces
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_spaces: Option<Vec<NameSpace>>,

    /// Map of data elements by name space.
    /// e.g. <namespace: [data elements]>
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_elements: Option<BTreeMap<NameSpace, Vec<String>>>,
}

/// Contains information related to the validity of the MSO and its signature.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ValidityInfo {
    /// Time the MSO was signed
    #[serde(with = "tdate")]
    pub signed: DateTime<Utc>,

    /// The timestamp before which the MSO is not yet valid. Should be equal
    /// or later than the `signed` element
    #[serde(with = "tdate")]
    pub valid_from: DateTime<Utc>,

    /// The timestamp after which the MSO is no longer valid.
    ///
    /// The value must be later than the `valid_from` element.
    #[serde(with = "tdate")]
    pub valid_until: DateTime<Utc>,

    /// The time at which the issuing authority expects to re-sign the MSO
    /// (and potentially update data elements).
    #[serde(default, skip_serializing_if = "Option::is_none", with = "tdate::option")]
    pub expected_update: Option<DateTime<Utc>>,
}

impl ValidityInfo {
    /// Validity window starting at `signed`.
    #[must_use]
    pub const fn new(signed: DateTime<Utc>, valid_until: DateTime<Utc>) -> Self {
        Self {
            signed,
            valid_from: signed,
            valid_until,
            expected_update: None,
        }
    }

    /// Whether `at` falls within `valid_from..=valid_until`.
    #[must_use]
    pub fn is_valid_at(&self, at: DateTime<Utc>) -> bool {
        self.valid_from <= at && at <= self.valid_until
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use rstest::rstest;

    use super::*;
    use crate::cose_key::Curve;
    use crate::mdoc::IssuerSignedItem;

    fn item(digest_id: DigestId, identifier: &str, value: Value) -> IssuerSignedItemBytes {
        Tag24::new(IssuerSignedItem {
            digest_id,
            random: vec![digest_id as u8; 16],
            element_identifier: identifier.to_string(),
            element_value: value,
        })
        .expect("should encode")
    }

    fn name_spaces() -> IssuerNameSpaces {
        BTreeMap::from([
            (
                "org.iso.18013.5.1".to_string(),
                vec![
                    item(0, "given_name", Value::Text("Normal".into())),
                    item(1, "family_name", Value::Text("Person".into())),
                ],
            ),
            (
                "org.iso.18013.5.1.aamva".to_string(),
                vec![item(0, "DHS_compliance", Value::Text("F".into()))],
            ),
        ])
    }

    fn validity_info() -> ValidityInfo {
        let signed = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        ValidityInfo::new(signed, signed + Duration::days(365))
    }

    fn mso(digest_algorithm: DigestAlgorithm) -> MobileSecurityObject {
        let device_key = CoseKey::Okp {
            crv: Curve::Ed25519,
            x: vec![1; 32],
        };
        MobileSecurityObject::create_for(
            &name_spaces(),
            device_key.into(),
            "org.iso.18013.5.1.mDL",
            validity_info(),
            digest_algorithm,
        )
        .expect("should create")
    }

    #[rstest]
    #[case::sha256(DigestAlgorithm::Sha256, 32)]
    #[case::sha384(DigestAlgorithm::Sha384, 48)]
    #[case::sha512(DigestAlgorithm::Sha512, 64)]
    fn create_and_verify(#[case] digest_algorithm: DigestAlgorithm, #[case] digest_len: usize) {
        let mso = mso(digest_algorithm);
        assert_eq!(mso.doc_type, "org.iso.18013.5.1.mDL");
        assert_eq!(mso.value_digests["org.iso.18013.5.1"].len(), 2);
        let mut digests = mso.value_digests.values().flat_map(BTreeMap::values);
        assert!(digests.all(|d| d.len() == digest_len));

        for (name_space, items) in &name_spaces() {
            assert!(mso.verify_signed_items(name_space, items).unwrap());
        }
    }

    #[test]
    fn tampered_item() {
        let mso = mso(DigestAlgorithm::Sha256);
        let items = vec![
            item(0, "given_name", Value::Text("Abnormal".into())),
            item(1, "family_name", Value::Text("Person".into())),
        ];
        assert!(!mso.verify_signed_items("org.iso.18013.5.1", &items).unwrap());
        assert!(mso.verify_signed_items("org.iso.18013.5.1", &items[1..]).unwrap());
    }

    #[test]
    fn name_space_isolation() {
        let mso = mso(DigestAlgorithm::Sha256);

        // digest ID 0 exists in both name spaces but only matches its own
        let aamva = &name_spaces()["org.iso.18013.5.1.aamva"];
        assert!(!mso.verify_signed_items("org.iso.18013.5.1", aamva).unwrap());
        assert!(!mso.verify_signed_items("org.example.unknown", aamva).unwrap());
    }

    #[test]
    fn unknown_digest_id() {
        let mso = mso(DigestAlgorithm::Sha256);
        let items = vec![item(7, "given_name", Value::Text("Normal".into()))];
        assert!(!mso.verify_signed_items("org.iso.18013.5.1", &items).unwrap());
    }

    #[test]
    fn duplicate_digest_id() {
        let name_spaces = BTreeMap::from([(
            "org.iso.18013.5.1".to_string(),
            vec![
                item(0, "given_name", Value::Text("Normal".into())),
                item(0, "family_name", Value::Text("Person".into())),
            ],
        )]);
        let device_key = CoseKey::Okp {
            crv: Curve::Ed25519,
            x: vec![1; 32],
        };
        let result = MobileSecurityObject::create_for(
            &name_spaces,
            device_key.into(),
            "org.iso.18013.5.1.mDL",
            validity_info(),
            DigestAlgorithm::Sha256,
        );
        assert!(matches!(result, Err(Error::Encoding(_))));
    }

    #[test]
    fn empty_items_verify() {
        let mso = mso(DigestAlgorithm::Sha256);
        assert!(mso.verify_signed_items("org.example.unknown", &[]).unwrap());
    }

    #[test]
    fn payload_roundtrip() {
        let mso = mso(DigestAlgorithm::Sha384);
        let payload = mso.to_payload().expect("should encode");
        assert_eq!(&payload[..2], &[0xd8, 0x18]);
        assert_eq!(MobileSecurityObject::from_payload(&payload).unwrap(), mso);

        // untagged encoding is accepted too
        let untagged = cbor::to_vec(&mso).unwrap();
        assert_eq!(MobileSecurityObject::from_payload(&untagged).unwrap(), mso);
    }

    #[test]
    fn validity_window() {
        let validity = validity_info();
        assert!(validity.is_valid_at(validity.signed));
        assert!(validity.is_valid_at(validity.signed + Duration::days(30)));
        assert!(!validity.is_valid_at(validity.signed - Duration::seconds(1)));
        assert!(!validity.is_valid_at(validity.valid_until + Duration::seconds(1)));
    }
}
