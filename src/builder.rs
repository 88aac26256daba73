//! # MDoc Builder
//!
//! Accumulates issuer-signed data elements per name space and signs them into
//! an [`MDoc`].
//!
//! Each element added with [`MDocBuilder::add_item`] is given a fresh random
//! salt and the next digest ID for its name space. Signing snapshots the
//! accumulated elements into a Mobile Security Object, has the provider sign
//! it, and wraps the signature in the document's `IssuerAuth`. The builder is
//! left untouched, so the same claims can be signed again.

use ciborium::{cbor, Value};
use coset::CoseSign1;
use rand::{rng, Rng};
use serde_json::Map;
use tracing::instrument;

use crate::cbor::Tag24;
use crate::issuer_auth::IssuerAuth;
use crate::mdoc::{
    DeviceSigned, IssuerNameSpaces, IssuerSigned, IssuerSignedItem, IssuerSignedItemBytes, MDoc,
};
use crate::mso::{DeviceKeyInfo, DigestAlgorithm, MobileSecurityObject, ValidityInfo};
use crate::provider::{Algorithm, AsyncSigner, Signer};
use crate::{Error, Result};

/// Builds and signs an [`MDoc`].
#[derive(Clone, Debug)]
pub struct MDocBuilder {
    doc_type: String,
    digest_algorithm: DigestAlgorithm,
    name_spaces: IssuerNameSpaces,
}

impl MDocBuilder {
    /// Create a builder for a document of type `doc_type`, using SHA-256
    /// digests.
    #[must_use]
    pub fn new(doc_type: impl Into<String>) -> Self {
        Self {
            doc_type: doc_type.into(),
            digest_algorithm: DigestAlgorithm::default(),
            name_spaces: IssuerNameSpaces::new(),
        }
    }

    /// Set the digest algorithm used for the MSO.
    #[must_use]
    pub fn digest_algorithm(mut self, digest_algorithm: DigestAlgorithm) -> Self {
        self.digest_algorithm = digest_algorithm;
        self
    }

    /// The document type being built.
    #[must_use]
    pub fn doc_type(&self) -> &str {
        &self.doc_type
    }

    /// The data elements added so far.
    #[must_use]
    pub const fn name_spaces(&self) -> &IssuerNameSpaces {
        &self.name_spaces
    }

    /// Add a data element to `name_space`.
    ///
    /// The element is assigned digest ID 0 if the name space is empty,
    /// otherwise one more than the highest digest ID already present.
    ///
    /// # Errors
    ///
    /// Returns an [`Error::Encoding`] error if the element cannot be encoded
    /// or the name space already holds digest ID `u64::MAX`.
    pub fn add_item(
        &mut self, name_space: impl Into<String>, element_identifier: impl Into<String>,
        element_value: impl Into<Value>,
    ) -> Result<&mut Self> {
        let items = self.name_spaces.entry(name_space.into()).or_default();
        let digest_id = match items.iter().map(|item| item.digest_id).max() {
            Some(max) => max
                .checked_add(1)
                .ok_or_else(|| Error::Encoding("digest IDs exhausted for name space".into()))?,
            None => 0,
        };

        let item = Tag24::new(IssuerSignedItem {
            digest_id,
            random: rng().random::<[u8; 16]>().to_vec(),
            element_identifier: element_identifier.into(),
            element_value: element_value.into(),
        })?;
        items.push(item);

        Ok(self)
    }

    /// Add already-built data elements to `name_space` as they are. Digest IDs
    /// are kept, so items re-used from an earlier document keep their digests.
    ///
    /// Digest IDs must be unique within the name space. Signing fails if two
    /// items share one.
    pub fn add_pre_built_items(
        &mut self, name_space: impl Into<String>,
        items: impl IntoIterator<Item = IssuerSignedItemBytes>,
    ) -> &mut Self {
        self.name_spaces.entry(name_space.into()).or_default().extend(items);
        self
    }

    /// Add every claim in a credential dataset. Each root-level key is a name
    /// space whose value is an object of data elements.
    ///
    /// # Errors
    ///
    /// Returns an [`Error::Encoding`] error if a root-level value is not an
    /// object or a claim cannot be encoded.
    pub fn add_dataset(&mut self, dataset: Map<String, serde_json::Value>) -> Result<&mut Self> {
        for (name_space, claims) in dataset {
            let Some(claims) = claims.as_object() else {
                return Err(Error::Encoding(format!("name space {name_space} is not an object")));
            };
            for (identifier, value) in claims {
                self.add_item(name_space.as_str(), identifier.as_str(), cbor!(value)?)?;
            }
        }
        Ok(self)
    }

    /// Sign the accumulated data elements with the key selected by `key_id`.
    ///
    /// # Errors
    ///
    /// Returns an [`Error::Provider`] error, unchanged, if the signer fails,
    /// and an [`Error::Encoding`] error if the MSO cannot be encoded.
    #[instrument(level = "debug", skip_all, fields(doc_type = %self.doc_type, ?key_id))]
    pub fn sign(
        &self, signer: &impl Signer, validity_info: ValidityInfo, device_key_info: DeviceKeyInfo,
        device_signed: DeviceSigned, key_id: Option<&str>,
    ) -> Result<MDoc> {
        let kid = signer.verification_method(key_id).map_err(Error::Provider)?;
        let mut sign1 = self.unsigned(validity_info, device_key_info, signer.algorithm(), &kid)?;

        sign1.signature = signer.try_sign(&sign1.tbs_data(&[]), key_id).map_err(Error::Provider)?;
        tracing::debug!("MSO signed");

        self.to_mdoc(sign1, device_signed)
    }

    /// Sign the accumulated data elements with a signer that suspends while
    /// signing. Otherwise identical to [`MDocBuilder::sign`].
    ///
    /// # Errors
    ///
    /// Returns an [`Error::Provider`] error, unchanged, if the signer fails,
    /// and an [`Error::Encoding`] error if the MSO cannot be encoded.
    #[instrument(level = "debug", skip_all, fields(doc_type = %self.doc_type, ?key_id))]
    pub async fn sign_async(
        &self, signer: &impl AsyncSigner, validity_info: ValidityInfo,
        device_key_info: DeviceKeyInfo, device_signed: DeviceSigned, key_id: Option<&str>,
    ) -> Result<MDoc> {
        let kid = signer.verification_method(key_id).map_err(Error::Provider)?;
        let mut sign1 = self.unsigned(validity_info, device_key_info, signer.algorithm(), &kid)?;

        let tbs = sign1.tbs_data(&[]);
        sign1.signature = signer.try_sign(&tbs, key_id).await.map_err(Error::Provider)?;
        tracing::debug!("MSO signed");

        self.to_mdoc(sign1, device_signed)
    }

    // Build the MSO over a snapshot of the name spaces and wrap it in an
    // unsigned COSE_Sign1.
    fn unsigned(
        &self, validity_info: ValidityInfo, device_key_info: DeviceKeyInfo,
        algorithm: Algorithm, kid: &str,
    ) -> Result<CoseSign1> {
        let mso = MobileSecurityObject::create_for(
            &self.name_spaces,
            device_key_info,
            self.doc_type.clone(),
            validity_info,
            self.digest_algorithm,
        )?;
        tracing::debug!(name_spaces = mso.value_digests.len(), "MSO created");

        Ok(IssuerAuth::unsigned(mso.to_payload()?, algorithm, kid))
    }

    fn to_mdoc(&self, sign1: CoseSign1, device_signed: DeviceSigned) -> Result<MDoc> {
        let name_spaces = (!self.name_spaces.is_empty()).then(|| self.name_spaces.clone());

        Ok(MDoc {
            doc_type: self.doc_type.clone(),
            issuer_signed: IssuerSigned {
                name_spaces,
                issuer_auth: IssuerAuth::try_from(sign1)?,
            },
            device_signed,
        })
    }
}
