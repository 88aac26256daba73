//! An API for issuing and verifying ISO/IEC 18013-5 mobile documents (mdocs),
//! such as the mobile driving licence (mDL).
//!
//! An mdoc groups issuer-signed data elements into name spaces. The issuer
//! signs a Mobile Security Object (MSO) holding a digest of every element,
//! so a verifier can check each element it receives against the signed MSO.
//!
//! # Issuance
//!
//! [`MDocBuilder`] accumulates data elements and signs them using a
//! [`provider::Signer`] (or [`provider::AsyncSigner`]) supplied by the host
//! application.
//!
//! # Verification
//!
//! [`MDoc::verify`] recomputes each element's digest, compares it with the
//! MSO, and checks the issuer's signature using a [`provider::Verifier`].

pub mod cbor;
pub mod provider;

mod builder;
mod cose_key;
mod error;
mod issuer_auth;
mod mdoc;
mod mso;

pub use crate::builder::MDocBuilder;
pub use crate::cbor::Tag24;
pub use crate::cose_key::{CoseKey, Curve};
pub use crate::error::{Error, Result};
pub use crate::issuer_auth::IssuerAuth;
pub use crate::mdoc::{
    DeviceAuth, DeviceSigned, IssuerNameSpaces, IssuerSigned, IssuerSignedItem,
    IssuerSignedItemBytes, MDoc,
};
pub use crate::mso::{
    DeviceKeyInfo, Digest, DigestAlgorithm, DigestId, DigestIds, KeyAuthorization,
    MobileSecurityObject, NameSpace, ValidityInfo, ValueDigests, Version,
};
