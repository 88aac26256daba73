//! # Provider
//!
//! Traits implemented by the host application to supply the cryptography
//! used to sign and verify an mdoc's `IssuerAuth`. The crate never handles
//! key material directly.
//!
//! Providers select a key using an optional key id. When no key id is given
//! the provider uses its default key.

use std::fmt::Display;
use std::future::Future;

use coset::{iana, CoseSign1};
use serde::{Deserialize, Serialize};

/// Signer is used by implementers to provide blocking signing
/// functionality for mdoc issuance.
pub trait Signer: Send + Sync {
    /// Algorithm returns the algorithm used by the signer.
    fn algorithm(&self) -> Algorithm;

    /// The identifier of the key the signer will use for `key_id`, or of its
    /// default key when `key_id` is `None`. Written to the unprotected header
    /// of the `COSE_Sign1`.
    ///
    /// # Errors
    ///
    /// Returns an error if the key cannot be found.
    fn verification_method(&self, key_id: Option<&str>) -> anyhow::Result<String>;

    /// Sign the message with the selected key, returning the raw signature.
    ///
    /// # Errors
    ///
    /// Returns an error if the key cannot be found or signing fails.
    fn try_sign(&self, msg: &[u8], key_id: Option<&str>) -> anyhow::Result<Vec<u8>>;
}

/// `AsyncSigner` provides signing for signers that suspend while signing,
/// such as remote key services or hardware tokens.
pub trait AsyncSigner: Send + Sync {
    /// Algorithm returns the algorithm used by the signer.
    fn algorithm(&self) -> Algorithm;

    /// The identifier of the key the signer will use for `key_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the key cannot be found.
    fn verification_method(&self, key_id: Option<&str>) -> anyhow::Result<String>;

    /// Sign the message with the selected key, returning the raw signature.
    fn try_sign(
        &self, msg: &[u8], key_id: Option<&str>,
    ) -> impl Future<Output = anyhow::Result<Vec<u8>>> + Send;
}

/// Verifier is used by implementers to check the issuer's signature over
/// an mdoc's `IssuerAuth`.
pub trait Verifier: Send + Sync {
    /// Verify `signature` over `msg` with the selected key.
    ///
    /// Returns `Ok(false)` for a signature that does not verify.
    ///
    /// # Errors
    ///
    /// Returns an error if the key cannot be found or verification could not
    /// be performed.
    fn verify(&self, msg: &[u8], signature: &[u8], key_id: Option<&str>) -> anyhow::Result<bool>;

    /// Verify a `COSE_Sign1` envelope. The default implementation rebuilds
    /// the `Sig_structure` (empty external AAD) and calls [`Verifier::verify`].
    ///
    /// # Errors
    ///
    /// Returns an error if verification could not be performed.
    fn verify_sign1(&self, sign1: &CoseSign1, key_id: Option<&str>) -> anyhow::Result<bool> {
        let tbs = sign1.tbs_data(&[]);
        self.verify(&tbs, &sign1.signature, key_id)
    }
}

/// Algorithm is used to specify the signing algorithm used by the signer.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub enum Algorithm {
    /// ECDSA using P-256 and SHA-256
    #[serde(rename = "ES256")]
    ES256,

    /// ECDSA using P-384 and SHA-384
    #[serde(rename = "ES384")]
    ES384,

    /// Algorithm for the Ed25519 curve
    #[default]
    #[serde(rename = "EdDSA")]
    EdDSA,
}

impl From<Algorithm> for iana::Algorithm {
    fn from(alg: Algorithm) -> Self {
        match alg {
            Algorithm::ES256 => Self::ES256,
            Algorithm::ES384 => Self::ES384,
            Algorithm::EdDSA => Self::EdDSA,
        }
    }
}

impl Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}
