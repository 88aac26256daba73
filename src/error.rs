//! # Errors
//!
//! Errors raised while building, encoding, or verifying an mdoc.
//!
//! A digest mismatch is not an error: tampered or inconsistent claims are
//! reported as `Ok(false)` by the verification methods. Errors are reserved
//! for input that cannot be processed at all.

use thiserror::Error;

/// Result type for mdoc operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors for mdoc issuance and verification.
#[derive(Error, Debug)]
pub enum Error {
    /// The `IssuerAuth` `COSE_Sign1` structure is malformed: it has fewer
    /// than 3 elements, or its payload is neither `null` nor a byte string.
    #[error("invalid COSE_Sign1: {0}")]
    InvalidIssuerAuth(String),

    /// Claim verification was attempted but the `IssuerAuth` carries no
    /// Mobile Security Object.
    #[error("no MSO object found on this mdoc")]
    MissingMso,

    /// The signing or verification provider failed. The provider's error is
    /// passed through as-is.
    #[error(transparent)]
    Provider(anyhow::Error),

    /// A value could not be encoded or decoded.
    #[error("encoding error: {0}")]
    Encoding(String),
}

impl Error {
    /// Returns the provider error, if this error originated from a signing
    /// or verification provider.
    #[must_use]
    pub const fn provider_error(&self) -> Option<&anyhow::Error> {
        match self {
            Self::Provider(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ciborium::value::Error> for Error {
    fn from(e: ciborium::value::Error) -> Self {
        Self::Encoding(e.to_string())
    }
}

impl From<coset::CoseError> for Error {
    fn from(e: coset::CoseError) -> Self {
        Self::Encoding(e.to_string())
    }
}

impl From<base64ct::Error> for Error {
    fn from(e: base64ct::Error) -> Self {
        Self::Encoding(e.to_string())
    }
}
