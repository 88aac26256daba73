//! Issuer provider: signs and verifies `IssuerAuth` with hard-coded Ed25519
//! keys.

use vercre_mdoc::provider::{Algorithm, AsyncSigner, Signer, Verifier};

use crate::store::keystore::IssuerKeystore;

pub const DOC_TYPE: &str = "org.iso.18013.5.1.mDL";
pub const NAME_SPACE: &str = "org.iso.18013.5.1";
pub const AAMVA_NAME_SPACE: &str = "org.iso.18013.5.1.aamva";

#[derive(Default, Clone, Debug)]
pub struct Provider;

impl Provider {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Signer for Provider {
    fn algorithm(&self) -> Algorithm {
        IssuerKeystore::algorithm()
    }

    fn verification_method(&self, key_id: Option<&str>) -> anyhow::Result<String> {
        IssuerKeystore::verification_method(key_id)
    }

    fn try_sign(&self, msg: &[u8], key_id: Option<&str>) -> anyhow::Result<Vec<u8>> {
        IssuerKeystore::try_sign(msg, key_id)
    }
}

impl AsyncSigner for Provider {
    fn algorithm(&self) -> Algorithm {
        IssuerKeystore::algorithm()
    }

    fn verification_method(&self, key_id: Option<&str>) -> anyhow::Result<String> {
        IssuerKeystore::verification_method(key_id)
    }

    async fn try_sign(&self, msg: &[u8], key_id: Option<&str>) -> anyhow::Result<Vec<u8>> {
        IssuerKeystore::try_sign(msg, key_id)
    }
}

impl Verifier for Provider {
    fn verify(&self, msg: &[u8], signature: &[u8], key_id: Option<&str>) -> anyhow::Result<bool> {
        IssuerKeystore::verify(msg, signature, key_id)
    }
}
