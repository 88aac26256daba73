use anyhow::anyhow;
use base64ct::{Base64UrlUnpadded, Encoding};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use vercre_mdoc::provider::Algorithm;
use vercre_mdoc::{CoseKey, Curve};

// prefix of the key ids written to `IssuerAuth`
pub const ISSUER_ID: &str = "mdl-issuer";
pub const ISSUER_KEY_0: &str = "key-0";
pub const ISSUER_KEY_1: &str = "key-1";

// issuer signing keys, by key id
const ISSUER_SECRETS: [(&str, &str); 2] = [
    (ISSUER_KEY_0, "btvu4hBlWsQzQkFc5VP576wb7_ha0RZK9MZzS6oumNA"),
    (ISSUER_KEY_1, "KL8TKRi7lwdnmMtQbCJqizyK9o0_0b19BhNRB0NSRws"),
];

#[derive(Default, Clone, Debug)]
pub struct IssuerKeystore;

impl IssuerKeystore {
    pub const fn algorithm() -> Algorithm {
        Algorithm::EdDSA
    }

    /// Resolve a key id, falling back to the default key.
    pub fn key_id(key_id: Option<&str>) -> anyhow::Result<&'static str> {
        let key_id = key_id.unwrap_or(ISSUER_KEY_0);
        ISSUER_SECRETS
            .iter()
            .find(|(id, _)| *id == key_id)
            .map(|(id, _)| *id)
            .ok_or_else(|| anyhow!("key not found: {key_id}"))
    }

    pub fn verification_method(key_id: Option<&str>) -> anyhow::Result<String> {
        Ok(format!("{ISSUER_ID}#{}", Self::key_id(key_id)?))
    }

    pub fn try_sign(msg: &[u8], key_id: Option<&str>) -> anyhow::Result<Vec<u8>> {
        let signing_key = signing_key(Self::key_id(key_id)?)?;
        Ok(signing_key.sign(msg).to_bytes().to_vec())
    }

    pub fn verify(msg: &[u8], signature: &[u8], key_id: Option<&str>) -> anyhow::Result<bool> {
        let verifying_key: VerifyingKey = signing_key(Self::key_id(key_id)?)?.verifying_key();
        let Ok(signature) = Signature::from_slice(signature) else {
            return Ok(false);
        };
        Ok(verifying_key.verify(msg, &signature).is_ok())
    }
}

fn signing_key(key_id: &str) -> anyhow::Result<SigningKey> {
    let (_, secret) = ISSUER_SECRETS
        .iter()
        .find(|(id, _)| *id == key_id)
        .ok_or_else(|| anyhow!("key not found: {key_id}"))?;
    let decoded = Base64UrlUnpadded::decode_vec(secret)?;
    let bytes: [u8; 32] = decoded.try_into().map_err(|_| anyhow!("invalid secret key"))?;
    Ok(SigningKey::from_bytes(&bytes))
}

const WALLET_JWK_D: &str = "Y1KNbzOcX112pXI3v6sFvcr8uBLw4Pc2ciZTWdZx-As";

#[derive(Default, Clone, Debug)]
pub struct HolderKeystore;

impl HolderKeystore {
    /// The holder's public key as a `COSE_Key`.
    pub fn device_key() -> anyhow::Result<CoseKey> {
        let decoded = Base64UrlUnpadded::decode_vec(WALLET_JWK_D)?;
        let bytes: [u8; 32] = decoded.try_into().map_err(|_| anyhow!("invalid secret key"))?;
        let verifying_key = SigningKey::from_bytes(&bytes).verifying_key();

        Ok(CoseKey::Okp {
            crv: Curve::Ed25519,
            x: verifying_key.to_bytes().to_vec(),
        })
    }
}
