//! # COSE Key
//!
//! Support for `COSE_Key` as defined in [RFC9052], restricted to the public
//! key types an mdoc holder is expected to present in `DeviceKeyInfo`.
//!
//! [RFC9052]: https://www.rfc-editor.org/rfc/rfc9052.html#name-key-objects

use std::collections::BTreeMap;

use ciborium::value::Integer;
use ciborium::Value;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// COSE_Key labels
const KTY: i64 = 1;
const CRV: i64 = -1;
const X: i64 = -2;
const Y: i64 = -3;

// key types
const KTY_OKP: i64 = 1;
const KTY_EC2: i64 = 2;

/// Implements [`COSE_Key`] as defined in [RFC9052].
///
/// [RFC9052]: https://www.rfc-editor.org/rfc/rfc9052.html#name-key-objects
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "Value", into = "Value")]
pub enum CoseKey {
    /// Octet Key Pair
    Okp {
        /// Curve
        crv: Curve,

        /// Public key
        x: Vec<u8>,
    },

    /// Elliptic Curve Key Pair
    Ec2 {
        /// Curve
        crv: Curve,

        /// Public key X
        x: Vec<u8>,

        /// Public key Y
        y: Vec<u8>,
    },
}

/// Cryptographic curve of a `COSE_Key`, with its IANA COSE identifier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Curve {
    /// NIST P-256 (1)
    P256,

    /// NIST P-384 (2)
    P384,

    /// Ed25519 (6)
    #[default]
    Ed25519,

    /// secp256k1 (8)
    Es256K,
}

/// Serialize `COSE_Key` to CBOR.
impl From<CoseKey> for Value {
    fn from(key: CoseKey) -> Self {
        let label = |l: i64| Self::Integer(l.into());

        let mut cbor = vec![];
        match key {
            // kty: 1, Okp: 1, crv: -1, x: -2
            CoseKey::Okp { crv, x } => {
                cbor.push((label(KTY), label(KTY_OKP)));
                cbor.push((label(CRV), crv.into()));
                cbor.push((label(X), Self::Bytes(x)));
            }
            // kty: 1, Ec2: 2, crv: -1, x: -2, y: -3
            CoseKey::Ec2 { crv, x, y } => {
                cbor.push((label(KTY), label(KTY_EC2)));
                cbor.push((label(CRV), crv.into()));
                cbor.push((label(X), Self::Bytes(x)));
                cbor.push((label(Y), Self::Bytes(y)));
            }
        }
        Self::Map(cbor)
    }
}

/// Deserialize `COSE_Key` from CBOR.
impl TryFrom<Value> for CoseKey {
    type Error = Error;

    fn try_from(v: Value) -> Result<Self> {
        let Value::Map(map) = v else {
            return Err(Error::Encoding("COSE_Key is not a map".into()));
        };

        // entries with non-integer labels are not used by these key types
        let mut map = map
            .into_iter()
            .filter_map(|(k, v)| k.as_integer().map(|k| (i128::from(k), v)))
            .collect::<BTreeMap<_, _>>();

        let kty = match map.remove(&i128::from(KTY)) {
            Some(Value::Integer(kty)) => i128::from(kty),
            other => return Err(Error::Encoding(format!("invalid COSE_Key kty: {other:?}"))),
        };
        let crv = match map.remove(&i128::from(CRV)) {
            Some(Value::Integer(crv)) => Curve::try_from(crv)?,
            other => return Err(Error::Encoding(format!("invalid COSE_Key crv: {other:?}"))),
        };
        let Some(Value::Bytes(x)) = map.remove(&i128::from(X)) else {
            return Err(Error::Encoding("COSE_Key missing x coordinate".into()));
        };

        match kty {
            k if k == i128::from(KTY_OKP) => Ok(Self::Okp { crv, x }),
            k if k == i128::from(KTY_EC2) => {
                let Some(Value::Bytes(y)) = map.remove(&i128::from(Y)) else {
                    return Err(Error::Encoding("COSE_Key missing y coordinate".into()));
                };
                Ok(Self::Ec2 { crv, x, y })
            }
            _ => Err(Error::Encoding(format!("unsupported COSE_Key kty: {kty}"))),
        }
    }
}

impl From<Curve> for Value {
    fn from(crv: Curve) -> Self {
        let id: i64 = match crv {
            Curve::P256 => 1,
            Curve::P384 => 2,
            Curve::Ed25519 => 6,
            Curve::Es256K => 8,
        };
        Self::Integer(id.into())
    }
}

impl TryFrom<Integer> for Curve {
    type Error = Error;

    fn try_from(crv_id: Integer) -> Result<Self> {
        match i128::from(crv_id) {
            1 => Ok(Self::P256),
            2 => Ok(Self::P384),
            6 => Ok(Self::Ed25519),
            8 => Ok(Self::Es256K),
            other => Err(Error::Encoding(format!("unsupported curve: {other}"))),
        }
    }
}
