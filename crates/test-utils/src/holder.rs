//! Holder (wallet) key material bound into issued mdocs.

use vercre_mdoc::DeviceKeyInfo;

use crate::store::keystore::HolderKeystore;

/// `DeviceKeyInfo` for the holder's Ed25519 device key.
///
/// # Panics
///
/// Panics if the hard-coded holder key is invalid.
#[must_use]
pub fn device_key_info() -> DeviceKeyInfo {
    HolderKeystore::device_key().expect("holder key should be valid").into()
}
