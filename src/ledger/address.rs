//! Bech32 account addresses
//!
//! Random transfer destinations are 20 random bytes under the network prefix,
//! and the dry-run signer derives addresses the same way.

use bech32::{Bech32, Hrp};
use rand::RngCore;

use crate::error::{Error, Result};

/// Account addresses are 20-byte hashes
pub const ADDRESS_BYTES: usize = 20;

/// Parse a network prefix as a bech32 human-readable part.
///
/// Addresses are compared as text against pool files and query results, so
/// the prefix must already be in its lowercase form.
pub fn parse_prefix(prefix: &str) -> Result<Hrp> {
    let hrp = Hrp::parse(prefix).map_err(|e| {
        Error::InvalidRequest(format!("address prefix {:?} is not valid bech32: {}", prefix, e))
    })?;
    if prefix.bytes().any(|b| b.is_ascii_uppercase()) {
        return Err(Error::InvalidRequest(format!(
            "address prefix {:?} must be lowercase",
            prefix
        )));
    }
    Ok(hrp)
}

/// Encode raw bytes as a bech32 string under `prefix`
pub fn encode(prefix: &str, bytes: &[u8]) -> Result<String> {
    let hrp = parse_prefix(prefix)?;
    bech32::encode::<Bech32>(hrp, bytes)
        .map_err(|e| Error::Internal(format!("bech32 encoding failed: {}", e)))
}

/// Fresh random account address, for transfers to throwaway destinations
pub fn random_address<R: RngCore + ?Sized>(prefix: &str, rng: &mut R) -> Result<String> {
    let mut bytes = [0u8; ADDRESS_BYTES];
    rng.fill_bytes(&mut bytes);
    encode(prefix, &bytes)
}

/// Cheap shape check used when reading address pools
pub fn has_prefix(address: &str, prefix: &str) -> bool {
    address
        .strip_prefix(prefix)
        .map(|rest| rest.starts_with('1') && rest.len() > 7)
        .unwrap_or(false)
}
