//! DS digest recomputation (RFC 4034 §5.1.4) and DNSKEY presentation helpers.

use base64::{Engine, engine::general_purpose::STANDARD};
use hickory_resolver::proto::{
    dnssec::{DigestType, PublicKey, rdata::DNSKEY},
    rr::Name,
};

use crate::types::{DnskeyRecord, DsRecord};

/// RSA/MD5, whose key tag is taken from the modulus instead of a checksum.
const ALGORITHM_RSAMD5: u8 = 1;

/// Algorithm number of `key`.
pub fn key_algorithm(key: &DNSKEY) -> u8 {
    key.public_key().algorithm().into()
}

/// Key tag (RFC 4034 Appendix B).
pub fn key_tag(key: &DNSKEY) -> u16 {
    let public_key = key.public_key();
    if u8::from(public_key.algorithm()) == ALGORITHM_RSAMD5 {
        return rsamd5_key_tag(public_key.public_bytes());
    }
    match key.calculate_key_tag() {
        Ok(tag) => tag,
        Err(e) => {
            log::warn!("Failed to calculate key_tag: {e}");
            0
        }
    }
}

/// Most significant 16 of the least significant 24 bits of the modulus.
fn rsamd5_key_tag(public_key: &[u8]) -> u16 {
    match public_key.len().checked_sub(3) {
        Some(start) => u16::from_be_bytes([public_key[start], public_key[start + 1]]),
        None => 0,
    }
}

/// `"KSK"`, `"ZSK"` or `"Unknown (flags=N)"`.
pub fn key_type(key: &DNSKEY) -> String {
    if key.is_key_signing_key() {
        "KSK".to_string()
    } else if key.zone_key() {
        "ZSK".to_string()
    } else {
        format!("Unknown (flags={})", key.flags())
    }
}

/// Presentation form of `key`.
pub fn to_record(key: &DNSKEY) -> DnskeyRecord {
    let algorithm = key_algorithm(key);
    DnskeyRecord {
        flags: key.flags(),
        protocol: 3,
        algorithm,
        algorithm_name: algorithm_name(algorithm),
        public_key: STANDARD.encode(key.public_key().public_bytes()),
        key_tag: key_tag(key),
        key_type: key_type(key),
        calculated_ds: None,
    }
}

/// Get algorithm name from algorithm number (RFC 8624)
pub(crate) fn algorithm_name(algorithm: u8) -> String {
    match algorithm {
        1 => "RSA/MD5 (deprecated)".to_string(),
        3 => "DSA/SHA-1 (deprecated)".to_string(),
        5 => "RSA/SHA-1".to_string(),
        6 => "DSA-NSEC3-SHA1 (deprecated)".to_string(),
        7 => "RSASHA1-NSEC3-SHA1".to_string(),
        8 => "RSA/SHA-256".to_string(),
        10 => "RSA/SHA-512".to_string(),
        12 => "GOST R 34.10-2001".to_string(),
        13 => "ECDSAP256SHA256".to_string(),
        14 => "ECDSAP384SHA384".to_string(),
        15 => "Ed25519".to_string(),
        16 => "Ed448".to_string(),
        _ => format!("Unknown ({algorithm})"),
    }
}

/// Get digest type name from digest type number (RFC 4034)
pub(crate) fn digest_type_name(digest_type: u8) -> String {
    match digest_type {
        1 => "SHA-1".to_string(),
        2 => "SHA-256".to_string(),
        3 => "GOST R 34.11-94".to_string(),
        4 => "SHA-384".to_string(),
        _ => format!("Unknown ({digest_type})"),
    }
}

/// Fully-qualified, lower-cased owner name. `None` when `owner` is not a
/// valid DNS name.
fn owner_name(owner: &str) -> Option<Name> {
    let fqdn = format!("{}.", owner.trim_end_matches('.').to_ascii_lowercase());
    Name::from_ascii(&fqdn).ok()
}

/// `digest = H(owner name | DNSKEY RDATA)` for digest types 1, 2 and 4.
///
/// Returns `None` for any other digest type or an unusable owner name.
pub fn compute_ds_digest(owner: &str, key: &DNSKEY, digest_type: u8) -> Option<Vec<u8>> {
    if !matches!(digest_type, 1 | 2 | 4) {
        return None;
    }
    let digest_type = DigestType::try_from(digest_type).ok()?;
    let name = owner_name(owner)?;
    match key.to_digest(&name, digest_type) {
        Ok(digest) => Some(AsRef::<[u8]>::as_ref(&digest).to_vec()),
        Err(e) => {
            log::debug!("Digest of key {} for {owner} failed: {e}", key_tag(key));
            None
        }
    }
}

/// Build the DS record a parent zone would publish for `key`.
pub fn to_ds(owner: &str, key: &DNSKEY, digest_type: u8) -> Option<DsRecord> {
    let digest = compute_ds_digest(owner, key, digest_type)?;
    let algorithm = key_algorithm(key);
    Some(DsRecord {
        key_tag: key_tag(key),
        algorithm,
        algorithm_name: algorithm_name(algorithm),
        digest_type,
        digest_type_name: digest_type_name(digest_type),
        digest: hex::encode(digest),
    })
}
