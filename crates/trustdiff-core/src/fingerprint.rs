//! Certificate fingerprints via `ring::digest`.
//!
//! A fingerprint is the upper-case hex SHA-256 of a certificate's DER
//! encoding. Report rows spell them many ways (`AA:BB:..`, lower-case,
//! spaces), so everything is run through [`normalize_fingerprint`] before
//! it is compared or used as a key.

use ring::digest::{digest, SHA256};

/// Canonical fingerprint string (upper-case, alphanumeric only).
pub type Fingerprint = String;

/// Compute the SHA-256 fingerprint of DER bytes.
#[must_use]
pub fn sha256_fingerprint(der: &[u8]) -> Fingerprint {
    hex::encode_upper(digest(&SHA256, der).as_ref())
}

/// Strip every non-alphanumeric character and upper-case the rest.
#[must_use]
pub fn normalize_fingerprint(raw: &str) -> Fingerprint {
    raw.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Case-insensitive fingerprint equality.
#[must_use]
pub fn fingerprints_match(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}
