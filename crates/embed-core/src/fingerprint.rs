//! Content fingerprinting (spec §4.1).
//!
//! The fingerprint is a durable key into the on-disk cache, so normalization
//! must stay minimal and stable across machines and binary versions: trim
//! surrounding whitespace only, never touch interior bytes.

use serde::{Deserialize, Serialize};

use crate::constants::FINGERPRINT_LEN;
use crate::errors::{EmbedError, EmbedResult};

/// A 32-byte content-addressed key derived from a normalized text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(#[serde(with = "hex_bytes")] pub [u8; FINGERPRINT_LEN]);

impl Fingerprint {
    pub fn as_bytes(&self) -> &[u8; FINGERPRINT_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        let mut s = String::with_capacity(FINGERPRINT_LEN * 2);
        for b in &self.0 {
            s.push_str(&format!("{b:02x}"));
        }
        s
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

mod hex_bytes {
    use super::FINGERPRINT_LEN;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8; FINGERPRINT_LEN], s: S) -> Result<S::Ok, S::Error> {
        let mut out = String::with_capacity(FINGERPRINT_LEN * 2);
        for b in bytes {
            out.push_str(&format!("{b:02x}"));
        }
        s.serialize_str(&out)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<[u8; FINGERPRINT_LEN], D::Error> {
        let s = String::deserialize(d)?;
        if s.len() != FINGERPRINT_LEN * 2 {
            return Err(serde::de::Error::custom("fingerprint hex has wrong length"));
        }
        let mut out = [0u8; FINGERPRINT_LEN];
        for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
            let byte = u8::from_str_radix(std::str::from_utf8(chunk).unwrap(), 16)
                .map_err(serde::de::Error::custom)?;
            out[i] = byte;
        }
        Ok(out)
    }
}

/// Normalize a text: trim surrounding whitespace only. Inner bytes, including
/// inner whitespace runs, are preserved exactly.
fn normalize(text: &str) -> &str {
    text.trim()
}

/// Compute the deterministic content fingerprint of `text`.
///
/// Empty input (after trimming) fails with `InvalidInput`: an empty
/// fingerprint key would collide across unrelated empty-string callers and
/// carries no content to hash meaningfully.
pub fn fingerprint(text: &str) -> EmbedResult<Fingerprint> {
    let normalized = normalize(text);
    if normalized.is_empty() {
        return Err(EmbedError::invalid_input(
            "cannot fingerprint empty text after trimming whitespace",
        ));
    }
    let hash = blake3::hash(normalized.as_bytes());
    Ok(Fingerprint(*hash.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_across_calls() {
        let a = fingerprint("hello world").unwrap();
        let b = fingerprint("hello world").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn trims_surrounding_whitespace_only() {
        let a = fingerprint("hello world").unwrap();
        let b = fingerprint("  hello world\n\t").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn preserves_interior_whitespace() {
        let a = fingerprint("hello world").unwrap();
        let b = fingerprint("hello  world").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn empty_input_is_invalid() {
        assert!(fingerprint("").is_err());
        assert!(fingerprint("   \n\t  ").is_err());
    }

    #[test]
    fn different_text_different_fingerprint() {
        let a = fingerprint("alpha").unwrap();
        let b = fingerprint("beta").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn hex_roundtrips_through_serde() {
        let fp = fingerprint("roundtrip me").unwrap();
        let json = serde_json::to_string(&fp).unwrap();
        let back: Fingerprint = serde_json::from_str(&json).unwrap();
        assert_eq!(fp, back);
    }

    proptest::proptest! {
        #[test]
        fn fingerprint_never_panics(s in ".*") {
            let _ = fingerprint(&s);
        }
    }
}
