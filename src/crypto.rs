//! Keyed-hash primitives shared by the OTP store and the session tokens.
//!
//! Peppered digests are plain SHA-256 over `part|part|…|pepper`; the pepper
//! never leaves the server and is never stored next to a hash. Signatures are
//! HMAC-SHA256, verified in constant time.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// SHA-256 hex digest of the given parts joined with `|`, pepper last.
pub fn peppered_digest(parts: &[&str], pepper: &str) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update(b"|");
    }
    hasher.update(pepper.as_bytes());
    hex::encode(hasher.finalize())
}

/// HMAC-SHA256 over `data` with the given secret.
pub fn hmac_sign(secret: &str, data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .unwrap_or_else(|_| unreachable!("HMAC accepts keys of any length"));
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Verify an HMAC-SHA256 signature in constant time.
pub fn hmac_verify(secret: &str, data: &[u8], signature: &[u8]) -> bool {
    let expected = hmac_sign(secret, data);
    expected.ct_eq(signature).into()
}

/// Constant-time string equality for shared secrets and access codes.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

pub fn b64url_encode(data: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(data)
}

pub fn b64url_decode(encoded: &str) -> Option<Vec<u8>> {
    URL_SAFE_NO_PAD.decode(encoded).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peppered_digest_is_stable() {
        let a = peppered_digest(&["+393331234567"], "pepper");
        let b = peppered_digest(&["+393331234567"], "pepper");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn peppered_digest_changes_with_pepper() {
        let a = peppered_digest(&["+393331234567"], "pepper-a");
        let b = peppered_digest(&["+393331234567"], "pepper-b");
        assert_ne!(a, b);
    }

    #[test]
    fn peppered_digest_matches_registry_script_format() {
        // sha256("+393331234567|s3cret") — same layout the employee registry
        // tooling uses, so hashes generated offline stay interoperable.
        use sha2::{Digest, Sha256};
        let manual = hex::encode(Sha256::digest(b"+393331234567|s3cret"));
        assert_eq!(peppered_digest(&["+393331234567"], "s3cret"), manual);
    }

    #[test]
    fn hmac_round_trip() {
        let sig = hmac_sign("secret", b"payload");
        assert!(hmac_verify("secret", b"payload", &sig));
    }

    #[test]
    fn hmac_rejects_wrong_secret() {
        let sig = hmac_sign("secret", b"payload");
        assert!(!hmac_verify("other", b"payload", &sig));
    }

    #[test]
    fn hmac_rejects_tampered_data() {
        let sig = hmac_sign("secret", b"payload");
        assert!(!hmac_verify("secret", b"payloae", &sig));
    }

    #[test]
    fn hmac_rejects_truncated_signature() {
        let sig = hmac_sign("secret", b"payload");
        assert!(!hmac_verify("secret", b"payload", &sig[..16]));
    }

    #[test]
    fn b64url_round_trip() {
        let data = b"\xff\xfe arbitrary bytes \x00";
        let encoded = b64url_encode(data);
        assert!(!encoded.contains('='));
        assert!(!encoded.contains('+'));
        assert_eq!(b64url_decode(&encoded).as_deref(), Some(data.as_slice()));
    }

    #[test]
    fn b64url_decode_rejects_garbage() {
        assert!(b64url_decode("not base64 !!!").is_none());
    }

    #[test]
    fn constant_time_eq_basic() {
        assert!(constant_time_eq("abc", "abc"));
        assert!(!constant_time_eq("abc", "abd"));
        assert!(!constant_time_eq("abc", "abcd"));
    }
}
