use hmac::{Hmac, Mac};
use sha2::Sha256;

// Create a type alias for the HMAC-SHA256 implementation.
type HmacSha256 = Hmac<Sha256>;

/// The fixed prefix the exchange expects in the signed realtime auth payload.
const REALTIME_AUTH_PREFIX: &str = "GET/realtime";

/// Creates the HMAC-SHA256 signature for the trade-channel `auth` frame.
///
/// The exchange verifies `hex(HMAC_SHA256(secret, "GET/realtime" + expires))`,
/// where `expires` is a Unix timestamp in milliseconds after which the signature
/// is no longer accepted.
///
/// # Arguments
///
/// * `secret` - The user's API secret key.
/// * `expires` - The expiry timestamp, in milliseconds.
///
/// # Returns
///
/// A lowercase hexadecimal string representation of the signature.
pub fn sign_realtime_auth(secret: &str, expires: i64) -> String {
    sign_payload(secret, &format!("{REALTIME_AUTH_PREFIX}{expires}"))
}

fn sign_payload(secret: &str, payload: &str) -> String {
    // HMAC accepts keys of any length, so this never fails.
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");

    mac.update(payload.as_bytes());

    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_is_deterministic() {
        let a = sign_realtime_auth("test-secret", 1_700_000_010_000);
        let b = sign_realtime_auth("test-secret", 1_700_000_010_000);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn signature_changes_with_each_input() {
        let base = sign_realtime_auth("test-secret", 1_700_000_010_000);
        assert_ne!(base, sign_realtime_auth("other-secret", 1_700_000_010_000));
        assert_ne!(base, sign_realtime_auth("test-secret", 1_700_000_010_001));
    }

    #[test]
    fn signature_matches_reference_hmac() {
        // HMAC-SHA256("key", "The quick brown fox jumps over the lazy dog")
        assert_eq!(
            sign_payload("key", "The quick brown fox jumps over the lazy dog"),
            "f7bc83f430538424b13298e6aa6fb143ef4d59a14946175997479dbc2d1a3cd8"
        );
    }
}
