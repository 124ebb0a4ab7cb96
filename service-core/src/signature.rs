use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Compute a hex-encoded HMAC-SHA256 digest of `payload`.
pub fn hmac_sha256_hex(secret: &str, payload: &str) -> Result<String, anyhow::Error> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| anyhow::anyhow!("Invalid key length: {}", e))?;
    mac.update(payload.as_bytes());
    let result = mac.finalize();
    Ok(hex::encode(result.into_bytes()))
}

/// Verify a hex-encoded HMAC-SHA256 signature using constant-time comparison.
pub fn verify_hmac_sha256_hex(
    secret: &str,
    payload: &str,
    signature: &str,
) -> Result<bool, anyhow::Error> {
    let expected = hmac_sha256_hex(secret, payload)?;

    let expected_bytes = expected.as_bytes();
    let signature_bytes = signature.as_bytes();

    if expected_bytes.len() != signature_bytes.len() {
        return Ok(false);
    }

    Ok(expected_bytes.ct_eq(signature_bytes).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_round_trips() {
        let secret = "my_secret_key";
        let payload = "order_ABC|pay_XYZ";

        let signature = hmac_sha256_hex(secret, payload).unwrap();
        assert!(!signature.is_empty());
        assert!(verify_hmac_sha256_hex(secret, payload, &signature).unwrap());
    }

    #[test]
    fn tampered_signature_is_rejected() {
        let secret = "my_secret_key";
        let payload = "order_ABC|pay_XYZ";

        let signature = hmac_sha256_hex(secret, payload).unwrap();
        let tampered: String = signature
            .chars()
            .map(|c| if c == '0' { '1' } else { '0' })
            .collect();

        assert!(!verify_hmac_sha256_hex(secret, payload, &tampered).unwrap());
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let secret = "my_secret_key";
        let signature = hmac_sha256_hex(secret, "order_ABC|pay_XYZ").unwrap();

        assert!(!verify_hmac_sha256_hex(secret, "order_ABC|pay_999", &signature).unwrap());
    }

    #[test]
    fn wrong_length_signature_is_rejected() {
        let secret = "my_secret_key";
        assert!(!verify_hmac_sha256_hex(secret, "payload", "deadbeef").unwrap());
    }
}
