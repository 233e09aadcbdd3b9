use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Constant-time check of a hex HMAC-SHA256 of `body` keyed by the shared
/// server secret.
pub fn verify_signature(secret: &str, body: &[u8], signature: &str) -> bool {
  let Ok(expected) = hex::decode(signature.trim()) else {
    return false;
  };
  let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
    return false;
  };
  mac.update(body);
  mac.verify_slice(&expected).is_ok()
}

#[cfg(test)]
pub fn sign(secret: &str, body: &[u8]) -> String {
  let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
  mac.update(body);
  hex::encode(mac.finalize().into_bytes())
}
