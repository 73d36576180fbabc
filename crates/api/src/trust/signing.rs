use hmac::{Hmac, Mac};
use sha2::Sha256;

/// Header carrying the signature on every request to the trust service.
pub const REQUEST_TOKEN_HEADER: &str = "Request-Token";

type HmacSha256 = Hmac<Sha256>;

/// Sign `method path` with the shared secret. Returns lowercase hex.
pub fn sign_request(secret: &str, method: &str, path: &str) -> String {
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        // HMAC accepts keys of any length.
        Err(_) => unreachable!("HMAC key rejected"),
    };
    mac.update(method.as_bytes());
    mac.update(b" ");
    mac.update(path.as_bytes());
    mac.finalize()
        .into_bytes()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}
