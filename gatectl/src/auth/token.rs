//! API token minting and hashing.

use base64::{Engine as _, engine::general_purpose};
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Prefix carried by every minted API token.
pub const API_TOKEN_PREFIX: &str = "gk-";

/// Generates an API token with 256 bits of entropy.
///
/// The token is formatted as `gk-{base64url_encoded_random_bytes}` where the
/// random bytes are 32 bytes of cryptographically secure random data.
pub fn generate_api_token() -> String {
    let mut token_bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut token_bytes);

    format!("{API_TOKEN_PREFIX}{}", general_purpose::URL_SAFE_NO_PAD.encode(token_bytes))
}

/// SHA-256 hash of a token, base64url-encoded. Only this hash is ever stored;
/// authentication looks tokens up by it.
pub fn hash_api_token(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    general_purpose::URL_SAFE_NO_PAD.encode(digest)
}
