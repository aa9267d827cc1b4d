// ============================
// crates/backend-lib/src/auth/token_generator.rs
// ============================
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
/** Random identifiers for browser sessions.
Values come straight from the OS entropy source and are safe to put in a
cookie without further encoding. */
use rand::{rngs::OsRng, RngCore};

/// Default id size in bytes (256 bits of entropy)
const DEFAULT_TOKEN_BYTES: usize = 32;

/** Generate a session identifier
# Returns
A base64 URL-safe encoded string without padding */
pub fn generate_session_id() -> String {
    generate_secure_token_with_size(DEFAULT_TOKEN_BYTES)
}

/** Generate a random token of `bytes` bytes
# Returns
A base64 URL-safe encoded string without padding */
pub fn generate_secure_token_with_size(bytes: usize) -> String {
    let mut buffer = vec![0u8; bytes];
    OsRng.fill_bytes(&mut buffer);
    URL_SAFE_NO_PAD.encode(buffer)
}
