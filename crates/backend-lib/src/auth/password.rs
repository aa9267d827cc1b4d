// ============================
// enrol-backend-lib/src/auth/password.rs
// ============================
//! Password hashing and verification.
use scrypt::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Params, Scrypt,
};
use zeroize::Zeroize;

/// Hash a password using scrypt with a cost of `2^log_n`.
///
/// Returns the PHC string form (`$scrypt$ln=..,r=8,p=1$<salt>$<hash>`).
pub fn hash_password(plain: &str, log_n: u8) -> anyhow::Result<String> {
    let params = Params::new(
        log_n,
        Params::RECOMMENDED_R,
        Params::RECOMMENDED_P,
        Params::RECOMMENDED_LEN,
    )
    .map_err(|e| anyhow::anyhow!("invalid scrypt parameters: {e}"))?;
    let salt = SaltString::generate(&mut OsRng);
    let hash = Scrypt
        .hash_password_customized(plain.as_bytes(), None, None, params, &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {e}"))?
        .to_string();
    Ok(hash)
}

/// Verify a password against a hash
pub fn verify_password(hash: &str, plain: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Scrypt.verify_password(plain.as_bytes(), &parsed_hash).is_ok()
}

/// Hash a password and wipe the plaintext
pub fn hash_password_secure(plain: &mut String, log_n: u8) -> anyhow::Result<String> {
    let hash = hash_password(plain, log_n);
    plain.zeroize();
    hash
}
