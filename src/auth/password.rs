//! PBKDF2-SHA256 password hashes in the `pbkdf2:sha256:<rounds>$<salt>$<hex>` format.

use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;

use super::constant_time_compare;

const METHOD_PREFIX: &str = "pbkdf2:sha256";

/// Hash `password` with a fresh random salt.
pub fn hash_password(password: &str, rounds: u32) -> String {
    let salt = uuid::Uuid::new_v4().simple().to_string();
    let digest = derive(password, &salt, rounds);
    format!("{}:{}${}${}", METHOD_PREFIX, rounds, salt, digest)
}

/// Check `password` against a stored hash. Unknown formats never verify.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.splitn(3, '$');
    let (Some(method), Some(salt), Some(expected)) = (parts.next(), parts.next(), parts.next())
    else {
        return false;
    };

    let Some(rounds) = method
        .strip_prefix(METHOD_PREFIX)
        .and_then(|rest| rest.strip_prefix(':'))
        .and_then(|r| r.parse::<u32>().ok())
        .filter(|r| *r > 0)
    else {
        tracing::warn!("Unsupported password hash method: {}", method);
        return false;
    };

    constant_time_compare(&derive(password, salt, rounds), expected)
}

fn derive(password: &str, salt: &str, rounds: u32) -> String {
    let mut out = [0u8; 32];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt.as_bytes(), rounds, &mut out);
    out.iter().map(|b| format!("{:02x}", b)).collect()
}
