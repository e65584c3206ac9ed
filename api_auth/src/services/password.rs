use std::sync::LazyLock;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use common::error::{AppError, Res};

pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Hash no account owns. Sign-ins for unknown emails verify against it so
/// they do the same argon2 work as a wrong password.
static UNOWNED_HASH: LazyLock<String> = LazyLock::new(|| {
    hash_password("unowned#Pa55word").unwrap_or_else(|e| {
        log::error!("{}", e);
        String::new()
    })
});

/// Burns one verification against [`UNOWNED_HASH`]. Always false.
pub fn verify_unowned(password: &str) -> bool {
    let _ = verify_password(password, &UNOWNED_HASH);
    false
}

/// Argon2 PHC string for `password`.
pub fn hash_password(password: &str) -> Res<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password. {}", e)))
}

/// False for a wrong password and for a stored hash that does not parse.
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    match PasswordHash::new(password_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            log::warn!("Stored password hash is not a PHC string: {}", e);
            false
        }
    }
}

/// Length plus one each of digit, lower case, upper case and symbol.
pub fn validate_password(password: &str) -> Res<()> {
    let mut missing = Vec::new();
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        missing.push(format!("at least {} characters", MIN_PASSWORD_LENGTH));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        missing.push("a digit".to_string());
    }
    if !password.chars().any(|c| c.is_lowercase()) {
        missing.push("a lower case letter".to_string());
    }
    if !password.chars().any(|c| c.is_uppercase()) {
        missing.push("an upper case letter".to_string());
    }
    if password.chars().all(|c| c.is_alphanumeric()) {
        missing.push("a non alphanumeric character".to_string());
    }

    if missing.is_empty() {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!(
            "Password must contain {}",
            missing.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_verifies_only_the_original_password() {
        let hash = hash_password("Secret#1").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("Secret#1", &hash));
        assert!(!verify_password("secret#1", &hash));
    }

    #[test]
    fn unowned_hash_is_a_real_argon2_hash() {
        assert!(UNOWNED_HASH.starts_with("$argon2"));
        assert!(!verify_unowned("unowned#Pa55word"));
        assert!(!verify_unowned("Secret#1"));
    }

    #[test]
    fn garbage_hash_never_verifies() {
        assert!(!verify_password("anything", "plain-text"));
    }

    #[test]
    fn weak_passwords_list_what_is_missing() {
        assert!(validate_password("Secret#1").is_ok());
        let err = validate_password("abc").unwrap_err().to_string();
        assert!(err.contains("at least 6 characters"), "{err}");
        assert!(err.contains("a digit"), "{err}");
        assert!(err.contains("upper case"), "{err}");
    }
}
