use argon2::{Algorithm, Argon2, Params, Version};

pub fn password_hasher() -> Argon2<'static> {
    // Tuned for interactive API calls: Argon2id with moderate memory and a single iteration
    // keeps verification under 10ms on development hardware while retaining side-channel
    // protections.
    const MEMORY_COST_KIB: u32 = 768;
    const ITERATIONS: u32 = 1;
    const PARALLELISM: u32 = 1;
    let params = Params::new(MEMORY_COST_KIB, ITERATIONS, PARALLELISM, Some(32))
        .expect("valid Argon2 parameters");
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
}

/// Hash a password with the tuned hasher and a fresh random salt.
pub fn hash_password(password: &str) -> crate::errors::Result<String> {
    hash_secret(&password_hasher(), password)
}

/// Verify a password against a stored Argon2 hash.
pub fn verify_password(password: &str, stored: &str) -> crate::errors::Result<bool> {
    verify_secret(&password_hasher(), stored, password)
}

/// Hash a secret with a fresh random salt.
pub fn hash_secret(argon2: &Argon2<'_>, secret: &str) -> crate::errors::Result<String> {
    use argon2::password_hash::SaltString;
    use argon2::PasswordHasher;
    use rand::rngs::OsRng;

    let salt = SaltString::generate(&mut OsRng);
    let hash = argon2
        .hash_password(secret.as_bytes(), &salt)
        .map_err(|err| crate::errors::Error::internal(format!("Failed to hash secret: {}", err)))?;
    Ok(hash.to_string())
}

/// Verify a candidate secret against a stored Argon2 hash.
pub fn verify_secret(argon2: &Argon2<'_>, stored: &str, candidate: &str) -> crate::errors::Result<bool> {
    use argon2::{PasswordHash, PasswordVerifier};

    let parsed = PasswordHash::new(stored)
        .map_err(|err| crate::errors::Error::internal(format!("Invalid password hash: {}", err)))?;
    Ok(argon2.verify_password(candidate.as_bytes(), &parsed).is_ok())
}
