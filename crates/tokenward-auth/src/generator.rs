//! Opaque identifier generation
//!
//! Session codes, refresh token ids and user ids are URL-safe base64 strings drawn from
//! the operating system's CSPRNG. The alphabet is `A-Z a-z 0-9 - _` so values can travel
//! in query strings and form bodies without escaping.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use rand::rngs::OsRng;
use tracing::error;

use crate::error::{AuthError, AuthResult};

/// Length of the code that identifies an in-flight login
pub const SESSION_CODE_LENGTH: usize = 64;

/// Length of a refresh token id
pub const REFRESH_TOKEN_LENGTH: usize = 128;

/// Length of a generated user id
pub const USER_ID_LENGTH: usize = 64;

/// Produces opaque random identifiers
pub trait TokenGenerator: Send + Sync + std::fmt::Debug {
    /// Return a random string of exactly `len` characters
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Generation`] when the entropy source fails. Callers must
    /// never fall back to a weaker source.
    fn generate(&self, len: usize) -> AuthResult<String>;
}

/// Generator backed by the operating system CSPRNG
#[derive(Debug, Clone, Copy, Default)]
pub struct SecureTokenGenerator;

impl SecureTokenGenerator {
    /// Create a new generator
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl TokenGenerator for SecureTokenGenerator {
    fn generate(&self, len: usize) -> AuthResult<String> {
        // 4 base64 chars per 3 bytes
        let mut bytes = vec![0u8; (len * 3).div_ceil(4)];
        OsRng.try_fill_bytes(&mut bytes).map_err(|e| {
            error!(error = %e, "entropy source unavailable");
            AuthError::Generation(e.to_string())
        })?;

        let mut encoded = URL_SAFE_NO_PAD.encode(&bytes);
        encoded.truncate(len);
        Ok(encoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn test_standard_lengths() {
        let generator = SecureTokenGenerator::new();
        assert_eq!(
            generator.generate(SESSION_CODE_LENGTH).unwrap().len(),
            SESSION_CODE_LENGTH
        );
        assert_eq!(
            generator.generate(REFRESH_TOKEN_LENGTH).unwrap().len(),
            REFRESH_TOKEN_LENGTH
        );
        assert_eq!(generator.generate(0).unwrap(), "");
    }

    #[test]
    fn test_values_do_not_repeat() {
        let generator = SecureTokenGenerator::new();
        let seen: HashSet<String> = (0..1_000)
            .map(|_| generator.generate(SESSION_CODE_LENGTH).unwrap())
            .collect();
        assert_eq!(seen.len(), 1_000);
    }

    proptest! {
        #[test]
        fn prop_length_and_alphabet(len in 0usize..512) {
            let value = SecureTokenGenerator::new().generate(len).unwrap();
            prop_assert_eq!(value.len(), len);
            prop_assert!(value
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        }
    }
}
