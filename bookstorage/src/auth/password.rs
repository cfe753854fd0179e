//! Password verification against stored hashes.
//!
//! Two encodings coexist in the `users.password` column:
//!
//! - werkzeug-style `pbkdf2:sha256:<iterations>$<salt>$<hex digest>`, written by the account
//!   management pages;
//! - legacy plaintext values for accounts created before hashing was introduced.
//!
//! Verification never fails with an error: anything that cannot be parsed simply does not match.

use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use thiserror::Error;
use tracing::debug;

use crate::errors::Error;

/// Prefix that selects the PBKDF2 encoding. Anything else is compared as plaintext.
pub const PBKDF2_TAG: &str = "pbkdf2:";

/// Iteration count used when the method field omits it or it is not a number.
pub const DEFAULT_PBKDF2_ITERATIONS: u32 = 260_000;

/// Zero or negative counts still derive one block, so they run a single round.
const MIN_PBKDF2_ITERATIONS: u32 = 1;

/// A stored password, parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HashRecord {
    Plaintext(String),
    Pbkdf2Sha256 { iterations: u32, salt: Vec<u8>, digest: Vec<u8> },
}

/// Why a `pbkdf2:` value could not be parsed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HashFormatError {
    #[error("expected method$salt$digest")]
    MissingFields,
    #[error("unsupported hash method {0:?}")]
    UnsupportedMethod(String),
    #[error("digest is not a non-empty hex string")]
    InvalidDigest,
}

impl HashRecord {
    pub fn parse(stored: &str) -> Result<Self, HashFormatError> {
        if !stored.starts_with(PBKDF2_TAG) {
            return Ok(HashRecord::Plaintext(stored.to_string()));
        }

        let mut fields = stored.splitn(3, '$');
        let (Some(method), Some(salt), Some(digest_hex)) = (fields.next(), fields.next(), fields.next()) else {
            return Err(HashFormatError::MissingFields);
        };

        let mut method_parts = method.split(':');
        if method_parts.next() != Some("pbkdf2") || method_parts.next() != Some("sha256") {
            return Err(HashFormatError::UnsupportedMethod(method.to_string()));
        }
        let iterations = method_parts
            .next()
            .and_then(|n| n.parse::<i64>().ok())
            .map_or(DEFAULT_PBKDF2_ITERATIONS, iteration_count);

        let digest = hex::decode(digest_hex).map_err(|_| HashFormatError::InvalidDigest)?;
        // An empty digest would compare equal to an empty derived key for every password
        if digest.is_empty() {
            return Err(HashFormatError::InvalidDigest);
        }

        Ok(HashRecord::Pbkdf2Sha256 {
            iterations,
            salt: salt.as_bytes().to_vec(),
            digest,
        })
    }

    /// Check `supplied` against this record.
    pub fn verify(&self, supplied: &str) -> bool {
        match self {
            HashRecord::Plaintext(value) => constant_time_eq(value.as_bytes(), supplied.as_bytes()),
            HashRecord::Pbkdf2Sha256 { iterations, salt, digest } => {
                let mut derived = vec![0u8; digest.len()];
                pbkdf2_hmac::<Sha256>(supplied.as_bytes(), salt, *iterations, &mut derived);
                constant_time_eq(&derived, digest)
            }
        }
    }
}

/// Verify a supplied password against the stored value. Total: malformed hashes yield `false`.
pub fn verify_password(stored: &str, supplied: &str) -> bool {
    match HashRecord::parse(stored) {
        Ok(record) => record.verify(supplied),
        Err(e) => {
            debug!("Stored password hash is malformed: {}", e);
            false
        }
    }
}

/// [`verify_password`] on the blocking thread pool, since PBKDF2 is deliberately slow.
pub async fn verify_password_blocking(stored: String, supplied: String) -> Result<bool, Error> {
    tokio::task::spawn_blocking(move || verify_password(&stored, &supplied))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password verification task: {e}"),
        })
}

/// Clamp a parsed count into the range PBKDF2 accepts. Counts beyond `u32` use the default.
fn iteration_count(parsed: i64) -> u32 {
    if parsed < i64::from(MIN_PBKDF2_ITERATIONS) {
        MIN_PBKDF2_ITERATIONS
    } else {
        u32::try_from(parsed).unwrap_or(DEFAULT_PBKDF2_ITERATIONS)
    }
}

/// Constant-time comparison. Length is not secret.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
