//! The process-wide application secret.
//!
//! Every per-endpoint signing key is derived from this one value. It is read
//! once at startup from a [`SecretStore`] and passed explicitly to the signer
//! and the verification gate; nothing reads it from ambient global state.

use std::fmt;

use anyhow::Result;
use secrecy::{ExposeSecret, SecretString};

/// High-entropy secret shared by every derived endpoint key.
///
/// `Debug` output is redacted.
#[derive(Clone)]
pub struct ApplicationSecret(SecretString);

impl ApplicationSecret {
    /// Wraps existing secret material.
    pub fn new(secret: impl Into<String>) -> Self {
        Self(SecretString::new(secret.into().into()))
    }

    /// Returns the key material as bytes.
    #[must_use]
    pub fn expose_bytes(&self) -> &[u8] {
        self.0.expose_secret().as_bytes()
    }

    /// Returns the secret text, for persisting it.
    #[must_use]
    pub fn expose_str(&self) -> &str {
        self.0.expose_secret()
    }

    /// Whether the secret holds no material at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.expose_secret().is_empty()
    }
}

impl fmt::Debug for ApplicationSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApplicationSecret([REDACTED])")
    }
}

impl From<SecretString> for ApplicationSecret {
    fn from(secret: SecretString) -> Self {
        Self(secret)
    }
}

/// Persistence for the application secret.
///
/// The store is owned by the surrounding application; absence of a value means
/// setup has not completed. `store` is expected to be called at most once, when
/// the secret is first generated.
pub trait SecretStore: Send + Sync {
    /// Reads the persisted secret, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    fn load(&self) -> Result<Option<ApplicationSecret>>;

    /// Persists a freshly generated secret.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written.
    fn store(&self, secret: &ApplicationSecret) -> Result<()>;
}
