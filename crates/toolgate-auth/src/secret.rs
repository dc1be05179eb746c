//! Application secret lifecycle and per-endpoint key derivation.

use std::fmt;
use std::sync::RwLock;

use anyhow::Result;
use hmac::digest::{Key, KeyInit};
use hmac::{Hmac, Mac};
use log::info;
use rand::RngCore;
use rand::rngs::OsRng;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};

use toolgate_common::{ApplicationSecret, SecretStore};

pub(crate) type HmacSha256 = Hmac<Sha256>;

/// Number of random bytes in a generated application secret.
const APPLICATION_SECRET_BYTES: usize = 32;

/// Builds an HMAC-SHA256 instance keyed with `key`.
///
/// Keys longer than the SHA-256 block are hashed first and shorter ones are
/// zero-padded, as RFC 2104 prescribes.
pub(crate) fn keyed_mac(key: &[u8]) -> HmacSha256 {
    let mut block = Key::<HmacSha256>::default();
    if key.len() > block.len() {
        let digest = Sha256::digest(key);
        block[..digest.len()].copy_from_slice(&digest);
    } else {
        block[..key.len()].copy_from_slice(key);
    }
    <HmacSha256 as KeyInit>::new(&block)
}

/// Signing key for a single endpoint, lowercase hex.
///
/// Treat as raw key material: its bytes key the request HMAC. `Debug` output
/// is redacted.
#[derive(Clone)]
pub struct EndpointSecret(SecretString);

impl EndpointSecret {
    /// Returns the key bytes used for request signing.
    #[must_use]
    pub fn expose_bytes(&self) -> &[u8] {
        self.0.expose_secret().as_bytes()
    }

    /// Returns the hex text of the key.
    #[must_use]
    pub fn expose_hex(&self) -> &str {
        self.0.expose_secret()
    }
}

impl fmt::Debug for EndpointSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EndpointSecret([REDACTED])")
    }
}

impl PartialEq for EndpointSecret {
    fn eq(&self, other: &Self) -> bool {
        use subtle::ConstantTimeEq;
        self.expose_bytes().ct_eq(other.expose_bytes()).into()
    }
}

impl Eq for EndpointSecret {}

/// Derives the signing key of `endpoint_id` from the application secret.
///
/// Computes `HMAC-SHA256(key = application_secret, message = endpoint_id)` and
/// hex-encodes it. Deterministic, so signer and verifier agree without any
/// coordination beyond the shared application secret.
#[must_use]
pub fn derive_endpoint_secret(
    endpoint_id: &str,
    application_secret: &ApplicationSecret,
) -> EndpointSecret {
    let mut mac = keyed_mac(application_secret.expose_bytes());
    mac.update(endpoint_id.as_bytes());
    let digest = mac.finalize().into_bytes();
    EndpointSecret(SecretString::new(hex::encode(digest).into()))
}

/// Generates a fresh application secret from the operating system RNG.
#[must_use]
pub fn generate_application_secret() -> ApplicationSecret {
    let mut bytes = [0u8; APPLICATION_SECRET_BYTES];
    OsRng.fill_bytes(&mut bytes);
    ApplicationSecret::new(hex::encode(bytes))
}

/// Loads the application secret, generating and persisting one if absent.
///
/// This is the one-time setup step run by the owning application before any
/// signer or gate is built.
///
/// # Errors
///
/// Returns an error if the store cannot be read or the new secret cannot be
/// persisted.
pub fn ensure_application_secret(store: &dyn SecretStore) -> Result<ApplicationSecret> {
    if let Some(existing) = store.load()?
        && !existing.is_empty()
    {
        return Ok(existing);
    }

    let secret = generate_application_secret();
    store.store(&secret)?;
    info!("Generated new application secret");
    Ok(secret)
}

/// In-process [`SecretStore`] for tests and embedders that persist elsewhere.
#[derive(Debug, Default)]
pub struct MemorySecretStore {
    secret: RwLock<Option<ApplicationSecret>>,
}

impl MemorySecretStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store already holding `secret`.
    #[must_use]
    pub fn with_secret(secret: ApplicationSecret) -> Self {
        Self {
            secret: RwLock::new(Some(secret)),
        }
    }
}

impl SecretStore for MemorySecretStore {
    fn load(&self) -> Result<Option<ApplicationSecret>> {
        let guard = self
            .secret
            .read()
            .map_err(|_| anyhow::anyhow!("secret store lock poisoned"))?;
        Ok(guard.clone())
    }

    fn store(&self, secret: &ApplicationSecret) -> Result<()> {
        let mut guard = self
            .secret
            .write()
            .map_err(|_| anyhow::anyhow!("secret store lock poisoned"))?;
        *guard = Some(secret.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use super::*;

    #[test]
    fn test_keyed_mac_matches_hmac_for_every_key_length() {
        for len in [0usize, 1, 32, 63, 64, 65, 200] {
            let key = vec![0x5a_u8; len];

            let mut ours = keyed_mac(&key);
            ours.update(b"message");
            let mut reference = <HmacSha256 as Mac>::new_from_slice(&key).unwrap();
            reference.update(b"message");

            assert_eq!(
                ours.finalize().into_bytes(),
                reference.finalize().into_bytes(),
                "key length {len}"
            );
        }
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let secret = ApplicationSecret::new("S");
        let a = derive_endpoint_secret("tool-A", &secret);
        let b = derive_endpoint_secret("tool-A", &secret);
        assert_eq!(a, b);
        assert_eq!(a.expose_hex(), b.expose_hex());
    }

    #[test]
    fn test_distinct_endpoints_get_distinct_keys() {
        let secret = ApplicationSecret::new("S");
        let a = derive_endpoint_secret("tool-A", &secret);
        let b = derive_endpoint_secret("tool-B", &secret);
        assert_ne!(a, b);
    }

    #[test]
    fn test_distinct_application_secrets_get_distinct_keys() {
        let a = derive_endpoint_secret("tool-A", &ApplicationSecret::new("S"));
        let b = derive_endpoint_secret("tool-A", &ApplicationSecret::new("T"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_derivation_matches_rfc4231_vector() {
        // RFC 4231 test case 2: key "Jefe", data "what do ya want for nothing?"
        let secret = ApplicationSecret::new("Jefe");
        let derived = derive_endpoint_secret("what do ya want for nothing?", &secret);
        assert_eq!(
            derived.expose_hex(),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_derived_key_is_lowercase_hex() {
        let derived = derive_endpoint_secret("tool-A", &ApplicationSecret::new("S"));
        assert_eq!(derived.expose_hex().len(), 64);
        assert!(
            derived
                .expose_hex()
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
        );
    }

    #[test]
    fn test_endpoint_secret_debug_is_redacted() {
        let derived = derive_endpoint_secret("tool-A", &ApplicationSecret::new("S"));
        let debug_str = format!("{derived:?}");
        assert!(debug_str.contains("[REDACTED]"));
        assert!(!debug_str.contains(derived.expose_hex()));
    }

    #[test]
    fn test_generated_secrets_are_unique() {
        let a = generate_application_secret();
        let b = generate_application_secret();
        assert_eq!(a.expose_str().len(), APPLICATION_SECRET_BYTES * 2);
        assert_ne!(a.expose_str(), b.expose_str());
    }

    #[test]
    fn test_ensure_generates_once() {
        let store = MemorySecretStore::new();
        assert!(store.load().unwrap().is_none());

        let first = ensure_application_secret(&store).unwrap();
        let second = ensure_application_secret(&store).unwrap();
        assert_eq!(first.expose_str(), second.expose_str());
        assert_eq!(
            store.load().unwrap().unwrap().expose_str(),
            first.expose_str()
        );
    }

    #[test]
    fn test_ensure_keeps_existing_secret() {
        let store = MemorySecretStore::with_secret(ApplicationSecret::new("S"));
        let secret = ensure_application_secret(&store).unwrap();
        assert_eq!(secret.expose_str(), "S");
    }

    #[test]
    fn test_ensure_replaces_empty_secret() {
        let store = MemorySecretStore::with_secret(ApplicationSecret::new(""));
        let secret = ensure_application_secret(&store).unwrap();
        assert!(!secret.is_empty());
    }
}
