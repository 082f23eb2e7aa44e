use parking_lot::RwLock;
use std::fmt;
use uuid::Uuid;

/// One HMAC signing key with its key id.
#[derive(Clone)]
pub struct SigningKey {
    pub kid: String,
    pub secret: Vec<u8>,
}

impl SigningKey {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            kid: format!("key_{}", Uuid::new_v4().simple()),
            secret: secret.into(),
        }
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("kid", &self.kid)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Source of signing keys.
///
/// `current` signs new tokens. `verification_keys` also includes keys
/// retired within the last token lifetime, so rotation never invalidates a
/// token before its own expiry.
pub trait SigningKeyProvider: Send + Sync {
    fn current(&self) -> SigningKey;
    fn verification_keys(&self) -> Vec<SigningKey>;
}

/// In-process key ring. Rotation keeps the most recently retired key
/// verifiable.
pub struct StaticKeyProvider {
    ring: RwLock<KeyRing>,
}

struct KeyRing {
    current: SigningKey,
    previous: Option<SigningKey>,
}

impl StaticKeyProvider {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            ring: RwLock::new(KeyRing {
                current: SigningKey::new(secret),
                previous: None,
            }),
        }
    }

    /// Swap in a new signing key. The outgoing key stays verifiable until
    /// the next rotation; callers rotate no more often than the token TTL.
    pub fn rotate(&self, new_secret: impl Into<Vec<u8>>) {
        let mut ring = self.ring.write();
        let retired = std::mem::replace(&mut ring.current, SigningKey::new(new_secret));
        ring.previous = Some(retired);
    }
}

impl SigningKeyProvider for StaticKeyProvider {
    fn current(&self) -> SigningKey {
        self.ring.read().current.clone()
    }

    fn verification_keys(&self) -> Vec<SigningKey> {
        let ring = self.ring.read();
        let mut keys = vec![ring.current.clone()];
        if let Some(previous) = &ring.previous {
            keys.push(previous.clone());
        }
        keys
    }
}
