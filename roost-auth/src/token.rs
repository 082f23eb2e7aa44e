use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use roost_core::{HostError, HostResult};
use roost_registry::SubdomainName;

use crate::keys::SigningKeyProvider;

/// Issuing configuration for view tokens.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    /// Fixed lifetime of every issued token.
    pub ttl: Duration,

    /// Apex domain sites are served under.
    pub platform_domain: String,
}

impl TokenConfig {
    pub fn new(platform_domain: impl Into<String>) -> Self {
        Self {
            ttl: Duration::hours(1),
            platform_domain: platform_domain.into(),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

/// A signed token and its expiry.
#[derive(Debug, Clone)]
pub struct ViewToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ViewClaims {
    sub: String,
    iat: i64,
    exp: i64,
}

/// Issues and verifies view tokens for private sites.
pub struct ViewTokenIssuer {
    keys: Arc<dyn SigningKeyProvider>,
    config: TokenConfig,
}

impl ViewTokenIssuer {
    pub fn new(keys: Arc<dyn SigningKeyProvider>, config: TokenConfig) -> Self {
        Self { keys, config }
    }

    /// Issue a token whose only claim is the subdomain name.
    pub fn issue(&self, name: &SubdomainName) -> HostResult<ViewToken> {
        let key = self.keys.current();
        let now = Utc::now();
        let expires_at = now + self.config.ttl;

        let claims = ViewClaims {
            sub: name.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some(key.kid.clone());

        let token = encode(&header, &claims, &EncodingKey::from_secret(&key.secret))
            .map_err(|e| HostError::configuration(format!("failed to sign view token: {}", e)))?;

        Ok(ViewToken { token, expires_at })
    }

    /// Verify a token against every currently acceptable key and return the
    /// subdomain it grants access to.
    pub fn verify(&self, token: &str) -> HostResult<SubdomainName> {
        let validation = Validation::new(Algorithm::HS256);

        for key in self.keys.verification_keys() {
            if let Ok(data) =
                decode::<ViewClaims>(token, &DecodingKey::from_secret(&key.secret), &validation)
            {
                return SubdomainName::new(&data.claims.sub);
            }
        }
        Err(HostError::authorization("invalid or expired view token"))
    }

    /// The private view URL: `https://{name}.{platform_domain}/?token={token}`.
    pub fn view_url(&self, name: &SubdomainName, token: &ViewToken) -> String {
        format!(
            "https://{}.{}/?token={}",
            name, self.config.platform_domain, token.token
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::StaticKeyProvider;

    fn create_issuer() -> (ViewTokenIssuer, Arc<StaticKeyProvider>) {
        let keys = Arc::new(StaticKeyProvider::new(b"test-secret".to_vec()));
        let issuer = ViewTokenIssuer::new(keys.clone(), TokenConfig::new("roost.site"));
        (issuer, keys)
    }

    fn name(raw: &str) -> SubdomainName {
        SubdomainName::new(raw).unwrap()
    }

    #[test]
    fn issue_verify_roundtrip() {
        let (issuer, _) = create_issuer();

        let token = issuer.issue(&name("my-site")).unwrap();
        assert!(token.expires_at > Utc::now());

        let granted = issuer.verify(&token.token).unwrap();
        assert_eq!(granted, name("my-site"));
    }

    #[test]
    fn tampered_tokens_are_rejected() {
        let (issuer, _) = create_issuer();
        let token = issuer.issue(&name("my-site")).unwrap();

        let mut tampered = token.token.clone();
        tampered.push('x');
        let err = issuer.verify(&tampered).unwrap_err();
        assert!(matches!(err, HostError::Authorization(_)));
    }

    #[test]
    fn foreign_signatures_are_rejected() {
        let (issuer, _) = create_issuer();
        let other = ViewTokenIssuer::new(
            Arc::new(StaticKeyProvider::new(b"different-secret".to_vec())),
            TokenConfig::new("roost.site"),
        );

        let token = other.issue(&name("my-site")).unwrap();
        assert!(issuer.verify(&token.token).is_err());
    }

    #[test]
    fn rotation_keeps_outstanding_tokens_valid() {
        let (issuer, keys) = create_issuer();
        let token = issuer.issue(&name("my-site")).unwrap();

        keys.rotate(b"rotated-secret".to_vec());

        // Old token still verifies via the retired key...
        assert_eq!(issuer.verify(&token.token).unwrap(), name("my-site"));

        // ...and new tokens sign with the new key.
        let fresh = issuer.issue(&name("my-site")).unwrap();
        assert_eq!(issuer.verify(&fresh.token).unwrap(), name("my-site"));
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let keys = Arc::new(StaticKeyProvider::new(b"test-secret".to_vec()));
        // Expiry far enough in the past to clear the default clock leeway.
        let issuer = ViewTokenIssuer::new(
            keys,
            TokenConfig::new("roost.site").with_ttl(Duration::seconds(-120)),
        );

        let token = issuer.issue(&name("my-site")).unwrap();
        let err = issuer.verify(&token.token).unwrap_err();
        assert!(matches!(err, HostError::Authorization(_)));
    }

    #[test]
    fn view_url_shape() {
        let (issuer, _) = create_issuer();
        let token = issuer.issue(&name("my-site")).unwrap();
        let url = issuer.view_url(&name("my-site"), &token);

        assert!(url.starts_with("https://my-site.roost.site/?token="));
        assert!(url.ends_with(&token.token));
    }
}
