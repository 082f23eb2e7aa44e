use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use roost_core::{HostError, HostResult, NamespaceId, TenantId};

/// A validated, case-folded subdomain name.
///
/// Names are folded to ASCII lowercase on construction, so `MySite` and
/// `mysite` are the same name everywhere downstream: registry keys, cache
/// keys, token claims.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubdomainName(String);

impl SubdomainName {
    /// Validate and case-fold a raw name.
    pub fn new(raw: &str) -> HostResult<Self> {
        let name = raw.trim().to_ascii_lowercase();

        if name.is_empty() || name.len() > 63 {
            return Err(HostError::validation(
                "subdomain name must be 1-63 characters",
            ));
        }
        if name.starts_with('-') || name.ends_with('-') {
            return Err(HostError::validation(
                "subdomain name must not start or end with a hyphen",
            ));
        }
        if !name
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
        {
            return Err(HostError::validation(
                "subdomain name may only contain letters, digits and hyphens",
            ));
        }

        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubdomainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who may view a published site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authoritative record for one registered subdomain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubdomainRecord {
    pub name: SubdomainName,
    pub owner: TenantId,
    pub namespace: NamespaceId,
    pub visibility: Visibility,
    pub content_bytes: u64,
    pub created_at: DateTime<Utc>,
}

impl SubdomainRecord {
    pub fn new(
        name: SubdomainName,
        owner: TenantId,
        namespace: NamespaceId,
        visibility: Visibility,
        content_bytes: u64,
    ) -> Self {
        Self {
            name,
            owner,
            namespace,
            visibility,
            content_bytes,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_case_folded() {
        let name = SubdomainName::new("MySite").unwrap();
        assert_eq!(name.as_str(), "mysite");
        assert_eq!(name, SubdomainName::new("mysite").unwrap());
    }

    #[test]
    fn rejects_bad_shapes() {
        assert!(SubdomainName::new("").is_err());
        assert!(SubdomainName::new("-leading").is_err());
        assert!(SubdomainName::new("trailing-").is_err());
        assert!(SubdomainName::new("under_score").is_err());
        assert!(SubdomainName::new("dots.here").is_err());
        assert!(SubdomainName::new(&"x".repeat(64)).is_err());
    }

    #[test]
    fn accepts_hyphenated_names() {
        assert!(SubdomainName::new("my-site-42").is_ok());
    }
}
