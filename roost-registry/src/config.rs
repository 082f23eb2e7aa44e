use std::time::Duration;

/// Infrastructure-significant names no tenant may register.
pub const RESERVED_NAMES: &[&str] = &[
    "admin", "api", "app", "assets", "blog", "cdn", "dashboard", "dev", "docs", "ftp", "help",
    "mail", "ns1", "ns2", "smtp", "staging", "static", "status", "support", "test", "www",
];

/// Configuration for registration and resolution.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// How long a resolution cache entry stays servable.
    pub cache_ttl: Duration,

    /// Prefix for resolution cache keys.
    pub cache_key_prefix: String,

    /// Names reserved in addition to [`RESERVED_NAMES`].
    pub extra_reserved: Vec<String>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(300),
            cache_key_prefix: "subdomain".to_string(),
            extra_reserved: Vec::new(),
        }
    }
}

impl RegistryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_cache_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.cache_key_prefix = prefix.into();
        self
    }

    /// Reserve an additional name.
    pub fn with_reserved(mut self, name: impl Into<String>) -> Self {
        self.extra_reserved.push(name.into().to_ascii_lowercase());
        self
    }

    /// Whether a (case-folded) name is reserved.
    pub fn is_reserved(&self, name: &str) -> bool {
        RESERVED_NAMES.binary_search(&name).is_ok()
            || self.extra_reserved.iter().any(|r| r == name)
    }
}
