use roost_core::{NamespaceId, TenantId};

/// Versions are monotonically increasing integers starting here.
pub const FIRST_VERSION: u64 = 1;

/// Strategy for laying out object keys in the backing stores.
pub trait VersionKeys: Send + Sync {
    /// Key for one version of an asset.
    fn object_key(&self, owner: &TenantId, namespace: &NamespaceId, version: u64) -> String;

    /// Prefix under which every object of a namespace lives.
    fn namespace_prefix(&self, owner: &TenantId, namespace: &NamespaceId) -> String;

    /// Key for one file of a published site.
    fn site_key(&self, owner: &TenantId, namespace: &NamespaceId, path: &str) -> String {
        format!(
            "{}{}",
            self.namespace_prefix(owner, namespace),
            path.trim_start_matches('/')
        )
    }
}

/// Default layout: `{owner}/{namespace}/v{version}`.
#[derive(Debug, Clone)]
pub struct DefaultVersionKeys;

impl VersionKeys for DefaultVersionKeys {
    fn object_key(&self, owner: &TenantId, namespace: &NamespaceId, version: u64) -> String {
        format!("{}/{}/v{}", owner, namespace, version)
    }

    fn namespace_prefix(&self, owner: &TenantId, namespace: &NamespaceId) -> String {
        format!("{}/{}/", owner, namespace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versioned_key_layout() {
        let keys = DefaultVersionKeys;
        let owner = TenantId::from("t1");
        let ns = NamespaceId::from("ns_abc");

        assert_eq!(keys.object_key(&owner, &ns, 1), "t1/ns_abc/v1");
        assert_eq!(keys.object_key(&owner, &ns, 42), "t1/ns_abc/v42");
        assert!(keys.object_key(&owner, &ns, 7).starts_with(&keys.namespace_prefix(&owner, &ns)));
    }

    #[test]
    fn site_keys_strip_leading_slash() {
        let keys = DefaultVersionKeys;
        let owner = TenantId::from("t1");
        let ns = NamespaceId::from("ns_abc");

        assert_eq!(keys.site_key(&owner, &ns, "/index.html"), "t1/ns_abc/index.html");
        assert_eq!(keys.site_key(&owner, &ns, "css/site.css"), "t1/ns_abc/css/site.css");
    }
}
