use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use roost_core::{HostError, HostResult, TenantId};

use crate::record::{SubdomainName, SubdomainRecord, Visibility};

/// Authoritative store of subdomain records.
///
/// The unique-name constraint enforced here is the final arbiter for
/// collisions: the resolver's cache-aside availability pre-check may pass on
/// a cold cache, and `insert` must still reject the duplicate.
#[async_trait]
pub trait SubdomainRegistry: Send + Sync {
    /// Insert a new record; rejects a name that already exists.
    async fn insert(&self, record: SubdomainRecord) -> HostResult<()>;

    /// Fetch a record by name.
    async fn fetch(&self, name: &SubdomainName) -> HostResult<SubdomainRecord>;

    /// Rename a record in place, keeping its namespace. Atomic: the new name
    /// is checked and claimed under the same guard that releases the old.
    async fn rename(&self, old: &SubdomainName, new: SubdomainName) -> HostResult<SubdomainRecord>;

    /// Update a record's visibility.
    async fn set_visibility(
        &self,
        name: &SubdomainName,
        visibility: Visibility,
    ) -> HostResult<SubdomainRecord>;

    /// Update a record's content byte size.
    async fn set_content_bytes(
        &self,
        name: &SubdomainName,
        content_bytes: u64,
    ) -> HostResult<SubdomainRecord>;

    /// Remove a record, returning it.
    async fn remove(&self, name: &SubdomainName) -> HostResult<SubdomainRecord>;

    /// Every record owned by a tenant.
    async fn list_owned(&self, owner: &TenantId) -> HostResult<Vec<SubdomainRecord>>;
}

/// In-memory registry for tests and development.
pub struct MemorySubdomainRegistry {
    records: RwLock<HashMap<SubdomainName, SubdomainRecord>>,
}

impl MemorySubdomainRegistry {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemorySubdomainRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn not_found(name: &SubdomainName) -> HostError {
    HostError::not_found(format!("subdomain '{}'", name))
}

#[async_trait]
impl SubdomainRegistry for MemorySubdomainRegistry {
    async fn insert(&self, record: SubdomainRecord) -> HostResult<()> {
        let mut records = self.records.write();
        if records.contains_key(&record.name) {
            return Err(HostError::validation(format!(
                "subdomain '{}' is already taken",
                record.name
            )));
        }
        records.insert(record.name.clone(), record);
        Ok(())
    }

    async fn fetch(&self, name: &SubdomainName) -> HostResult<SubdomainRecord> {
        self.records
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| not_found(name))
    }

    async fn rename(&self, old: &SubdomainName, new: SubdomainName) -> HostResult<SubdomainRecord> {
        let mut records = self.records.write();
        if records.contains_key(&new) {
            return Err(HostError::validation(format!(
                "subdomain '{}' is already taken",
                new
            )));
        }
        let mut record = records.remove(old).ok_or_else(|| not_found(old))?;
        record.name = new.clone();
        records.insert(new, record.clone());
        Ok(record)
    }

    async fn set_visibility(
        &self,
        name: &SubdomainName,
        visibility: Visibility,
    ) -> HostResult<SubdomainRecord> {
        let mut records = self.records.write();
        let record = records.get_mut(name).ok_or_else(|| not_found(name))?;
        record.visibility = visibility;
        Ok(record.clone())
    }

    async fn set_content_bytes(
        &self,
        name: &SubdomainName,
        content_bytes: u64,
    ) -> HostResult<SubdomainRecord> {
        let mut records = self.records.write();
        let record = records.get_mut(name).ok_or_else(|| not_found(name))?;
        record.content_bytes = content_bytes;
        Ok(record.clone())
    }

    async fn remove(&self, name: &SubdomainName) -> HostResult<SubdomainRecord> {
        self.records
            .write()
            .remove(name)
            .ok_or_else(|| not_found(name))
    }

    async fn list_owned(&self, owner: &TenantId) -> HostResult<Vec<SubdomainRecord>> {
        let records = self.records.read();
        let mut owned: Vec<SubdomainRecord> = records
            .values()
            .filter(|r| &r.owner == owner)
            .cloned()
            .collect();
        owned.sort_by(|a, b| a.name.as_str().cmp(b.name.as_str()));
        Ok(owned)
    }
}
