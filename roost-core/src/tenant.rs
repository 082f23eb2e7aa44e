use uuid::Uuid;

use crate::ids::TenantId;

/// Context carried with every hosting operation (tenant, actor, request info).
#[derive(Debug, Clone)]
pub struct TenantCtx {
    pub tenant_id: TenantId,
    pub actor_id: Option<String>,
    pub request_id: String,
}

impl TenantCtx {
    pub fn new(tenant_id: impl Into<TenantId>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            actor_id: None,
            request_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn with_actor(mut self, actor_id: impl Into<String>) -> Self {
        self.actor_id = Some(actor_id.into());
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }
}
