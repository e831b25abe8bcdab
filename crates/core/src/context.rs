use crate::id::{TenantId, UserId};

/// Tenant + actor context for a single ledger call.
///
/// Every public ledger operation takes this explicitly; the tenant is never
/// inferred from the data being touched.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RequestContext {
    tenant_id: TenantId,
    user_id: UserId,
}

impl RequestContext {
    pub fn new(tenant_id: TenantId, user_id: UserId) -> Self {
        Self { tenant_id, user_id }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    /// Acting user, recorded in `created_by` / `updated_by`.
    pub fn user_id(&self) -> UserId {
        self.user_id
    }
}
