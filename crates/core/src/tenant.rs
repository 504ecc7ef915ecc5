//! Tenant guard primitives.
//!
//! Every core operation receives a [`Caller`] resolved by the authentication
//! layer. The tenant id is never read from request payloads.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::id::{TenantId, UserId};

/// Resolved identity an operation runs under.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Caller {
    tenant_id: TenantId,
    user_id: UserId,
}

impl Caller {
    pub fn new(tenant_id: TenantId, user_id: UserId) -> Self {
        Self { tenant_id, user_id }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }
}

/// Types carrying exactly one owning tenant.
pub trait TenantScoped {
    fn tenant_id(&self) -> TenantId;
}

/// Reject a fetched entity that does not belong to the caller's tenant.
///
/// Cross-tenant hits are reported as `NotFound` so callers cannot probe for
/// the existence of other tenants' documents. Stores already filter by tenant
/// in the query; this is the second check on the way out.
pub fn guard<T: TenantScoped>(caller: &Caller, entity: Option<T>) -> DomainResult<T> {
    match entity {
        Some(e) if e.tenant_id() == caller.tenant_id() => Ok(e),
        _ => Err(DomainError::NotFound),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Doc(TenantId);

    impl TenantScoped for Doc {
        fn tenant_id(&self) -> TenantId {
            self.0
        }
    }

    #[test]
    fn foreign_tenant_is_not_found() {
        let caller = Caller::new(TenantId::new(), UserId::new());
        let foreign = Doc(TenantId::new());
        assert_eq!(guard(&caller, Some(foreign)).err(), Some(DomainError::NotFound));
        assert_eq!(guard::<Doc>(&caller, None).err(), Some(DomainError::NotFound));
        assert!(guard(&caller, Some(Doc(caller.tenant_id()))).is_ok());
    }
}
