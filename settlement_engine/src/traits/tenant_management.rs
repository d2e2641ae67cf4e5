use crate::{
    db_types::{NewTenant, Tenant},
    traits::OrderStoreError,
};

/// Per-tenant settlement configuration: merchant fee, tax rate, webhook secret and pickup details.
#[allow(async_fn_in_trait)]
pub trait TenantManagement {
    async fn fetch_tenant(&self, tenant_id: &str) -> Result<Option<Tenant>, OrderStoreError>;

    /// Creates the tenant, or replaces the configuration of an existing one.
    async fn upsert_tenant(&self, tenant: NewTenant) -> Result<Tenant, OrderStoreError>;
}
