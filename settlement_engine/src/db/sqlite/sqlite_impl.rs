//! `SqliteDatabase` is a concrete implementation of a settlement engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`]
//! module.
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use sqlx::SqlitePool;

use super::db::{audit, db_url, ledger, new_pool, orders, refunds, tenants};
use crate::{
    db_types::{AuditLogEntry, EventKey, IdempotencyRecord, NewOrder, NewTenant, Order, OrderId, RefundRecord, Tenant},
    traits::{
        ClaimOutcome,
        EventClaim,
        IdempotencyLedger,
        LedgerError,
        OrderManagement,
        OrderStoreError,
        SettlementDatabase,
        TenantManagement,
        VersionedUpdate,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the URL in `SETTLE_DATABASE_URL`.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(&url, max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("🗃️ Creating new database connection pool for {url} with {max_connections} connections");
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Applies any outstanding schema migrations.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./src/db/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }
}

impl SettlementDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }
}

impl OrderManagement for SqliteDatabase {
    async fn insert_order(&self, order: NewOrder) -> Result<Order, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        orders::insert_order(order, &mut conn).await
    }

    async fn fetch_order_by_id(&self, order_id: &OrderId) -> Result<Option<Order>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_id(order_id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_orders_by_order_number(&self, order_number: &str) -> Result<Vec<Order>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::fetch_orders_by_order_number(order_number, &mut conn).await?;
        Ok(orders)
    }

    async fn fetch_order_by_payment_intent(&self, payment_intent_id: &str) -> Result<Option<Order>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_payment_intent(payment_intent_id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_order_by_delivery_id(&self, delivery_id: &str) -> Result<Option<Order>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_delivery_id(delivery_id, &mut conn).await?;
        Ok(order)
    }

    /// In a single atomic transaction,
    /// * writes the order if its version still matches (this is the first statement, so the write lock is taken
    ///   immediately),
    /// * records the attached refund, rolling everything back if the refund id has been seen before,
    /// * appends an audit log entry if either status changed.
    async fn update_order_versioned(&self, update: VersionedUpdate) -> Result<Order, OrderStoreError> {
        let mut tx = self.pool.begin().await?;
        let order_id = update.order.id.clone();
        let order = match orders::update_order_versioned(&update, &mut tx).await? {
            Some(order) => order,
            None => {
                let exists = orders::fetch_order_by_id(&order_id, &mut tx).await?.is_some();
                tx.rollback().await?;
                return if exists {
                    debug!("🗃️ Order {order_id} has moved past version {}", update.expected_version);
                    Err(OrderStoreError::StaleVersion(order_id))
                } else {
                    Err(OrderStoreError::OrderNotFound(order_id))
                };
            },
        };
        if let Some(refund) = &update.refund {
            if !refunds::insert_refund(refund, &mut tx).await? {
                tx.rollback().await?;
                debug!("🗃️ Refund {} on order {order_id} has already been recorded", refund.refund_id);
                return Err(OrderStoreError::DuplicateRefund(refund.refund_id.clone()));
            }
            trace!("🗃️ Refund {} of {} recorded against order {order_id}", refund.refund_id, refund.amount);
        }
        if update.status_changed() {
            audit::insert_status_change(&update, &mut tx).await?;
        }
        tx.commit().await?;
        Ok(order)
    }

    async fn refund_exists(&self, refund_id: &str) -> Result<bool, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        let exists = refunds::refund_exists(refund_id, &mut conn).await?;
        Ok(exists)
    }

    async fn fetch_refunds_for_order(&self, order_id: &OrderId) -> Result<Vec<RefundRecord>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        let refunds = refunds::fetch_refunds_for_order(order_id, &mut conn).await?;
        Ok(refunds)
    }

    async fn fetch_audit_log(&self, order_id: &OrderId) -> Result<Vec<AuditLogEntry>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        let entries = audit::fetch_audit_log(order_id, &mut conn).await?;
        Ok(entries)
    }
}

impl IdempotencyLedger for SqliteDatabase {
    async fn try_claim_event(&self, claim: &EventClaim) -> Result<ClaimOutcome, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        if let Some(record) = ledger::try_claim(claim, Utc::now(), &mut conn).await? {
            trace!("🗃️ Claimed event {}", claim.key);
            return Ok(ClaimOutcome::Claimed(record));
        }
        let existing = ledger::fetch_event(&claim.key, &mut conn)
            .await?
            .ok_or_else(|| LedgerError::RecordNotFound(claim.key.clone()))?;
        trace!("🗃️ Event {} is already in the ledger with status {}", claim.key, existing.status);
        Ok(ClaimOutcome::Existing(existing))
    }

    async fn reclaim_failed_event(&self, key: &EventKey) -> Result<Option<IdempotencyRecord>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let record = ledger::reclaim_failed(key, Utc::now(), &mut conn).await?;
        Ok(record)
    }

    async fn reclaim_stale_event(
        &self,
        key: &EventKey,
        attempts: i64,
    ) -> Result<Option<IdempotencyRecord>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let record = ledger::reclaim_stale(key, attempts, Utc::now(), &mut conn).await?;
        Ok(record)
    }

    async fn mark_event_processed(&self, key: &EventKey, result: &str) -> Result<(), LedgerError> {
        let mut conn = self.pool.acquire().await?;
        if ledger::mark_processed(key, result, Utc::now(), &mut conn).await? {
            Ok(())
        } else {
            Err(LedgerError::RecordNotFound(key.clone()))
        }
    }

    async fn mark_event_failed(&self, key: &EventKey, error: &str) -> Result<(), LedgerError> {
        let mut conn = self.pool.acquire().await?;
        if ledger::mark_failed(key, error, &mut conn).await? {
            Ok(())
        } else {
            Err(LedgerError::RecordNotFound(key.clone()))
        }
    }

    async fn fetch_event(&self, key: &EventKey) -> Result<Option<IdempotencyRecord>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let record = ledger::fetch_event(key, &mut conn).await?;
        Ok(record)
    }

    async fn fetch_unverified_events(&self, tenant_id: &str) -> Result<Vec<IdempotencyRecord>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let records = ledger::fetch_unverified(tenant_id, &mut conn).await?;
        Ok(records)
    }

    async fn purge_processed_events(&self, cutoff: DateTime<Utc>) -> Result<u64, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let count = ledger::purge_processed(cutoff, &mut conn).await?;
        debug!("🗃️ Purged {count} processed ledger records older than {cutoff}");
        Ok(count)
    }
}

impl TenantManagement for SqliteDatabase {
    async fn fetch_tenant(&self, tenant_id: &str) -> Result<Option<Tenant>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        let tenant = tenants::fetch_tenant(tenant_id, &mut conn).await?;
        Ok(tenant)
    }

    async fn upsert_tenant(&self, tenant: NewTenant) -> Result<Tenant, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        let tenant = tenants::upsert_tenant(tenant, &mut conn).await?;
        debug!("🗃️ Tenant {} settlement configuration saved", tenant.tenant_id);
        Ok(tenant)
    }
}
