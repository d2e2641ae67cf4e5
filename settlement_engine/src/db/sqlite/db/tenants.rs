use chrono::Utc;
use sqlx::SqliteConnection;

use crate::db_types::{NewTenant, Tenant};

pub async fn fetch_tenant(tenant_id: &str, conn: &mut SqliteConnection) -> Result<Option<Tenant>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM tenants WHERE tenant_id = $1").bind(tenant_id).fetch_optional(conn).await
}

pub async fn upsert_tenant(tenant: NewTenant, conn: &mut SqliteConnection) -> Result<Tenant, sqlx::Error> {
    let now = Utc::now();
    sqlx::query_as(
        r#"
            INSERT INTO tenants (
                tenant_id,
                name,
                merchant_fee,
                tax_rate,
                delivery_webhook_secret,
                pickup_address,
                pickup_phone,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            ON CONFLICT (tenant_id) DO UPDATE SET
                name = excluded.name,
                merchant_fee = excluded.merchant_fee,
                tax_rate = excluded.tax_rate,
                delivery_webhook_secret = excluded.delivery_webhook_secret,
                pickup_address = excluded.pickup_address,
                pickup_phone = excluded.pickup_phone,
                updated_at = excluded.updated_at
            RETURNING *;
        "#,
    )
    .bind(tenant.tenant_id)
    .bind(tenant.name)
    .bind(tenant.merchant_fee)
    .bind(tenant.tax_rate)
    .bind(tenant.delivery_webhook_secret)
    .bind(tenant.pickup_address)
    .bind(tenant.pickup_phone)
    .bind(now)
    .fetch_one(conn)
    .await
}
