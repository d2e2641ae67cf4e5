use std::collections::HashMap;

use cucumber::World;
use log::*;
use settlement_engine::{
    db_types::{Order, OrderId},
    test_utils::prepare_env::{create_database, random_db_path, run_migrations},
    OrderFlowApi,
    OrderFlowError,
    RefundApi,
    SqliteDatabase,
    WebhookApi,
};

use crate::support::{fast_ledger, order_api, security, FakeProcessor};

#[derive(Default, Debug, World)]
pub struct SettlementWorld {
    pub system: Option<SettlementSystem>,
}

#[derive(Debug)]
pub struct SettlementSystem {
    pub db_path: String,
    pub db: SqliteDatabase,
    pub orders: OrderFlowApi<SqliteDatabase>,
    pub refunds: RefundApi<SqliteDatabase, FakeProcessor>,
    pub webhooks: WebhookApi<SqliteDatabase>,
    /// Order numbers used in the feature files, mapped to the generated order ids.
    pub order_ids: HashMap<String, OrderId>,
    pub last_error: Option<OrderFlowError>,
}

impl SettlementWorld {
    pub fn system(&mut self) -> &mut SettlementSystem {
        self.system.as_mut().expect("Settlement system not initialised")
    }
}

impl SettlementSystem {
    pub async fn new() -> Self {
        let url = prepare_test_env().await;
        let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating connection to database");
        debug!("Created database: {url}");
        let orders = order_api(&db);
        let refunds = RefundApi::new(orders.clone(), FakeProcessor::default());
        let webhooks = WebhookApi::new(orders.clone(), security(), fast_ledger());
        Self { db_path: url, db, orders, refunds, webhooks, order_ids: HashMap::new(), last_error: None }
    }

    pub fn order_id(&self, order_number: &str) -> OrderId {
        self.order_ids.get(order_number).cloned().unwrap_or_else(|| panic!("Order {order_number} was never created"))
    }

    pub async fn order(&self, order_number: &str) -> Order {
        let id = self.order_id(order_number);
        self.orders.fetch_order(&id).await.expect("Error fetching order")
    }

    pub fn remember(&mut self, order: &Order) {
        self.order_ids.insert(order.order_number.clone(), order.id.clone());
    }
}

pub async fn prepare_test_env() -> String {
    let path = random_db_path();
    create_database(&path).await;
    run_migrations(&path).await;
    path
}
