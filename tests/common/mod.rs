#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use tempfile::NamedTempFile;
use uuid::Uuid;

use replenish_api::{
    config::AppConfig,
    db,
    entities::{product, sales_order, sales_order_line, supplier},
    events, AppState,
};

/// Test harness backed by a temporary SQLite database with the full schema
/// applied. Services are wired exactly as in `main`.
pub struct TestApp {
    pub state: AppState,
    _db_file: NamedTempFile,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        let db_file = NamedTempFile::new().expect("temp db file");
        let url = format!("sqlite://{}?mode=rwc", db_file.path().display());

        let cfg = AppConfig::new(url, "127.0.0.1".to_string(), 0, "test".to_string());
        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("db connect");
        db::run_migrations(&pool).await.expect("migrations");

        let (event_sender, event_rx) = events::channel(256);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let state = AppState::build(Arc::new(pool), cfg, event_sender);
        Self {
            state,
            _db_file: db_file,
            _event_task: event_task,
        }
    }

    pub async fn seed_supplier(&self, active: bool) -> Uuid {
        let id = Uuid::new_v4();
        supplier::ActiveModel {
            id: Set(id),
            name: Set(format!("Supplier {}", id.simple())),
            active: Set(active),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed supplier");
        id
    }

    pub async fn seed_product(&self, cost_price: Option<Decimal>) -> Uuid {
        let id = Uuid::new_v4();
        product::ActiveModel {
            id: Set(id),
            sku: Set(format!("SKU-{}", id.simple())),
            name: Set(format!("Product {}", id.simple())),
            cost_price: Set(cost_price),
            active: Set(true),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed product");
        id
    }

    pub async fn seed_sales_order(
        &self,
        organization_id: Uuid,
        created_at: DateTime<Utc>,
    ) -> Uuid {
        let id = Uuid::new_v4();
        sales_order::ActiveModel {
            id: Set(id),
            organization_id: Set(organization_id),
            order_number: Set(format!("SO-{}", id.simple())),
            status: Set("completed".to_string()),
            total_amount: Set(Decimal::ZERO),
            total_cogs: Set(None),
            gross_margin: Set(None),
            created_at: Set(created_at),
            updated_at: Set(created_at),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed sales order");
        id
    }

    pub async fn seed_sales_order_line(
        &self,
        sales_order_id: Uuid,
        product_id: Uuid,
        quantity: Decimal,
        unit_price: Decimal,
    ) -> Uuid {
        let id = Uuid::new_v4();
        sales_order_line::ActiveModel {
            id: Set(id),
            sales_order_id: Set(sales_order_id),
            product_id: Set(product_id),
            quantity: Set(quantity),
            unit_price: Set(unit_price),
            cost_per_unit: Set(None),
            profit_per_unit: Set(None),
            margin_percentage: Set(None),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed sales order line");
        id
    }
}
