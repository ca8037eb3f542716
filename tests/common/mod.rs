#![allow(dead_code)]

use std::sync::Arc;

use marketplace_api::{
    db::{self, DbConfig, DbPool},
    entities::item,
    events::{self, EventSender},
    handlers::AppServices,
    services::checkout::{AddressInput, CheckoutRequest},
    services::inventory::CreateItemRequest,
};
use rust_decimal::Decimal;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Service harness over a fresh in-memory SQLite database. The pool is
/// capped at one connection so every test sees a single shared database.
pub struct TestApp {
    pub db: Arc<DbPool>,
    pub services: AppServices,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        let cfg = DbConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            min_connections: 1,
            ..Default::default()
        };

        let pool = db::establish_connection_with_config(&cfg)
            .await
            .expect("failed to open test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations");

        let db = Arc::new(pool);
        let (tx, rx) = mpsc::channel(64);
        let sender = EventSender::new(tx);
        let event_task = tokio::spawn(events::process_events(rx));
        let services = AppServices::new(db.clone(), Arc::new(sender));

        Self {
            db,
            services,
            _event_task: event_task,
        }
    }
}

pub async fn seed_item(
    app: &TestApp,
    seller: Uuid,
    title: &str,
    price: Decimal,
    quantity: i32,
) -> item::Model {
    app.services
        .inventory
        .create_item(
            seller,
            CreateItemRequest {
                title: title.to_string(),
                description: String::new(),
                price,
                quantity: Some(quantity),
            },
        )
        .await
        .expect("failed to seed item")
}

pub fn checkout_request() -> CheckoutRequest {
    CheckoutRequest {
        address: AddressInput {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            street: "12 Crescent Rd".to_string(),
            city: "London".to_string(),
            state: "LDN".to_string(),
            zip_code: "N1 9GU".to_string(),
            country: "UK".to_string(),
        },
        save_address: false,
    }
}
