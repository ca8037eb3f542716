pub mod cart;
pub mod checkout;
pub mod items;
pub mod messages;
pub mod notifications;
pub mod orders;

use crate::db::DbPool;
use crate::events::EventSender;
use std::sync::Arc;

pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers.
#[derive(Clone)]
pub struct AppServices {
    pub inventory: Arc<crate::services::inventory::InventoryService>,
    pub cart: Arc<crate::services::cart::CartService>,
    pub checkout: Arc<crate::services::checkout::CheckoutService>,
    pub orders: Arc<crate::services::orders::OrderService>,
    pub notifications: Arc<crate::services::notifications::NotificationService>,
    pub messages: Arc<crate::services::messages::MessageService>,
}

impl AppServices {
    pub fn new(db: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        let notifications = Arc::new(crate::services::notifications::NotificationService::new(
            db.clone(),
        ));
        let inventory = Arc::new(crate::services::inventory::InventoryService::new(
            db.clone(),
            event_sender.clone(),
        ));
        let cart = Arc::new(crate::services::cart::CartService::new(
            db.clone(),
            event_sender.clone(),
        ));
        let checkout = Arc::new(crate::services::checkout::CheckoutService::new(
            db.clone(),
            event_sender.clone(),
            notifications.clone(),
        ));
        let orders = Arc::new(crate::services::orders::OrderService::new(
            db.clone(),
            event_sender.clone(),
            notifications.clone(),
        ));
        let messages = Arc::new(crate::services::messages::MessageService::new(
            db,
            event_sender,
        ));

        Self {
            inventory,
            cart,
            checkout,
            orders,
            notifications,
            messages,
        }
    }
}
