use crate::{
    db::DbPool,
    entities::{
        address, cart_entry,
        notification::NotificationKind,
        order::{self, OrderStatus},
        order_item,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{cart::CartService, inventory::InventoryService, notifications::NotificationService},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct AddressInput {
    #[validate(length(min = 1, message = "First name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, message = "Last name is required"))]
    pub last_name: String,
    #[validate(length(min = 1, message = "Street is required"))]
    pub street: String,
    #[validate(length(min = 1, message = "City is required"))]
    pub city: String,
    #[validate(length(min = 1, message = "State is required"))]
    pub state: String,
    #[validate(length(min = 1, message = "Zip code is required"))]
    pub zip_code: String,
    #[validate(length(min = 1, message = "Country is required"))]
    pub country: String,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CheckoutRequest {
    #[validate]
    pub address: AddressInput,
    #[serde(default)]
    pub save_address: bool,
}

#[derive(Debug, Serialize)]
pub struct CheckoutOutcome {
    pub order_id: Uuid,
    pub total: Decimal,
}

/// Converts a cart into an order as one atomic unit of work: address
/// snapshot, order and line creation, guarded inventory decrement, and cart
/// clearing all commit or roll back together. Seller notifications and the
/// event emission happen after commit.
#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    notifications: Arc<NotificationService>,
}

impl CheckoutService {
    pub fn new(
        db: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        notifications: Arc<NotificationService>,
    ) -> Self {
        Self {
            db,
            event_sender,
            notifications,
        }
    }

    #[instrument(skip(self, request), fields(buyer_id = %buyer_id))]
    pub async fn checkout(
        &self,
        buyer_id: Uuid,
        request: CheckoutRequest,
    ) -> Result<CheckoutOutcome, ServiceError> {
        request.validate()?;

        let txn = self.db.begin().await?;

        let lines = CartService::snapshot(&txn, buyer_id).await?;
        if lines.is_empty() {
            return Err(ServiceError::ValidationError("Cart is empty".to_string()));
        }

        let total: Decimal = lines
            .iter()
            .map(|line| line.item.price * Decimal::from(line.requested))
            .sum();

        let now = Utc::now();
        let addr = request.address;
        let address = address::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(buyer_id),
            first_name: Set(addr.first_name),
            last_name: Set(addr.last_name),
            street: Set(addr.street),
            city: Set(addr.city),
            state: Set(addr.state),
            zip_code: Set(addr.zip_code),
            country: Set(addr.country),
            saved: Set(request.save_address),
            created_at: Set(now),
        }
        .insert(&txn)
        .await?;

        let order_id = Uuid::new_v4();
        order::ActiveModel {
            id: Set(order_id),
            buyer_id: Set(buyer_id),
            address_id: Set(address.id),
            total: Set(total),
            status: Set(OrderStatus::Pending),
            archived: Set(false),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        }
        .insert(&txn)
        .await?;

        let mut sellers: Vec<Uuid> = Vec::new();
        for line in &lines {
            if !sellers.contains(&line.item.seller_id) {
                sellers.push(line.item.seller_id);
            }

            // One line row per unit, snapshotting seller and price.
            for _ in 0..line.requested {
                order_item::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    order_id: Set(order_id),
                    item_id: Set(line.item.id),
                    seller_id: Set(line.item.seller_id),
                    price_at_time: Set(line.item.price),
                }
                .insert(&txn)
                .await?;
            }

            // A concurrent checkout that won the race makes this fail and
            // rolls the whole order back.
            InventoryService::decrement_stock(&txn, line.item.id, line.requested).await?;
        }

        cart_entry::Entity::delete_many()
            .filter(cart_entry::Column::UserId.eq(buyer_id))
            .exec(&txn)
            .await?;

        txn.commit().await?;

        info!(order_id = %order_id, %total, "Checkout completed");

        for seller_id in sellers {
            self.notifications
                .notify_best_effort(
                    seller_id,
                    NotificationKind::OrderPlaced,
                    order_id,
                    &format!("New order #{} received", order_id),
                )
                .await;
        }

        self.event_sender
            .send_or_log(Event::OrderPlaced { order_id, buyer_id })
            .await;

        Ok(CheckoutOutcome { order_id, total })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::DatabaseConnection;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn checkout_rejects_incomplete_address_before_any_store_access() {
        let (tx, _rx) = mpsc::channel(1);
        let db = Arc::new(DatabaseConnection::Disconnected);
        let service = CheckoutService::new(
            db.clone(),
            Arc::new(EventSender::new(tx)),
            Arc::new(NotificationService::new(db)),
        );

        let request = CheckoutRequest {
            address: AddressInput {
                first_name: "Ada".to_string(),
                last_name: "Lovelace".to_string(),
                street: String::new(),
                city: "London".to_string(),
                state: "LDN".to_string(),
                zip_code: "N1".to_string(),
                country: "UK".to_string(),
            },
            save_address: false,
        };

        // A disconnected store would error differently; validation must win.
        let result = service.checkout(Uuid::new_v4(), request).await;
        assert!(matches!(result, Err(ServiceError::ValidationError(_))));
    }
}
