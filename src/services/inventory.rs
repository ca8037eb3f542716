use crate::{
    db::DbPool,
    entities::{
        cart_entry,
        item::{self, ItemStatus},
        order_item, Item, OrderItem,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateItemRequest {
    #[validate(length(min = 1, max = 120, message = "Title is required"))]
    pub title: String,
    #[serde(default)]
    #[validate(length(max = 2000, message = "Description is too long"))]
    pub description: String,
    #[schema(value_type = String)]
    pub price: Decimal,
    /// Number of purchasable units; defaults to one.
    pub quantity: Option<i32>,
}

/// Authoritative count of purchasable units per item. The only component
/// allowed to mutate `items.quantity`; the decrement runs exclusively on the
/// checkout transaction's connection.
#[derive(Clone)]
pub struct InventoryService {
    db: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl InventoryService {
    pub fn new(db: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Lists a new item with its initial stock.
    #[instrument(skip(self, request), fields(seller_id = %seller_id))]
    pub async fn create_item(
        &self,
        seller_id: Uuid,
        request: CreateItemRequest,
    ) -> Result<item::Model, ServiceError> {
        request.validate()?;

        if request.price < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Price cannot be negative".to_string(),
            ));
        }

        let quantity = request.quantity.unwrap_or(1);
        if quantity < 1 {
            return Err(ServiceError::ValidationError(
                "Quantity must be at least one".to_string(),
            ));
        }

        let created = item::ActiveModel {
            id: Set(Uuid::new_v4()),
            seller_id: Set(seller_id),
            title: Set(request.title),
            description: Set(request.description),
            price: Set(request.price),
            quantity: Set(quantity),
            status: Set(ItemStatus::Available),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await?;

        info!(item_id = %created.id, "Item listed");

        self.event_sender
            .send_or_log(Event::ItemListed(created.id))
            .await;

        Ok(created)
    }

    /// Reads current availability for an item.
    #[instrument(skip(self), fields(item_id = %item_id))]
    pub async fn availability(&self, item_id: Uuid) -> Result<item::Model, ServiceError> {
        Item::find_by_id(item_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Item {} not found", item_id)))
    }

    /// Lists a seller's items, newest first.
    #[instrument(skip(self), fields(seller_id = %seller_id))]
    pub async fn list_for_seller(&self, seller_id: Uuid) -> Result<Vec<item::Model>, ServiceError> {
        Item::find()
            .filter(item::Column::SellerId.eq(seller_id))
            .order_by_desc(item::Column::CreatedAt)
            .all(&*self.db)
            .await
            .map_err(Into::into)
    }

    /// Conditionally decrements an item's quantity by `requested`.
    ///
    /// The update is predicated on the row still holding enough units at
    /// write time (`quantity >= requested`); when a concurrent checkout won
    /// the race, zero rows match and the caller's transaction must abort.
    /// Items that reach zero flip to `sold`.
    pub async fn decrement_stock<C: ConnectionTrait>(
        conn: &C,
        item_id: Uuid,
        requested: i32,
    ) -> Result<(), ServiceError> {
        let res = Item::update_many()
            .col_expr(
                item::Column::Quantity,
                Expr::col(item::Column::Quantity).sub(requested),
            )
            .filter(item::Column::Id.eq(item_id))
            .filter(item::Column::Quantity.gte(requested))
            .exec(conn)
            .await?;

        if res.rows_affected == 0 {
            return Err(ServiceError::InsufficientStock(format!(
                "Item {} does not have {} unit(s) available",
                item_id, requested
            )));
        }

        Item::update_many()
            .col_expr(item::Column::Status, Expr::value(ItemStatus::Sold))
            .filter(item::Column::Id.eq(item_id))
            .filter(item::Column::Quantity.eq(0))
            .exec(conn)
            .await?;

        Ok(())
    }

    /// Deletes a listing. Items referenced by order history cannot be
    /// deleted; any cart entries pointing at the item are removed.
    #[instrument(skip(self), fields(seller_id = %seller_id, item_id = %item_id))]
    pub async fn delete_item(&self, seller_id: Uuid, item_id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;

        let item = Item::find_by_id(item_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Item {} not found", item_id)))?;

        if item.seller_id != seller_id {
            return Err(ServiceError::NotFound(format!("Item {} not found", item_id)));
        }

        let referencing = OrderItem::find()
            .filter(order_item::Column::ItemId.eq(item_id))
            .count(&txn)
            .await?;
        if referencing > 0 {
            return Err(ServiceError::Conflict(
                "Item is part of existing orders and cannot be deleted".to_string(),
            ));
        }

        cart_entry::Entity::delete_many()
            .filter(cart_entry::Column::ItemId.eq(item_id))
            .exec(&txn)
            .await?;

        Item::delete_by_id(item_id).exec(&txn).await?;

        txn.commit().await?;

        info!(item_id = %item_id, "Item deleted");
        Ok(())
    }
}
