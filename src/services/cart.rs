use crate::{
    db::DbPool,
    entities::{
        cart_entry,
        item::{self, ItemStatus},
        CartEntry, Item,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// A cart position: the listing plus how many units the user has requested
/// (cart rows encode multiplicity, one row per unit).
#[derive(Debug, Clone, Serialize)]
pub struct CartLine {
    pub item: item::Model,
    pub requested: i32,
}

#[derive(Clone)]
pub struct CartService {
    db: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl CartService {
    pub fn new(db: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Adds one unit of an item to the user's cart.
    ///
    /// Sellers cannot buy their own listings, and a user cannot hold more
    /// cart rows for an item than the item has units.
    #[instrument(skip(self), fields(user_id = %user_id, item_id = %item_id))]
    pub async fn add_to_cart(&self, user_id: Uuid, item_id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;

        let item = Item::find_by_id(item_id)
            .one(&txn)
            .await?
            .filter(|i| i.status == ItemStatus::Available)
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Item {} not found or unavailable", item_id))
            })?;

        if item.seller_id == user_id {
            return Err(ServiceError::ValidationError(
                "Cannot purchase your own item".to_string(),
            ));
        }

        if item.quantity <= 0 {
            return Err(ServiceError::Conflict("Item is out of stock".to_string()));
        }

        let in_cart = CartEntry::find()
            .filter(cart_entry::Column::UserId.eq(user_id))
            .filter(cart_entry::Column::ItemId.eq(item_id))
            .count(&txn)
            .await?;

        if in_cart >= item.quantity as u64 {
            return Err(ServiceError::Conflict(
                "No more units of this item are available".to_string(),
            ));
        }

        cart_entry::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            item_id: Set(item_id),
            created_at: Set(Utc::now()),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartEntryAdded { user_id, item_id })
            .await;

        Ok(())
    }

    /// Removes all of the user's cart rows for an item.
    #[instrument(skip(self), fields(user_id = %user_id, item_id = %item_id))]
    pub async fn remove_from_cart(&self, user_id: Uuid, item_id: Uuid) -> Result<(), ServiceError> {
        CartEntry::delete_many()
            .filter(cart_entry::Column::UserId.eq(user_id))
            .filter(cart_entry::Column::ItemId.eq(item_id))
            .exec(&*self.db)
            .await?;

        info!("Removed item from cart");
        Ok(())
    }

    /// Current cart contents with per-item multiplicity.
    pub async fn view_cart(&self, user_id: Uuid) -> Result<Vec<CartLine>, ServiceError> {
        Self::snapshot(&*self.db, user_id).await
    }

    /// Reads the cart on the supplied connection. Checkout calls this inside
    /// its transaction so the snapshot and the inventory writes observe the
    /// same state.
    pub(crate) async fn snapshot<C: ConnectionTrait>(
        conn: &C,
        user_id: Uuid,
    ) -> Result<Vec<CartLine>, ServiceError> {
        let rows = CartEntry::find()
            .filter(cart_entry::Column::UserId.eq(user_id))
            .find_also_related(Item)
            .order_by_asc(cart_entry::Column::CreatedAt)
            .all(conn)
            .await?;

        let mut lines: Vec<CartLine> = Vec::new();
        for (entry, item) in rows {
            let item = item.ok_or_else(|| {
                ServiceError::InternalError(format!(
                    "Cart entry {} references a missing item",
                    entry.id
                ))
            })?;

            match lines.iter_mut().find(|line| line.item.id == item.id) {
                Some(line) => line.requested += 1,
                None => lines.push(CartLine { item, requested: 1 }),
            }
        }

        Ok(lines)
    }
}
