use crate::{
    db::DbPool,
    entities::{
        address,
        notification::NotificationKind,
        order::{self, OrderStatus},
        order_item, Address, Order, OrderItem,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::notifications::NotificationService,
};
use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    #[schema(value_type = String)]
    pub status: OrderStatus,
    /// Free-text carried into the buyer notification on cancellation.
    pub message: Option<String>,
}

/// An order with its line snapshots and shipping address, as shown on the
/// buyer's and seller's order screens.
#[derive(Debug, Serialize)]
pub struct OrderDetails {
    pub order: order::Model,
    pub address: Option<address::Model>,
    pub items: Vec<order_item::Model>,
}

/// Order status machine and archival policy. Status rows are created by
/// checkout and only ever mutated here.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    notifications: Arc<NotificationService>,
}

/// The transition table. Delivered and cancelled are terminal.
fn is_valid_transition(from: OrderStatus, to: OrderStatus) -> bool {
    matches!(
        (from, to),
        (OrderStatus::Pending, OrderStatus::Shipped)
            | (OrderStatus::Pending, OrderStatus::Cancelled)
            | (OrderStatus::Shipped, OrderStatus::Delivered)
            | (OrderStatus::Shipped, OrderStatus::Cancelled)
    )
}

impl OrderService {
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

    /// Applies a status transition requested by a buyer or seller.
    ///
    /// The transition must be a legal successor of the current status.
    /// Notifications go out after commit, best-effort, and never to the
    /// actor who performed the update.
    #[instrument(skip(self, request), fields(order_id = %order_id, new_status = %request.status))]
    pub async fn update_status(
        &self,
        order_id: Uuid,
        acting_user: Uuid,
        request: UpdateOrderStatusRequest,
    ) -> Result<order::Model, ServiceError> {
        let txn = self.db.begin().await?;

        let order = Order::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let old_status = order.status;
        if !is_valid_transition(old_status, request.status) {
            return Err(ServiceError::InvalidStatus(format!(
                "Cannot transition from '{}' to '{}'",
                old_status, request.status
            )));
        }

        let buyer_id = order.buyer_id;

        let mut active: order::ActiveModel = order.into();
        active.status = Set(request.status);
        active.updated_at = Set(Some(Utc::now()));
        let updated = active.update(&txn).await?;

        txn.commit().await?;

        info!(%old_status, "Order status updated");

        match request.status {
            OrderStatus::Shipped => {
                if buyer_id != acting_user {
                    self.notifications
                        .notify_best_effort(
                            buyer_id,
                            NotificationKind::OrderStatus,
                            order_id,
                            &format!("Your order #{} has been shipped", order_id),
                        )
                        .await;
                }
            }
            OrderStatus::Cancelled => {
                if buyer_id != acting_user {
                    let reason = request
                        .message
                        .as_deref()
                        .unwrap_or("No reason provided");
                    self.notifications
                        .notify_best_effort(
                            buyer_id,
                            NotificationKind::OrderStatus,
                            order_id,
                            &format!(
                                "Your order #{} has been cancelled. Reason: {}",
                                order_id, reason
                            ),
                        )
                        .await;
                }
            }
            OrderStatus::Delivered => {
                match self.order_sellers(order_id).await {
                    Ok(sellers) => {
                        for seller_id in sellers {
                            if seller_id != acting_user {
                                self.notifications
                                    .notify_best_effort(
                                        seller_id,
                                        NotificationKind::OrderStatus,
                                        order_id,
                                        &format!(
                                            "Order #{} has been confirmed as delivered",
                                            order_id
                                        ),
                                    )
                                    .await;
                            }
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to resolve sellers for delivery notification");
                    }
                }
            }
            OrderStatus::Pending => {}
        }

        self.event_sender
            .send_or_log(Event::OrderStatusChanged {
                order_id,
                old_status: old_status.to_string(),
                new_status: request.status.to_string(),
            })
            .await;

        Ok(updated)
    }

    /// Archives one order. Only participants may archive, and only once the
    /// order has reached a terminal status. Archival is a visibility flag;
    /// the order stays queryable.
    #[instrument(skip(self), fields(order_id = %order_id, user_id = %user_id))]
    pub async fn archive_order(&self, order_id: Uuid, user_id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;

        let order = Order::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        if !order.status.is_terminal() {
            return Err(ServiceError::Conflict(
                "Only delivered or cancelled orders can be archived".to_string(),
            ));
        }

        if !Self::is_participant(&txn, &order, user_id).await? {
            return Err(ServiceError::Conflict(
                "Not a participant in this order".to_string(),
            ));
        }

        let mut active: order::ActiveModel = order.into();
        active.archived = Set(true);
        active.updated_at = Set(Some(Utc::now()));
        active.update(&txn).await?;

        txn.commit().await?;

        info!("Order archived");
        Ok(())
    }

    /// Bulk sweep: archives every terminal order the user participates in.
    /// Returns how many orders were flipped.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn archive_all(&self, user_id: Uuid) -> Result<u64, ServiceError> {
        let seller_order_ids = self.order_ids_sold_by(user_id).await?;

        let res = Order::update_many()
            .col_expr(order::Column::Archived, Expr::value(true))
            .filter(order::Column::Archived.eq(false))
            .filter(
                order::Column::Status
                    .is_in([OrderStatus::Delivered, OrderStatus::Cancelled]),
            )
            .filter(
                Condition::any()
                    .add(order::Column::BuyerId.eq(user_id))
                    .add(order::Column::Id.is_in(seller_order_ids)),
            )
            .exec(&*self.db)
            .await?;

        info!(archived = res.rows_affected, "Archived completed orders");
        Ok(res.rows_affected)
    }

    /// Orders the user participates in (as buyer or as seller of any line),
    /// newest first, with line snapshots and address.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<OrderDetails>, ServiceError> {
        let db = &*self.db;
        let seller_order_ids = self.order_ids_sold_by(user_id).await?;

        let orders = Order::find()
            .filter(
                Condition::any()
                    .add(order::Column::BuyerId.eq(user_id))
                    .add(order::Column::Id.is_in(seller_order_ids)),
            )
            .order_by_desc(order::Column::CreatedAt)
            .all(db)
            .await?;

        let order_ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
        let items = OrderItem::find()
            .filter(order_item::Column::OrderId.is_in(order_ids))
            .all(db)
            .await?;

        let address_ids: Vec<Uuid> = orders.iter().map(|o| o.address_id).collect();
        let addresses = Address::find()
            .filter(address::Column::Id.is_in(address_ids))
            .all(db)
            .await?;

        let details = orders
            .into_iter()
            .map(|o| {
                let address = addresses.iter().find(|a| a.id == o.address_id).cloned();
                let items = items
                    .iter()
                    .filter(|i| i.order_id == o.id)
                    .cloned()
                    .collect();
                OrderDetails {
                    order: o,
                    address,
                    items,
                }
            })
            .collect();

        Ok(details)
    }

    /// A participant is the buyer or a seller of any line in the order.
    pub(crate) async fn is_participant<C: ConnectionTrait>(
        conn: &C,
        order: &order::Model,
        user_id: Uuid,
    ) -> Result<bool, ServiceError> {
        if order.buyer_id == user_id {
            return Ok(true);
        }

        let sold_lines = OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order.id))
            .filter(order_item::Column::SellerId.eq(user_id))
            .count(conn)
            .await?;

        Ok(sold_lines > 0)
    }

    async fn order_sellers(&self, order_id: Uuid) -> Result<Vec<Uuid>, ServiceError> {
        let lines = OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&*self.db)
            .await?;

        let mut sellers: Vec<Uuid> = Vec::new();
        for line in lines {
            if !sellers.contains(&line.seller_id) {
                sellers.push(line.seller_id);
            }
        }
        Ok(sellers)
    }

    async fn order_ids_sold_by(&self, user_id: Uuid) -> Result<Vec<Uuid>, ServiceError> {
        let lines = OrderItem::find()
            .filter(order_item::Column::SellerId.eq(user_id))
            .all(&*self.db)
            .await?;

        let mut ids: Vec<Uuid> = Vec::new();
        for line in lines {
            if !ids.contains(&line.order_id) {
                ids.push(line.order_id);
            }
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(OrderStatus::Pending, OrderStatus::Shipped, true)]
    #[case(OrderStatus::Pending, OrderStatus::Cancelled, true)]
    #[case(OrderStatus::Shipped, OrderStatus::Delivered, true)]
    #[case(OrderStatus::Shipped, OrderStatus::Cancelled, true)]
    #[case(OrderStatus::Pending, OrderStatus::Delivered, false)]
    #[case(OrderStatus::Pending, OrderStatus::Pending, false)]
    #[case(OrderStatus::Shipped, OrderStatus::Pending, false)]
    #[case(OrderStatus::Delivered, OrderStatus::Cancelled, false)]
    #[case(OrderStatus::Delivered, OrderStatus::Shipped, false)]
    #[case(OrderStatus::Cancelled, OrderStatus::Pending, false)]
    #[case(OrderStatus::Cancelled, OrderStatus::Delivered, false)]
    fn transition_table(
        #[case] from: OrderStatus,
        #[case] to: OrderStatus,
        #[case] allowed: bool,
    ) {
        assert_eq!(is_valid_transition(from, to), allowed);
    }

    #[test]
    fn terminal_states_are_delivered_and_cancelled() {
        assert!(OrderStatus::Delivered.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(!OrderStatus::Pending.is_terminal());
        assert!(!OrderStatus::Shipped.is_terminal());
    }
}
