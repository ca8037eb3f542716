use crate::{
    db::DbPool,
    entities::{message, message_seen, Message, MessageSeen, Order},
    errors::ServiceError,
    events::{Event, EventSender},
    services::orders::OrderService,
};
use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::OnConflict, ActiveModelTrait, ColumnTrait, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// One row of the unread overview: the latest message in an order's thread
/// the user has not seen, plus how many unseen messages that thread holds.
#[derive(Debug, Clone, Serialize)]
pub struct UnreadThread {
    pub order_id: Uuid,
    pub message_id: Uuid,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub unread_count: i64,
}

/// Order-scoped messaging between buyer and sellers, and the derived
/// unread-tracking read side.
#[derive(Clone)]
pub struct MessageService {
    db: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl MessageService {
    pub fn new(db: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Appends a message to an order's thread. Only participants may post;
    /// non-participants read as not found.
    #[instrument(skip(self, body), fields(order_id = %order_id, sender_id = %sender_id))]
    pub async fn send_message(
        &self,
        order_id: Uuid,
        sender_id: Uuid,
        body: &str,
    ) -> Result<message::Model, ServiceError> {
        if body.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "Message body is required".to_string(),
            ));
        }

        self.require_participant(order_id, sender_id).await?;

        let created = message::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            sender_id: Set(sender_id),
            body: Set(body.to_string()),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await?;

        self.event_sender
            .send_or_log(Event::MessageSent {
                order_id,
                message_id: created.id,
            })
            .await;

        Ok(created)
    }

    /// Full thread for an order, oldest first.
    #[instrument(skip(self), fields(order_id = %order_id, user_id = %user_id))]
    pub async fn thread(
        &self,
        order_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<message::Model>, ServiceError> {
        self.require_participant(order_id, user_id).await?;

        Message::find()
            .filter(message::Column::OrderId.eq(order_id))
            .order_by_asc(message::Column::CreatedAt)
            .all(&*self.db)
            .await
            .map_err(Into::into)
    }

    /// For every participating order with messages the user has not seen:
    /// the latest such message and the unseen count, ordered by recency.
    /// The user's own messages never count as unread.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn unread_overview(&self, user_id: Uuid) -> Result<Vec<UnreadThread>, ServiceError> {
        let order_ids = self.participating_order_ids(user_id).await?;
        if order_ids.is_empty() {
            return Ok(Vec::new());
        }

        let messages = Message::find()
            .filter(message::Column::OrderId.is_in(order_ids))
            .filter(message::Column::SenderId.ne(user_id))
            .order_by_desc(message::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        let seen: HashSet<Uuid> = MessageSeen::find()
            .filter(message_seen::Column::UserId.eq(user_id))
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|m| m.message_id)
            .collect();

        // Messages arrive newest first, so the first unseen one per order is
        // that thread's latest; later hits only bump the count.
        let mut index: HashMap<Uuid, usize> = HashMap::new();
        let mut overview: Vec<UnreadThread> = Vec::new();
        for msg in messages {
            if seen.contains(&msg.id) {
                continue;
            }
            match index.get(&msg.order_id) {
                Some(&i) => overview[i].unread_count += 1,
                None => {
                    index.insert(msg.order_id, overview.len());
                    overview.push(UnreadThread {
                        order_id: msg.order_id,
                        message_id: msg.id,
                        body: msg.body,
                        created_at: msg.created_at,
                        unread_count: 1,
                    });
                }
            }
        }

        Ok(overview)
    }

    /// Marks every message of one order as seen by the user. Idempotent:
    /// the unique (message_id, user_id) constraint absorbs both re-invocation
    /// and concurrent markers.
    #[instrument(skip(self), fields(order_id = %order_id, user_id = %user_id))]
    pub async fn mark_seen(&self, user_id: Uuid, order_id: Uuid) -> Result<(), ServiceError> {
        self.require_participant(order_id, user_id).await?;

        let messages = Message::find()
            .filter(message::Column::OrderId.eq(order_id))
            .all(&*self.db)
            .await?;
        if messages.is_empty() {
            return Ok(());
        }

        let message_ids: Vec<Uuid> = messages.iter().map(|m| m.id).collect();
        let already_seen: HashSet<Uuid> = MessageSeen::find()
            .filter(message_seen::Column::UserId.eq(user_id))
            .filter(message_seen::Column::MessageId.is_in(message_ids))
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|m| m.message_id)
            .collect();

        let now = Utc::now();
        let markers: Vec<message_seen::ActiveModel> = messages
            .iter()
            .filter(|m| !already_seen.contains(&m.id))
            .map(|m| message_seen::ActiveModel {
                id: Set(Uuid::new_v4()),
                message_id: Set(m.id),
                user_id: Set(user_id),
                created_at: Set(now),
            })
            .collect();

        if markers.is_empty() {
            return Ok(());
        }

        let insert = MessageSeen::insert_many(markers).on_conflict(
            OnConflict::columns([
                message_seen::Column::MessageId,
                message_seen::Column::UserId,
            ])
            .do_nothing()
            .to_owned(),
        );

        match insert.exec(&*self.db).await {
            Ok(_) | Err(DbErr::RecordNotInserted) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn require_participant(&self, order_id: Uuid, user_id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db;
        let order = Order::find_by_id(order_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        if !OrderService::is_participant(db, &order, user_id).await? {
            return Err(ServiceError::NotFound(format!(
                "Order {} not found",
                order_id
            )));
        }

        Ok(())
    }

    async fn participating_order_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>, ServiceError> {
        use crate::entities::{order, order_item, OrderItem};

        let mut ids: Vec<Uuid> = Order::find()
            .filter(order::Column::BuyerId.eq(user_id))
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|o| o.id)
            .collect();

        let sold = OrderItem::find()
            .filter(order_item::Column::SellerId.eq(user_id))
            .all(&*self.db)
            .await?;
        for line in sold {
            if !ids.contains(&line.order_id) {
                ids.push(line.order_id);
            }
        }

        Ok(ids)
    }
}
