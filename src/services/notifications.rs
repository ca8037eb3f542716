use crate::{
    db::DbPool,
    entities::{
        notification::{self, NotificationKind},
        Notification,
    },
    errors::ServiceError,
};
use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use std::sync::Arc;
use tracing::{instrument, warn};
use uuid::Uuid;

/// Append-only notification fan-out plus its read-side. Writes triggered
/// from checkout and status updates go through `notify_best_effort`: the
/// order row is the source of truth, notifications are a convenience layer
/// whose failure must never abort the parent operation.
#[derive(Clone)]
pub struct NotificationService {
    db: Arc<DbPool>,
}

impl NotificationService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    /// Appends one notification row.
    #[instrument(skip(self, message), fields(user_id = %user_id, reference_id = %reference_id))]
    pub async fn notify(
        &self,
        user_id: Uuid,
        kind: NotificationKind,
        reference_id: Uuid,
        message: &str,
    ) -> Result<notification::Model, ServiceError> {
        notification::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            kind: Set(kind),
            reference_id: Set(reference_id),
            message: Set(message.to_string()),
            read: Set(false),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await
        .map_err(Into::into)
    }

    /// Like `notify`, but failure is logged and swallowed. The caller has
    /// already committed its transaction.
    pub async fn notify_best_effort(
        &self,
        user_id: Uuid,
        kind: NotificationKind,
        reference_id: Uuid,
        message: &str,
    ) {
        if let Err(e) = self.notify(user_id, kind, reference_id, message).await {
            warn!(
                error = %e,
                %user_id,
                %reference_id,
                "Failed to write notification"
            );
        }
    }

    /// Unread notifications for a user, newest first.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn list_unread(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<notification::Model>, ServiceError> {
        Notification::find()
            .filter(notification::Column::UserId.eq(user_id))
            .filter(notification::Column::Read.eq(false))
            .order_by_desc(notification::Column::CreatedAt)
            .all(&*self.db)
            .await
            .map_err(Into::into)
    }

    /// Marks one notification as read. Idempotent: re-marking an already
    /// read notification is a no-op. Another user's notification reads as
    /// not found.
    #[instrument(skip(self), fields(user_id = %user_id, notification_id = %notification_id))]
    pub async fn mark_read(
        &self,
        user_id: Uuid,
        notification_id: Uuid,
    ) -> Result<(), ServiceError> {
        let res = Notification::update_many()
            .col_expr(notification::Column::Read, Expr::value(true))
            .filter(notification::Column::Id.eq(notification_id))
            .filter(notification::Column::UserId.eq(user_id))
            .exec(&*self.db)
            .await?;

        if res.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "Notification {} not found",
                notification_id
            )));
        }

        Ok(())
    }

    /// Marks all of a user's unread notifications as read; returns how many
    /// were flipped. Idempotent.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn clear_all(&self, user_id: Uuid) -> Result<u64, ServiceError> {
        let res = Notification::update_many()
            .col_expr(notification::Column::Read, Expr::value(true))
            .filter(notification::Column::UserId.eq(user_id))
            .filter(notification::Column::Read.eq(false))
            .exec(&*self.db)
            .await?;

        Ok(res.rows_affected)
    }
}
