mod common;

use std::time::Duration;

use assert_matches::assert_matches;
use common::{checkout_request, seed_item, TestApp};
use marketplace_api::{
    entities::{message_seen, notification::NotificationKind, MessageSeen},
    errors::ServiceError,
};
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use uuid::Uuid;

async fn place_order(app: &TestApp, seller: Uuid, buyer: Uuid) -> Uuid {
    let item = seed_item(app, seller, "Record player", dec!(60.00), 1).await;
    app.services.cart.add_to_cart(buyer, item.id).await.unwrap();
    app.services
        .checkout
        .checkout(buyer, checkout_request())
        .await
        .unwrap()
        .order_id
}

// Message ordering keys on creation time; space the writes out.
async fn pause() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

#[tokio::test]
async fn unread_overview_returns_latest_message_and_count_per_order() {
    let app = TestApp::new().await;
    let seller = Uuid::new_v4();
    let buyer = Uuid::new_v4();
    let order_id = place_order(&app, seller, buyer).await;

    app.services
        .messages
        .send_message(order_id, seller, "Shipping tomorrow")
        .await
        .unwrap();
    pause().await;
    app.services
        .messages
        .send_message(order_id, seller, "On its way!")
        .await
        .unwrap();

    let overview = app.services.messages.unread_overview(buyer).await.unwrap();
    assert_eq!(overview.len(), 1);
    assert_eq!(overview[0].order_id, order_id);
    assert_eq!(overview[0].unread_count, 2);
    assert_eq!(overview[0].body, "On its way!");

    // Senders never see their own messages as unread.
    assert!(app
        .services
        .messages
        .unread_overview(seller)
        .await
        .unwrap()
        .is_empty());

    // A reply flows the other way only.
    pause().await;
    app.services
        .messages
        .send_message(order_id, buyer, "Thanks!")
        .await
        .unwrap();

    let seller_overview = app.services.messages.unread_overview(seller).await.unwrap();
    assert_eq!(seller_overview.len(), 1);
    assert_eq!(seller_overview[0].unread_count, 1);
    assert_eq!(seller_overview[0].body, "Thanks!");

    let buyer_overview = app.services.messages.unread_overview(buyer).await.unwrap();
    assert_eq!(buyer_overview.len(), 1);
    assert_eq!(buyer_overview[0].unread_count, 2);
}

#[tokio::test]
async fn recent_threads_come_first() {
    let app = TestApp::new().await;
    let seller = Uuid::new_v4();
    let buyer = Uuid::new_v4();
    let first = place_order(&app, seller, buyer).await;
    let second = place_order(&app, seller, buyer).await;

    app.services
        .messages
        .send_message(first, seller, "About your first order")
        .await
        .unwrap();
    pause().await;
    app.services
        .messages
        .send_message(second, seller, "About your second order")
        .await
        .unwrap();

    let overview = app.services.messages.unread_overview(buyer).await.unwrap();
    assert_eq!(overview.len(), 2);
    assert_eq!(overview[0].order_id, second);
    assert_eq!(overview[1].order_id, first);
}

#[tokio::test]
async fn mark_seen_is_bulk_and_idempotent() {
    let app = TestApp::new().await;
    let seller = Uuid::new_v4();
    let buyer = Uuid::new_v4();
    let order_id = place_order(&app, seller, buyer).await;

    app.services
        .messages
        .send_message(order_id, seller, "First")
        .await
        .unwrap();
    pause().await;
    app.services
        .messages
        .send_message(order_id, seller, "Second")
        .await
        .unwrap();

    app.services.messages.mark_seen(buyer, order_id).await.unwrap();
    assert!(app
        .services
        .messages
        .unread_overview(buyer)
        .await
        .unwrap()
        .is_empty());

    // Marking again neither errors nor duplicates markers.
    app.services.messages.mark_seen(buyer, order_id).await.unwrap();
    let markers = MessageSeen::find()
        .filter(message_seen::Column::UserId.eq(buyer))
        .count(&*app.db)
        .await
        .unwrap();
    assert_eq!(markers, 2);

    // Only messages that arrive afterwards count as unread again.
    pause().await;
    app.services
        .messages
        .send_message(order_id, seller, "Third")
        .await
        .unwrap();
    let overview = app.services.messages.unread_overview(buyer).await.unwrap();
    assert_eq!(overview.len(), 1);
    assert_eq!(overview[0].unread_count, 1);
    assert_eq!(overview[0].body, "Third");
}

#[tokio::test]
async fn threads_are_scoped_to_participants() {
    let app = TestApp::new().await;
    let seller = Uuid::new_v4();
    let buyer = Uuid::new_v4();
    let stranger = Uuid::new_v4();
    let order_id = place_order(&app, seller, buyer).await;

    app.services
        .messages
        .send_message(order_id, seller, "Hello")
        .await
        .unwrap();

    // Both participants can read the thread in order.
    let thread = app.services.messages.thread(order_id, buyer).await.unwrap();
    assert_eq!(thread.len(), 1);
    assert_eq!(thread[0].sender_id, seller);

    // Non-participants cannot observe that the order exists at all.
    assert_matches!(
        app.services.messages.thread(order_id, stranger).await,
        Err(ServiceError::NotFound(_))
    );
    assert_matches!(
        app.services
            .messages
            .send_message(order_id, stranger, "Let me in")
            .await,
        Err(ServiceError::NotFound(_))
    );
    assert_matches!(
        app.services.messages.mark_seen(stranger, order_id).await,
        Err(ServiceError::NotFound(_))
    );
    assert!(app
        .services
        .messages
        .unread_overview(stranger)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn notification_read_tracking_is_idempotent() {
    let app = TestApp::new().await;
    let user = Uuid::new_v4();
    let order_a = Uuid::new_v4();
    let order_b = Uuid::new_v4();

    let first = app
        .services
        .notifications
        .notify(user, NotificationKind::OrderStatus, order_a, "First")
        .await
        .unwrap();
    pause().await;
    app.services
        .notifications
        .notify(user, NotificationKind::OrderStatus, order_b, "Second")
        .await
        .unwrap();

    // Newest first.
    let unread = app.services.notifications.list_unread(user).await.unwrap();
    assert_eq!(unread.len(), 2);
    assert_eq!(unread[0].message, "Second");

    // Marking one as read twice is a no-op the second time.
    app.services
        .notifications
        .mark_read(user, first.id)
        .await
        .unwrap();
    app.services
        .notifications
        .mark_read(user, first.id)
        .await
        .unwrap();
    assert_eq!(
        app.services
            .notifications
            .list_unread(user)
            .await
            .unwrap()
            .len(),
        1
    );

    // Another user's notification reads as not found.
    assert_matches!(
        app.services
            .notifications
            .mark_read(Uuid::new_v4(), first.id)
            .await,
        Err(ServiceError::NotFound(_))
    );
    assert_matches!(
        app.services.notifications.mark_read(user, Uuid::new_v4()).await,
        Err(ServiceError::NotFound(_))
    );

    // Clearing flips the rest; a second sweep has nothing to do.
    assert_eq!(app.services.notifications.clear_all(user).await.unwrap(), 1);
    assert!(app
        .services
        .notifications
        .list_unread(user)
        .await
        .unwrap()
        .is_empty());
    assert_eq!(app.services.notifications.clear_all(user).await.unwrap(), 0);
}
