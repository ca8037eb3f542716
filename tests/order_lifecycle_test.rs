mod common;

use assert_matches::assert_matches;
use common::{checkout_request, seed_item, TestApp};
use marketplace_api::{
    entities::{order::OrderStatus, Order},
    errors::ServiceError,
    services::orders::UpdateOrderStatusRequest,
};
use rust_decimal_macros::dec;
use sea_orm::EntityTrait;
use uuid::Uuid;

async fn place_order(app: &TestApp, seller: Uuid, buyer: Uuid) -> Uuid {
    let item = seed_item(app, seller, "Wool scarf", dec!(20.00), 1).await;
    app.services.cart.add_to_cart(buyer, item.id).await.unwrap();
    app.services
        .checkout
        .checkout(buyer, checkout_request())
        .await
        .unwrap()
        .order_id
}

fn to_status(status: OrderStatus, message: Option<&str>) -> UpdateOrderStatusRequest {
    UpdateOrderStatusRequest {
        status,
        message: message.map(str::to_string),
    }
}

async fn current_status(app: &TestApp, order_id: Uuid) -> OrderStatus {
    Order::find_by_id(order_id)
        .one(&*app.db)
        .await
        .unwrap()
        .unwrap()
        .status
}

#[tokio::test]
async fn legal_transitions_walk_the_lifecycle() {
    let app = TestApp::new().await;
    let seller = Uuid::new_v4();
    let buyer = Uuid::new_v4();
    let order_id = place_order(&app, seller, buyer).await;

    assert_eq!(current_status(&app, order_id).await, OrderStatus::Pending);

    app.services
        .orders
        .update_status(order_id, seller, to_status(OrderStatus::Shipped, None))
        .await
        .unwrap();
    assert_eq!(current_status(&app, order_id).await, OrderStatus::Shipped);

    app.services
        .orders
        .update_status(order_id, buyer, to_status(OrderStatus::Delivered, None))
        .await
        .unwrap();
    assert_eq!(current_status(&app, order_id).await, OrderStatus::Delivered);
}

#[tokio::test]
async fn illegal_transitions_are_rejected() {
    let app = TestApp::new().await;
    let seller = Uuid::new_v4();
    let buyer = Uuid::new_v4();
    let order_id = place_order(&app, seller, buyer).await;

    // Delivery requires shipment first.
    let result = app
        .services
        .orders
        .update_status(order_id, buyer, to_status(OrderStatus::Delivered, None))
        .await;
    assert_matches!(result, Err(ServiceError::InvalidStatus(_)));

    // Self-transitions are not in the table.
    let result = app
        .services
        .orders
        .update_status(order_id, seller, to_status(OrderStatus::Pending, None))
        .await;
    assert_matches!(result, Err(ServiceError::InvalidStatus(_)));

    // Unknown orders read as not found.
    let result = app
        .services
        .orders
        .update_status(Uuid::new_v4(), seller, to_status(OrderStatus::Shipped, None))
        .await;
    assert_matches!(result, Err(ServiceError::NotFound(_)));
}

#[tokio::test]
async fn terminal_states_accept_no_further_transition() {
    let app = TestApp::new().await;
    let seller = Uuid::new_v4();
    let buyer = Uuid::new_v4();

    let cancelled = place_order(&app, seller, buyer).await;
    app.services
        .orders
        .update_status(cancelled, seller, to_status(OrderStatus::Cancelled, None))
        .await
        .unwrap();
    for next in [
        OrderStatus::Pending,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
    ] {
        let result = app
            .services
            .orders
            .update_status(cancelled, seller, to_status(next, None))
            .await;
        assert_matches!(result, Err(ServiceError::InvalidStatus(_)));
    }

    let delivered = place_order(&app, seller, buyer).await;
    app.services
        .orders
        .update_status(delivered, seller, to_status(OrderStatus::Shipped, None))
        .await
        .unwrap();
    app.services
        .orders
        .update_status(delivered, buyer, to_status(OrderStatus::Delivered, None))
        .await
        .unwrap();
    let result = app
        .services
        .orders
        .update_status(delivered, buyer, to_status(OrderStatus::Cancelled, None))
        .await;
    assert_matches!(result, Err(ServiceError::InvalidStatus(_)));
}

#[tokio::test]
async fn buyer_is_notified_on_shipment_and_cancellation() {
    let app = TestApp::new().await;
    let seller = Uuid::new_v4();
    let buyer = Uuid::new_v4();

    let shipped = place_order(&app, seller, buyer).await;
    app.services
        .orders
        .update_status(shipped, seller, to_status(OrderStatus::Shipped, None))
        .await
        .unwrap();

    let unread = app.services.notifications.list_unread(buyer).await.unwrap();
    assert_eq!(unread.len(), 1);
    assert!(unread[0].message.contains("has been shipped"));
    assert_eq!(unread[0].reference_id, shipped);

    let cancelled = place_order(&app, seller, buyer).await;
    app.services
        .orders
        .update_status(
            cancelled,
            seller,
            to_status(OrderStatus::Cancelled, Some("Damaged in storage")),
        )
        .await
        .unwrap();

    let unread = app.services.notifications.list_unread(buyer).await.unwrap();
    assert_eq!(unread.len(), 2);
    assert!(unread
        .iter()
        .any(|n| n.message.contains("cancelled") && n.message.contains("Damaged in storage")));
}

#[tokio::test]
async fn status_notifications_never_reach_the_actor() {
    let app = TestApp::new().await;
    let seller = Uuid::new_v4();
    let buyer = Uuid::new_v4();
    let order_id = place_order(&app, seller, buyer).await;

    app.services
        .orders
        .update_status(order_id, seller, to_status(OrderStatus::Shipped, None))
        .await
        .unwrap();

    // The buyer confirms delivery; the seller is notified, the buyer is not.
    app.services
        .orders
        .update_status(order_id, buyer, to_status(OrderStatus::Delivered, None))
        .await
        .unwrap();

    let seller_unread = app
        .services
        .notifications
        .list_unread(seller)
        .await
        .unwrap();
    assert!(seller_unread
        .iter()
        .any(|n| n.message.contains("confirmed as delivered")));

    let buyer_unread = app.services.notifications.list_unread(buyer).await.unwrap();
    assert!(!buyer_unread.iter().any(|n| n.message.contains("delivered")));
}

#[tokio::test]
async fn cancelling_own_order_produces_no_self_notification() {
    let app = TestApp::new().await;
    let seller = Uuid::new_v4();
    let buyer = Uuid::new_v4();
    let order_id = place_order(&app, seller, buyer).await;

    app.services
        .orders
        .update_status(
            order_id,
            buyer,
            to_status(OrderStatus::Cancelled, Some("Changed my mind")),
        )
        .await
        .unwrap();

    assert!(app
        .services
        .notifications
        .list_unread(buyer)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn archive_requires_terminal_status_and_participation() {
    let app = TestApp::new().await;
    let seller = Uuid::new_v4();
    let buyer = Uuid::new_v4();
    let order_id = place_order(&app, seller, buyer).await;

    // Pending orders are not archivable.
    let result = app.services.orders.archive_order(order_id, buyer).await;
    assert_matches!(result, Err(ServiceError::Conflict(_)));

    app.services
        .orders
        .update_status(order_id, seller, to_status(OrderStatus::Shipped, None))
        .await
        .unwrap();
    app.services
        .orders
        .update_status(order_id, buyer, to_status(OrderStatus::Delivered, None))
        .await
        .unwrap();

    // Strangers are not participants.
    let result = app
        .services
        .orders
        .archive_order(order_id, Uuid::new_v4())
        .await;
    assert_matches!(result, Err(ServiceError::Conflict(_)));

    // Unknown orders read as not found.
    let result = app.services.orders.archive_order(Uuid::new_v4(), buyer).await;
    assert_matches!(result, Err(ServiceError::NotFound(_)));

    // Buyer and seller both qualify; archived orders stay queryable.
    app.services
        .orders
        .archive_order(order_id, buyer)
        .await
        .unwrap();
    let details = app.services.orders.list_for_user(buyer).await.unwrap();
    assert_eq!(details.len(), 1);
    assert!(details[0].order.archived);
    assert_eq!(details[0].order.status, OrderStatus::Delivered);
}

#[tokio::test]
async fn archive_all_sweeps_only_terminal_orders() {
    let app = TestApp::new().await;
    let seller = Uuid::new_v4();
    let buyer = Uuid::new_v4();

    let done = place_order(&app, seller, buyer).await;
    app.services
        .orders
        .update_status(done, seller, to_status(OrderStatus::Shipped, None))
        .await
        .unwrap();
    app.services
        .orders
        .update_status(done, buyer, to_status(OrderStatus::Delivered, None))
        .await
        .unwrap();

    let open = place_order(&app, seller, buyer).await;

    let archived = app.services.orders.archive_all(buyer).await.unwrap();
    assert_eq!(archived, 1);

    assert!(Order::find_by_id(done)
        .one(&*app.db)
        .await
        .unwrap()
        .unwrap()
        .archived);
    assert!(!Order::find_by_id(open)
        .one(&*app.db)
        .await
        .unwrap()
        .unwrap()
        .archived);

    // Re-running the sweep finds nothing left to do.
    assert_eq!(app.services.orders.archive_all(buyer).await.unwrap(), 0);

    // The seller's sweep also finds nothing: the order is already archived.
    assert_eq!(app.services.orders.archive_all(seller).await.unwrap(), 0);
}
