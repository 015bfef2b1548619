use std::sync::Arc;

use futures_util::StreamExt;
use rust_decimal::Decimal;
use uuid::Uuid;

use order_relay::broadcast::Broadcaster;
use order_relay::domain::catalog::CatalogItem;
use order_relay::domain::order::{
    AdvanceStatus, LineItemRequest, OrderError, OrderEvent, OrderService, OrderStatus, Operator, PlaceOrder,
    TransitionPolicy,
};
use order_relay::metrics::Metrics;
use order_relay::store::{InMemoryOrderStore, OrderStore};

struct Fixture {
    service: OrderService,
    store: Arc<InMemoryOrderStore>,
    acai: CatalogItem,
    granola: CatalogItem,
}

async fn fixture(policy: TransitionPolicy) -> Fixture {
    let acai = CatalogItem::new("Açaí 500ml", Decimal::new(1000, 2));
    let granola = CatalogItem::new("Granola", Decimal::new(500, 2));
    let store = Arc::new(InMemoryOrderStore::with_catalog([acai.clone(), granola.clone()]).await);
    let metrics = Arc::new(Metrics::new().unwrap());
    let service = OrderService::new(
        store.clone(),
        Broadcaster::new(64, metrics.clone()),
        policy,
        metrics,
    );
    Fixture {
        service,
        store,
        acai,
        granola,
    }
}

fn place(lines: &[(Uuid, i32)]) -> PlaceOrder {
    PlaceOrder {
        customer_name: "Fernanda".to_string(),
        table_label: Some("Mesa 7".to_string()),
        contact: Some("+55 91 99999-0000".to_string()),
        items: lines
            .iter()
            .map(|&(item_id, quantity)| LineItemRequest { item_id, quantity, notes: None })
            .collect(),
    }
}

#[tokio::test]
async fn order_walks_the_whole_lifecycle() {
    let f = fixture(TransitionPolicy::Permissive).await;
    let mut events = f.service.subscribe();

    let order = f
        .service
        .create(place(&[(f.acai.id, 2), (f.granola.id, 1)]))
        .await
        .unwrap();
    assert_eq!(order.total, Decimal::new(2500, 2));
    assert_eq!(order.status, OrderStatus::Received);
    assert_eq!(order.history.len(), 1);

    let operator = Operator { id: Uuid::new_v4(), name: Some("Admin".to_string()) };
    for status in [OrderStatus::InPreparation, OrderStatus::Ready, OrderStatus::Delivered] {
        f.service
            .advance(AdvanceStatus::new(order.id, status).by(Some(operator.clone())))
            .await
            .unwrap();
    }

    let delivered = f.service.get(order.id).await.unwrap();
    let walk: Vec<_> = delivered
        .history
        .entries()
        .iter()
        .map(|entry| (entry.previous_status, entry.new_status))
        .collect();
    assert_eq!(
        walk,
        vec![
            (OrderStatus::Received, OrderStatus::Received),
            (OrderStatus::Received, OrderStatus::InPreparation),
            (OrderStatus::InPreparation, OrderStatus::Ready),
            (OrderStatus::Ready, OrderStatus::Delivered),
        ]
    );
    assert!(delivered.history.verify_chain().is_ok());
    assert!(delivered
        .history
        .entries()
        .windows(2)
        .all(|pair| pair[0].created_at < pair[1].created_at));

    // Subscribers saw one created and three updated snapshots, versions rising.
    let mut versions = Vec::new();
    for expected_type in ["created", "updated", "updated", "updated"] {
        let event = events.next().await.unwrap();
        assert_eq!(event.event_type(), expected_type);
        assert_eq!(event.order_id(), order.id);
        versions.push(event.snapshot().version);
    }
    assert_eq!(versions, vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn catalog_price_changes_do_not_touch_existing_orders() {
    let f = fixture(TransitionPolicy::Permissive).await;
    let order = f.service.create(place(&[(f.acai.id, 3)])).await.unwrap();

    let mut repriced = f.acai.clone();
    repriced.price = Decimal::new(1500, 2);
    f.service.upsert_catalog_item(repriced).await.unwrap();

    let stored = f.service.get(order.id).await.unwrap();
    assert_eq!(stored.total, Decimal::new(3000, 2));

    let newer = f.service.create(place(&[(f.acai.id, 1)])).await.unwrap();
    assert_eq!(newer.total, Decimal::new(1500, 2));
}

#[tokio::test]
async fn unavailable_items_leave_no_trace() {
    let f = fixture(TransitionPolicy::Permissive).await;
    let mut gone = f.granola.clone();
    gone.is_available = false;
    f.store.upsert_catalog_item(gone).await.unwrap();

    let result = f.service.create(place(&[(f.acai.id, 1), (f.granola.id, 1)])).await;

    assert!(matches!(result, Err(OrderError::ItemUnavailable(ids)) if ids == vec![f.granola.id]));
    assert!(f.service.list(&[]).await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_advances_chain_consistently() {
    let f = fixture(TransitionPolicy::Permissive).await;
    let order = f.service.create(place(&[(f.acai.id, 1)])).await.unwrap();

    let mut handles = Vec::new();
    for status in [OrderStatus::InPreparation, OrderStatus::Ready] {
        let service = f.service.clone();
        let id = order.id;
        handles.push(tokio::spawn(async move {
            service.advance(AdvanceStatus::new(id, status)).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let stored = f.service.get(order.id).await.unwrap();
    assert_eq!(stored.history.len(), 3);
    assert!(stored.history.verify_chain().is_ok());
    assert_eq!(stored.history.last().unwrap().new_status, stored.status);
}

#[tokio::test]
async fn forward_only_policy_blocks_regression() {
    let f = fixture(TransitionPolicy::ForwardOnly).await;
    let order = f.service.create(place(&[(f.acai.id, 1)])).await.unwrap();
    f.service
        .advance(AdvanceStatus::new(order.id, OrderStatus::Delivered))
        .await
        .unwrap();

    let result = f
        .service
        .advance(AdvanceStatus::parse(order.id, "ready").unwrap())
        .await;
    assert!(matches!(
        result,
        Err(OrderError::BackwardTransition { from: OrderStatus::Delivered, to: OrderStatus::Ready })
    ));

    assert!(matches!(
        AdvanceStatus::parse(order.id, "cancelled"),
        Err(OrderError::InvalidStatus(raw)) if raw == "cancelled"
    ));
}

#[tokio::test]
async fn events_serialize_to_the_wire_shape() {
    let f = fixture(TransitionPolicy::Permissive).await;
    let mut events = f.service.subscribe();
    f.service.create(place(&[(f.acai.id, 1)])).await.unwrap();

    let event: OrderEvent = events.next().await.unwrap();
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["type"], "created");
    assert_eq!(json["order"]["tableLabel"], "Mesa 7");
    assert_eq!(json["order"]["history"][0]["previousStatus"], "received");
}
