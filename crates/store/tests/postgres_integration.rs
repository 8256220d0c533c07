//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency. Every test
//! works on freshly generated ids, so they can run in parallel.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal_macros::dec;
use sqlx::PgPool;
use store::{
    BuyerId, CartKey, CartLine, Item, ItemId, MarketStore, PostgresMarketStore, SaleId,
    SaleRecord, StoreError, StoreTransaction, VendorId,
};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();

            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_market_tables.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();

            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a store with its own pool on the shared database
async fn get_test_store() -> PostgresMarketStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    PostgresMarketStore::new(pool)
}

async fn seed_item(store: &PostgresMarketStore, quantity: u32) -> Item {
    let item = Item::new(VendorId::new(), "Widget", dec!(10.00), quantity);
    store.insert_item(item.clone()).await.unwrap();
    item
}

fn sale_for(item: &Item, quantity: u32, key: Option<&str>) -> SaleRecord {
    SaleRecord {
        id: SaleId::new(),
        buyer_id: BuyerId::new(),
        vendor_id: item.vendor_id,
        item_id: item.id,
        price_paid: item.price,
        quantity_bought: quantity,
        created_at: Utc::now(),
        idempotency_key: key.map(String::from),
    }
}

#[tokio::test]
async fn item_roundtrip_preserves_decimal_scale() {
    let store = get_test_store().await;
    let item = Item::new(VendorId::new(), "Precise", dec!(1.50), 3);
    store.insert_item(item.clone()).await.unwrap();

    let loaded = store.get_item(item.id).await.unwrap().unwrap();
    assert_eq!(loaded, item);
    assert_eq!(loaded.price.scale(), 2);

    assert!(store.get_item(ItemId::new()).await.unwrap().is_none());
}

#[tokio::test]
async fn cart_primary_key_rejects_duplicates() {
    let store = get_test_store().await;
    let key = CartKey::new(BuyerId::new(), VendorId::new(), ItemId::new());

    assert!(store.insert_cart_line(CartLine::new(key, 2)).await.unwrap());
    assert!(!store.insert_cart_line(CartLine::new(key, 7)).await.unwrap());

    let line = store.get_cart_line(key).await.unwrap().unwrap();
    assert_eq!(line.quantity, 2);
}

#[tokio::test]
async fn cart_update_delete_and_clear() {
    let store = get_test_store().await;
    let buyer = BuyerId::new();
    let vendor = VendorId::new();
    let key = CartKey::new(buyer, vendor, ItemId::new());

    assert!(!store.update_cart_line_quantity(key, 4).await.unwrap());
    store.insert_cart_line(CartLine::new(key, 1)).await.unwrap();
    assert!(store.update_cart_line_quantity(key, 4).await.unwrap());
    assert_eq!(store.get_cart_line(key).await.unwrap().unwrap().quantity, 4);

    assert!(store.delete_cart_line(key).await.unwrap());
    assert!(!store.delete_cart_line(key).await.unwrap());

    for _ in 0..2 {
        let key = CartKey::new(buyer, vendor, ItemId::new());
        store.insert_cart_line(CartLine::new(key, 1)).await.unwrap();
    }
    assert_eq!(store.list_cart_lines(buyer).await.unwrap().len(), 2);
    assert_eq!(store.clear_cart_lines(buyer).await.unwrap(), 2);
    assert_eq!(store.clear_cart_lines(buyer).await.unwrap(), 0);
}

#[tokio::test]
async fn conditional_decrement_and_sale_commit_together() {
    let store = get_test_store().await;
    let item = seed_item(&store, 3).await;
    let sale = sale_for(&item, 2, None);

    let mut tx = store.begin().await.unwrap();
    assert!(
        tx.decrement_stock_if_available(item.id, item.vendor_id, 2)
            .await
            .unwrap()
    );
    tx.insert_sale(&sale).await.unwrap();
    tx.commit().await.unwrap();

    assert_eq!(store.get_item(item.id).await.unwrap().unwrap().quantity, 1);
    let stored = store.get_sale(sale.id).await.unwrap().unwrap();
    assert_eq!(stored.quantity_bought, 2);
    assert_eq!(stored.price_paid, dec!(10.00));
}

#[tokio::test]
async fn conditional_decrement_refuses_overdraw() {
    let store = get_test_store().await;
    let item = seed_item(&store, 1).await;

    let mut tx = store.begin().await.unwrap();
    assert!(
        !tx.decrement_stock_if_available(item.id, item.vendor_id, 2)
            .await
            .unwrap()
    );
    assert!(
        !tx.decrement_stock_if_available(item.id, VendorId::new(), 1)
            .await
            .unwrap()
    );
    tx.rollback().await.unwrap();

    assert_eq!(store.get_item(item.id).await.unwrap().unwrap().quantity, 1);
}

#[tokio::test]
async fn rolled_back_transaction_leaves_no_trace() {
    let store = get_test_store().await;
    let item = seed_item(&store, 5).await;
    let sale = sale_for(&item, 5, None);

    let mut tx = store.begin().await.unwrap();
    tx.decrement_stock_if_available(item.id, item.vendor_id, 5)
        .await
        .unwrap();
    tx.insert_sale(&sale).await.unwrap();
    drop(tx);

    assert_eq!(store.get_item(item.id).await.unwrap().unwrap().quantity, 5);
    assert!(store.get_sale(sale.id).await.unwrap().is_none());
}

#[tokio::test]
async fn concurrent_decrements_never_overdraw() {
    let store = get_test_store().await;
    let item = seed_item(&store, 1).await;

    let mut handles = Vec::new();
    for _ in 0..4 {
        let store = store.clone();
        let item = item.clone();
        handles.push(tokio::spawn(async move {
            let mut tx = store.begin().await.unwrap();
            let ok = tx
                .decrement_stock_if_available(item.id, item.vendor_id, 1)
                .await
                .unwrap();
            if ok {
                tx.insert_sale(&sale_for(&item, 1, None)).await.unwrap();
                tx.commit().await.unwrap();
            } else {
                tx.rollback().await.unwrap();
            }
            ok
        }));
    }

    let mut winners = 0;
    for handle in handles {
        if handle.await.unwrap() {
            winners += 1;
        }
    }

    assert_eq!(winners, 1);
    assert_eq!(store.get_item(item.id).await.unwrap().unwrap().quantity, 0);
    assert_eq!(store.sales_for_vendor(item.vendor_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn idempotency_key_is_unique_per_buyer() {
    let store = get_test_store().await;
    let item = seed_item(&store, 5).await;
    let key = format!("checkout-{}", item.id);
    let first = sale_for(&item, 1, Some(&key));

    let mut tx = store.begin().await.unwrap();
    tx.insert_sale(&first).await.unwrap();
    tx.commit().await.unwrap();

    assert_eq!(
        store
            .find_sale_by_idempotency_key(first.buyer_id, &key)
            .await
            .unwrap(),
        Some(first.id)
    );

    let mut tx = store.begin().await.unwrap();
    assert_eq!(
        tx.find_sale_by_idempotency_key(first.buyer_id, &key)
            .await
            .unwrap(),
        Some(first.id)
    );
    let mut again = sale_for(&item, 1, Some(&key));
    again.buyer_id = first.buyer_id;
    let result = tx.insert_sale(&again).await;
    assert!(matches!(
        result,
        Err(StoreError::DuplicateIdempotencyKey(ref taken)) if *taken == key
    ));
    drop(tx);

    // The same key from another buyer is a different request.
    let other = sale_for(&item, 1, Some(&key));
    let mut tx = store.begin().await.unwrap();
    tx.insert_sale(&other).await.unwrap();
    tx.commit().await.unwrap();
    assert_eq!(store.sales_for_vendor(item.vendor_id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn sales_summary_aggregates_in_sql() {
    let store = get_test_store().await;
    let item = seed_item(&store, 10).await;
    let other = Item::new(item.vendor_id, "Gadget", dec!(0.5), 10);
    store.insert_item(other.clone()).await.unwrap();

    let mut tx = store.begin().await.unwrap();
    tx.insert_sale(&sale_for(&item, 3, None)).await.unwrap();
    tx.insert_sale(&sale_for(&other, 2, None)).await.unwrap();
    tx.commit().await.unwrap();

    let summary = store.sales_summary(item.vendor_id, None).await.unwrap();
    assert_eq!(summary.sale_count, 2);
    assert_eq!(summary.units_sold, 5);
    assert_eq!(summary.revenue, dec!(31.00));

    let for_item = store
        .sales_summary(item.vendor_id, Some(other.id))
        .await
        .unwrap();
    assert_eq!(for_item.sale_count, 1);
    assert_eq!(for_item.revenue, dec!(1.0));

    let empty = store.sales_summary(VendorId::new(), None).await.unwrap();
    assert_eq!(empty.sale_count, 0);
    assert!(empty.revenue.is_zero());
}
