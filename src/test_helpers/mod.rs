//! # Test Helpers
//!
//! Sample orders and an in-memory repository with call counters and failure
//! injection. Shared by unit tests and the integration suites under `tests/`.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{OrderError, Result};
use crate::models::{Delivery, Item, Order, Payment};
use crate::repository::OrderRepository;

/// A valid single-item order keyed by `order_uid`
pub fn sample_order(order_uid: &str) -> Order {
    Order {
        order_uid: order_uid.to_string(),
        track_number: "WBILMTESTTRACK".to_string(),
        entry: "WBIL".to_string(),
        delivery: Delivery {
            name: "Test Testov".to_string(),
            phone: "+9720000000".to_string(),
            zip: "2639809".to_string(),
            city: "Kiryat Mozkin".to_string(),
            address: "Ploshad Mira 15".to_string(),
            region: "Kraiot".to_string(),
            email: "test@gmail.com".to_string(),
        },
        payment: Payment {
            transaction: format!("tx{order_uid}"),
            request_id: String::new(),
            currency: "USD".to_string(),
            provider: "wbpay".to_string(),
            amount: 1817,
            payment_dt: 1_637_907_727,
            bank: "alpha".to_string(),
            delivery_cost: 1500,
            goods_total: 317,
            custom_fee: 0,
        },
        items: vec![sample_item()],
        locale: "en".to_string(),
        internal_signature: String::new(),
        customer_id: "test".to_string(),
        delivery_service: "meest".to_string(),
        shardkey: "9".to_string(),
        sm_id: 99,
        date_created: None,
        oof_shard: "1".to_string(),
    }
}

pub fn sample_item() -> Item {
    Item {
        chrt_id: 9_934_930,
        track_number: "WBILMTESTTRACK".to_string(),
        price: 453,
        rid: "ab4219087a764ae0btest".to_string(),
        name: "Mascaras".to_string(),
        sale: 30,
        size: "0".to_string(),
        total_price: 317,
        nm_id: 2_389_212,
        brand: "Vivienne Sabo".to_string(),
        status: 202,
    }
}

/// [`sample_order`] with a fixed creation time `days` days after 2024-01-01
pub fn sample_order_created(order_uid: &str, days: i64) -> Order {
    let mut order = sample_order(order_uid);
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single();
    order.date_created = base.map(|base| base + chrono::Duration::days(days));
    order
}

/// JSON bytes for [`sample_order`], as a producer would publish them
pub fn sample_payload(order_uid: &str) -> Vec<u8> {
    serde_json::to_vec(&sample_order(order_uid)).unwrap_or_default()
}

/// Per-operation call counts
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RepositoryCalls {
    pub create: usize,
    pub get_by_uid: usize,
    pub list_all: usize,
    pub update: usize,
    pub delete: usize,
}

impl RepositoryCalls {
    pub fn total(&self) -> usize {
        self.create + self.get_by_uid + self.list_all + self.update + self.delete
    }
}

/// Map-backed [`OrderRepository`] for tests
#[derive(Debug, Default)]
pub struct InMemoryOrderRepository {
    orders: Mutex<HashMap<String, Order>>,
    calls: Mutex<RepositoryCalls>,
    failing_creates: AtomicUsize,
    failing_reads: AtomicUsize,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an order directly, bypassing call accounting
    pub fn seed(&self, order: Order) {
        self.orders.lock().insert(order.order_uid.clone(), order);
    }

    /// Stored order, bypassing call accounting
    pub fn get(&self, order_uid: &str) -> Option<Order> {
        self.orders.lock().get(order_uid).cloned()
    }

    pub fn len(&self) -> usize {
        self.orders.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn calls(&self) -> RepositoryCalls {
        *self.calls.lock()
    }

    /// The next `count` create/update calls fail with a persistence error
    pub fn fail_next_creates(&self, count: usize) {
        self.failing_creates.store(count, Ordering::SeqCst);
    }

    /// The next `count` get/list calls fail with a persistence error
    pub fn fail_next_reads(&self, count: usize) {
        self.failing_reads.store(count, Ordering::SeqCst);
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn write(&self, operation: &str, order: &Order) -> Result<()> {
        if Self::take_failure(&self.failing_creates) {
            return Err(OrderError::persistence(operation, "injected failure"));
        }
        self.orders
            .lock()
            .insert(order.order_uid.clone(), order.clone());
        Ok(())
    }

    fn check_read(&self, operation: &str) -> Result<()> {
        if Self::take_failure(&self.failing_reads) {
            return Err(OrderError::persistence(operation, "injected failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn create(&self, order: &Order) -> Result<()> {
        self.calls.lock().create += 1;
        self.write("create", order)
    }

    async fn get_by_uid(&self, order_uid: &str) -> Result<Option<Order>> {
        self.calls.lock().get_by_uid += 1;
        self.check_read("get_by_uid")?;
        Ok(self.get(order_uid))
    }

    async fn list_all(&self) -> Result<Vec<Order>> {
        self.calls.lock().list_all += 1;
        self.check_read("list_all")?;
        let mut orders: Vec<Order> = self.orders.lock().values().cloned().collect();
        orders.sort_by(|a, b| b.date_created.cmp(&a.date_created));
        Ok(orders)
    }

    async fn update(&self, order: &Order) -> Result<()> {
        self.calls.lock().update += 1;
        self.write("update", order)
    }

    async fn delete(&self, order_uid: &str) -> Result<()> {
        self.calls.lock().delete += 1;
        self.orders.lock().remove(order_uid);
        Ok(())
    }
}
