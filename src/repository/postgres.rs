//! PostgreSQL-backed order repository.
//!
//! Expected schema (managed outside this crate):
//!
//! ```sql
//! CREATE TABLE orders (
//!     order_uid TEXT PRIMARY KEY, track_number TEXT NOT NULL, entry TEXT NOT NULL,
//!     locale TEXT NOT NULL, internal_signature TEXT NOT NULL, customer_id TEXT NOT NULL,
//!     delivery_service TEXT NOT NULL, shardkey TEXT NOT NULL, sm_id BIGINT NOT NULL,
//!     date_created TIMESTAMPTZ, oof_shard TEXT NOT NULL,
//!     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//! CREATE TABLE delivery (
//!     order_uid TEXT PRIMARY KEY REFERENCES orders ON DELETE CASCADE,
//!     name TEXT, phone TEXT, zip TEXT, city TEXT, address TEXT, region TEXT, email TEXT
//! );
//! CREATE TABLE payment (
//!     order_uid TEXT PRIMARY KEY REFERENCES orders ON DELETE CASCADE,
//!     transaction TEXT, request_id TEXT, currency TEXT, provider TEXT, amount BIGINT,
//!     payment_dt BIGINT, bank TEXT, delivery_cost BIGINT, goods_total BIGINT, custom_fee BIGINT
//! );
//! CREATE TABLE items (
//!     id BIGSERIAL PRIMARY KEY, order_uid TEXT REFERENCES orders ON DELETE CASCADE,
//!     chrt_id BIGINT, track_number TEXT, price BIGINT, rid TEXT, name TEXT, sale BIGINT,
//!     size TEXT, total_price BIGINT, nm_id BIGINT, brand TEXT, status BIGINT
//! );
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, info, instrument};

use super::OrderRepository;
use crate::config::DatabaseConfig;
use crate::error::{OrderError, Result};
use crate::models::{Delivery, Item, Order, Payment};

const ORDER_COLUMNS: &str = "order_uid, track_number, entry, locale, internal_signature, \
     customer_id, delivery_service, shardkey, sm_id, date_created, oof_shard";

#[derive(Debug, FromRow)]
struct OrderRow {
    order_uid: String,
    track_number: String,
    entry: String,
    locale: String,
    internal_signature: String,
    customer_id: String,
    delivery_service: String,
    shardkey: String,
    sm_id: i64,
    date_created: Option<DateTime<Utc>>,
    oof_shard: String,
}

#[derive(Debug, FromRow)]
struct DeliveryRow {
    order_uid: String,
    #[sqlx(flatten)]
    delivery: Delivery,
}

#[derive(Debug, FromRow)]
struct PaymentRow {
    order_uid: String,
    #[sqlx(flatten)]
    payment: Payment,
}

#[derive(Debug, FromRow)]
struct ItemRow {
    order_uid: String,
    #[sqlx(flatten)]
    item: Item,
}

impl OrderRow {
    fn into_order(self, delivery: Delivery, payment: Payment, items: Vec<Item>) -> Order {
        Order {
            order_uid: self.order_uid,
            track_number: self.track_number,
            entry: self.entry,
            delivery,
            payment,
            items,
            locale: self.locale,
            internal_signature: self.internal_signature,
            customer_id: self.customer_id,
            delivery_service: self.delivery_service,
            shardkey: self.shardkey,
            sm_id: self.sm_id,
            date_created: self.date_created,
            oof_shard: self.oof_shard,
        }
    }
}

fn db_error(operation: &str) -> impl FnOnce(sqlx::Error) -> OrderError + '_ {
    move |err| OrderError::persistence(operation, err.to_string())
}

/// Order repository over a shared sqlx connection pool
#[derive(Debug, Clone)]
pub struct PostgresOrderRepository {
    pool: PgPool,
}

impl PostgresOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Build a pool from configuration and wrap it
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout())
            .connect(&config.url)
            .await
            .map_err(db_error("connect"))?;

        info!(
            max_connections = config.max_connections,
            "Connected to order database"
        );
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn upsert(&self, order: &Order) -> Result<()> {
        let start = Instant::now();
        let mut tx = self.pool.begin().await.map_err(db_error("begin"))?;

        Self::upsert_order_row(&mut tx, order).await?;
        Self::upsert_delivery(&mut tx, order).await?;
        Self::upsert_payment(&mut tx, order).await?;
        Self::replace_items(&mut tx, order).await?;

        tx.commit().await.map_err(db_error("commit"))?;

        debug!(
            order_uid = %order.order_uid,
            items = order.items.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Order upserted"
        );
        Ok(())
    }

    async fn upsert_order_row(tx: &mut Transaction<'_, Postgres>, order: &Order) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (order_uid, track_number, entry, locale, internal_signature,
                                customer_id, delivery_service, shardkey, sm_id, date_created, oof_shard)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (order_uid) DO UPDATE SET
                track_number = EXCLUDED.track_number,
                entry = EXCLUDED.entry,
                locale = EXCLUDED.locale,
                internal_signature = EXCLUDED.internal_signature,
                customer_id = EXCLUDED.customer_id,
                delivery_service = EXCLUDED.delivery_service,
                shardkey = EXCLUDED.shardkey,
                sm_id = EXCLUDED.sm_id,
                date_created = EXCLUDED.date_created,
                oof_shard = EXCLUDED.oof_shard,
                updated_at = NOW()
            "#,
        )
        .bind(&order.order_uid)
        .bind(&order.track_number)
        .bind(&order.entry)
        .bind(&order.locale)
        .bind(&order.internal_signature)
        .bind(&order.customer_id)
        .bind(&order.delivery_service)
        .bind(&order.shardkey)
        .bind(order.sm_id)
        .bind(order.date_created)
        .bind(&order.oof_shard)
        .execute(&mut **tx)
        .await
        .map_err(db_error("insert order"))?;

        Ok(())
    }

    async fn upsert_delivery(tx: &mut Transaction<'_, Postgres>, order: &Order) -> Result<()> {
        let delivery = &order.delivery;
        sqlx::query(
            r#"
            INSERT INTO delivery (order_uid, name, phone, zip, city, address, region, email)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (order_uid) DO UPDATE SET
                name = EXCLUDED.name,
                phone = EXCLUDED.phone,
                zip = EXCLUDED.zip,
                city = EXCLUDED.city,
                address = EXCLUDED.address,
                region = EXCLUDED.region,
                email = EXCLUDED.email
            "#,
        )
        .bind(&order.order_uid)
        .bind(&delivery.name)
        .bind(&delivery.phone)
        .bind(&delivery.zip)
        .bind(&delivery.city)
        .bind(&delivery.address)
        .bind(&delivery.region)
        .bind(&delivery.email)
        .execute(&mut **tx)
        .await
        .map_err(db_error("insert delivery"))?;

        Ok(())
    }

    async fn upsert_payment(tx: &mut Transaction<'_, Postgres>, order: &Order) -> Result<()> {
        let payment = &order.payment;
        sqlx::query(
            r#"
            INSERT INTO payment (order_uid, transaction, request_id, currency, provider,
                                 amount, payment_dt, bank, delivery_cost, goods_total, custom_fee)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (order_uid) DO UPDATE SET
                transaction = EXCLUDED.transaction,
                request_id = EXCLUDED.request_id,
                currency = EXCLUDED.currency,
                provider = EXCLUDED.provider,
                amount = EXCLUDED.amount,
                payment_dt = EXCLUDED.payment_dt,
                bank = EXCLUDED.bank,
                delivery_cost = EXCLUDED.delivery_cost,
                goods_total = EXCLUDED.goods_total,
                custom_fee = EXCLUDED.custom_fee
            "#,
        )
        .bind(&order.order_uid)
        .bind(&payment.transaction)
        .bind(&payment.request_id)
        .bind(&payment.currency)
        .bind(&payment.provider)
        .bind(payment.amount)
        .bind(payment.payment_dt)
        .bind(&payment.bank)
        .bind(payment.delivery_cost)
        .bind(payment.goods_total)
        .bind(payment.custom_fee)
        .execute(&mut **tx)
        .await
        .map_err(db_error("insert payment"))?;

        Ok(())
    }

    async fn replace_items(tx: &mut Transaction<'_, Postgres>, order: &Order) -> Result<()> {
        sqlx::query("DELETE FROM items WHERE order_uid = $1")
            .bind(&order.order_uid)
            .execute(&mut **tx)
            .await
            .map_err(db_error("delete items"))?;

        for item in &order.items {
            sqlx::query(
                r#"
                INSERT INTO items (order_uid, chrt_id, track_number, price, rid, name,
                                   sale, size, total_price, nm_id, brand, status)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                "#,
            )
            .bind(&order.order_uid)
            .bind(item.chrt_id)
            .bind(&item.track_number)
            .bind(item.price)
            .bind(&item.rid)
            .bind(&item.name)
            .bind(item.sale)
            .bind(&item.size)
            .bind(item.total_price)
            .bind(item.nm_id)
            .bind(&item.brand)
            .bind(item.status)
            .execute(&mut **tx)
            .await
            .map_err(db_error("insert item"))?;
        }

        Ok(())
    }

    /// Load sub-records for `rows` with one query per table and assemble aggregates
    async fn assemble(&self, rows: Vec<OrderRow>) -> Result<Vec<Order>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let uids: Vec<String> = rows.iter().map(|row| row.order_uid.clone()).collect();

        let mut deliveries: HashMap<String, Delivery> = sqlx::query_as::<_, DeliveryRow>(
            "SELECT order_uid, name, phone, zip, city, address, region, email \
             FROM delivery WHERE order_uid = ANY($1)",
        )
        .bind(&uids)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("select delivery"))?
        .into_iter()
        .map(|row| (row.order_uid, row.delivery))
        .collect();

        let mut payments: HashMap<String, Payment> = sqlx::query_as::<_, PaymentRow>(
            "SELECT order_uid, transaction, request_id, currency, provider, amount, payment_dt, \
             bank, delivery_cost, goods_total, custom_fee \
             FROM payment WHERE order_uid = ANY($1)",
        )
        .bind(&uids)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("select payment"))?
        .into_iter()
        .map(|row| (row.order_uid, row.payment))
        .collect();

        let mut items: HashMap<String, Vec<Item>> = HashMap::new();
        let item_rows = sqlx::query_as::<_, ItemRow>(
            "SELECT order_uid, chrt_id, track_number, price, rid, name, sale, size, \
             total_price, nm_id, brand, status \
             FROM items WHERE order_uid = ANY($1) ORDER BY id",
        )
        .bind(&uids)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("select items"))?;
        for row in item_rows {
            items.entry(row.order_uid).or_default().push(row.item);
        }

        rows.into_iter()
            .map(|row| {
                let uid = row.order_uid.clone();
                let delivery = deliveries.remove(&uid).ok_or_else(|| {
                    OrderError::persistence("select delivery", format!("missing delivery for {uid}"))
                })?;
                let payment = payments.remove(&uid).ok_or_else(|| {
                    OrderError::persistence("select payment", format!("missing payment for {uid}"))
                })?;
                let items = items.remove(&uid).unwrap_or_default();
                Ok(row.into_order(delivery, payment, items))
            })
            .collect()
    }
}

#[async_trait]
impl OrderRepository for PostgresOrderRepository {
    #[instrument(skip(self, order), fields(order_uid = %order.order_uid))]
    async fn create(&self, order: &Order) -> Result<()> {
        self.upsert(order).await
    }

    #[instrument(skip(self))]
    async fn get_by_uid(&self, order_uid: &str) -> Result<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE order_uid = $1"
        ))
        .bind(order_uid)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("select order"))?;

        match row {
            Some(row) => Ok(self.assemble(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    #[instrument(skip(self))]
    async fn list_all(&self) -> Result<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders ORDER BY date_created DESC NULLS LAST"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list orders"))?;

        self.assemble(rows).await
    }

    #[instrument(skip(self, order), fields(order_uid = %order.order_uid))]
    async fn update(&self, order: &Order) -> Result<()> {
        self.upsert(order).await
    }

    #[instrument(skip(self))]
    async fn delete(&self, order_uid: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM orders WHERE order_uid = $1")
            .bind(order_uid)
            .execute(&self.pool)
            .await
            .map_err(db_error("delete order"))?;

        debug!(
            order_uid = %order_uid,
            rows_affected = result.rows_affected(),
            "Order deleted"
        );
        Ok(())
    }
}
