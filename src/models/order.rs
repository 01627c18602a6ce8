use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Order aggregate: the order plus its delivery, payment and line items.
///
/// Persisted across the `orders`, `delivery`, `payment` and `items` tables and
/// cached as a single value keyed by `order_uid`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_uid: String,
    pub track_number: String,
    pub entry: String,
    pub delivery: Delivery,
    pub payment: Payment,
    pub items: Vec<Item>,
    pub locale: String,
    #[serde(default)]
    pub internal_signature: String,
    pub customer_id: String,
    pub delivery_service: String,
    #[serde(default)]
    pub shardkey: String,
    #[serde(default)]
    pub sm_id: i64,
    /// Unset on inbound orders; defaulted to now when the order is first processed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub oof_shard: String,
}

/// Delivery sub-record, one per order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Delivery {
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub zip: String,
    pub city: String,
    pub address: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub email: String,
}

/// Payment sub-record, one per order. Monetary values are in minor units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub transaction: String,
    #[serde(default)]
    pub request_id: String,
    pub currency: String,
    pub provider: String,
    pub amount: i64,
    pub payment_dt: i64,
    pub bank: String,
    #[serde(default)]
    pub delivery_cost: i64,
    #[serde(default)]
    pub goods_total: i64,
    #[serde(default)]
    pub custom_fee: i64,
}

/// Line item; an order always carries at least one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Item {
    pub chrt_id: i64,
    pub track_number: String,
    pub price: i64,
    pub rid: String,
    pub name: String,
    /// Discount percentage in [0, 100]
    #[serde(default)]
    pub sale: i64,
    #[serde(default)]
    pub size: String,
    pub total_price: i64,
    pub nm_id: i64,
    pub brand: String,
    pub status: i64,
}

impl Order {
    /// Decode an order from a raw message payload
    pub fn from_slice(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }

    /// Encode the order as JSON bytes for queue transport
    pub fn to_vec(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Set `date_created` to now if it was not provided
    pub fn ensure_date_created(&mut self) {
        if self.date_created.is_none() {
            self.date_created = Some(Utc::now());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn wire_order() -> serde_json::Value {
        json!({
            "order_uid": "b563feb7b2b84b6test",
            "track_number": "WBILMTESTTRACK",
            "entry": "WBIL",
            "delivery": {
                "name": "Test Testov",
                "phone": "+9720000000",
                "zip": "2639809",
                "city": "Kiryat Mozkin",
                "address": "Ploshad Mira 15",
                "region": "Kraiot",
                "email": "test@gmail.com"
            },
            "payment": {
                "transaction": "b563feb7b2b84b6test",
                "request_id": "",
                "currency": "USD",
                "provider": "wbpay",
                "amount": 1817,
                "payment_dt": 1637907727,
                "bank": "alpha",
                "delivery_cost": 1500,
                "goods_total": 317,
                "custom_fee": 0
            },
            "items": [{
                "chrt_id": 9934930,
                "track_number": "WBILMTESTTRACK",
                "price": 453,
                "rid": "ab4219087a764ae0btest",
                "name": "Mascaras",
                "sale": 30,
                "size": "0",
                "total_price": 317,
                "nm_id": 2389212,
                "brand": "Vivienne Sabo",
                "status": 202
            }],
            "locale": "en",
            "internal_signature": "",
            "customer_id": "test",
            "delivery_service": "meest",
            "shardkey": "9",
            "sm_id": 99,
            "date_created": "2021-11-26T06:22:19Z",
            "oof_shard": "1"
        })
    }

    #[test]
    fn test_decode_wire_format() {
        let bytes = serde_json::to_vec(&wire_order()).unwrap();
        let order = Order::from_slice(&bytes).unwrap();

        assert_eq!(order.order_uid, "b563feb7b2b84b6test");
        assert_eq!(order.shardkey, "9");
        assert_eq!(order.sm_id, 99);
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.items[0].sale, 30);
        assert_eq!(order.payment.amount, 1817);
        assert!(order.date_created.is_some());
    }

    #[test]
    fn test_missing_date_created_is_defaulted() {
        let mut value = wire_order();
        value.as_object_mut().unwrap().remove("date_created");
        let mut order: Order = serde_json::from_value(value).unwrap();
        assert!(order.date_created.is_none());

        order.ensure_date_created();
        assert!(order.date_created.is_some());
    }

    #[test]
    fn test_decode_rejects_wrong_shape() {
        assert!(Order::from_slice(br#"{"order_uid": 42}"#).is_err());
        assert!(Order::from_slice(b"not json").is_err());
    }
}
