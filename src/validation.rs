//! Input validation for order aggregates
//!
//! Checks every field rule of the aggregate and reports all violations at
//! once, so a rejected message or request carries the complete list.

use crate::error::{OrderError, Result};
use crate::models::{Delivery, Item, Order, Payment};

/// Maximum length for identifier-like string fields
const MAX_FIELD_LENGTH: usize = 255;

/// Maximum length for shard keys and item sizes
const MAX_SHORT_FIELD_LENGTH: usize = 10;

/// Maximum item discount percentage
const MAX_SALE_PERCENT: i64 = 100;

/// Validates an order aggregate against all of its invariants
pub fn validate_order(order: &Order) -> Result<()> {
    let mut violations = Vec::new();

    validate_order_fields(order, &mut violations);
    validate_delivery(&order.delivery, &mut violations);
    validate_payment(&order.payment, &mut violations);

    if order.items.is_empty() {
        violations.push("items: at least one item is required".to_string());
    }
    for (index, item) in order.items.iter().enumerate() {
        validate_item(index, item, &mut violations);
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(OrderError::validation(violations.join("; ")))
    }
}

fn validate_order_fields(order: &Order, violations: &mut Vec<String>) {
    let uid = &order.order_uid;
    if uid.is_empty() {
        violations.push("order_uid: required".to_string());
    } else {
        if !uid.chars().all(char::is_alphanumeric) {
            violations.push("order_uid: must be alphanumeric".to_string());
        }
        check_length("order_uid", uid, 4, MAX_FIELD_LENGTH, violations);
    }

    check_length("track_number", &order.track_number, 3, MAX_FIELD_LENGTH, violations);
    check_length("entry", &order.entry, 2, MAX_FIELD_LENGTH, violations);
    check_length("customer_id", &order.customer_id, 1, MAX_FIELD_LENGTH, violations);
    check_length(
        "delivery_service",
        &order.delivery_service,
        2,
        MAX_FIELD_LENGTH,
        violations,
    );

    let locale_len = order.locale.chars().count();
    if locale_len != 2 && locale_len != 5 {
        violations.push("locale: must be 2 or 5 characters".to_string());
    }

    check_max("shardkey", &order.shardkey, MAX_SHORT_FIELD_LENGTH, violations);
    check_max("oof_shard", &order.oof_shard, MAX_SHORT_FIELD_LENGTH, violations);

    if order.sm_id < 0 {
        violations.push("sm_id: must not be negative".to_string());
    }
}

fn validate_delivery(delivery: &Delivery, violations: &mut Vec<String>) {
    check_length("delivery.name", &delivery.name, 2, MAX_FIELD_LENGTH, violations);
    check_length("delivery.phone", &delivery.phone, 5, 50, violations);
    check_length("delivery.city", &delivery.city, 2, MAX_FIELD_LENGTH, violations);
    check_length("delivery.address", &delivery.address, 3, usize::MAX, violations);
    check_max("delivery.region", &delivery.region, MAX_FIELD_LENGTH, violations);

    if !delivery.zip.is_empty() {
        check_length("delivery.zip", &delivery.zip, 3, 20, violations);
    }
    if !delivery.email.is_empty() && !looks_like_email(&delivery.email) {
        violations.push("delivery.email: must be a valid email address".to_string());
    }
}

fn validate_payment(payment: &Payment, violations: &mut Vec<String>) {
    check_length(
        "payment.transaction",
        &payment.transaction,
        3,
        MAX_FIELD_LENGTH,
        violations,
    );
    check_max("payment.request_id", &payment.request_id, MAX_FIELD_LENGTH, violations);
    check_length("payment.provider", &payment.provider, 2, 100, violations);
    check_length("payment.bank", &payment.bank, 2, 100, violations);

    let currency = &payment.currency;
    if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_uppercase()) {
        violations.push("payment.currency: must be 3 uppercase letters".to_string());
    }

    if payment.amount <= 0 {
        violations.push("payment.amount: must be positive".to_string());
    }
    if payment.payment_dt <= 0 {
        violations.push("payment.payment_dt: must be positive".to_string());
    }
    if payment.delivery_cost < 0 {
        violations.push("payment.delivery_cost: must not be negative".to_string());
    }
    if payment.goods_total < 0 {
        violations.push("payment.goods_total: must not be negative".to_string());
    }
    if payment.custom_fee < 0 {
        violations.push("payment.custom_fee: must not be negative".to_string());
    }
}

fn validate_item(index: usize, item: &Item, violations: &mut Vec<String>) {
    let field = |name: &str| format!("items[{index}].{name}");

    if item.chrt_id <= 0 {
        violations.push(format!("{}: must be positive", field("chrt_id")));
    }
    if item.nm_id <= 0 {
        violations.push(format!("{}: must be positive", field("nm_id")));
    }
    if item.price <= 0 {
        violations.push(format!("{}: must be positive", field("price")));
    }
    if item.total_price <= 0 {
        violations.push(format!("{}: must be positive", field("total_price")));
    }
    if !(0..=MAX_SALE_PERCENT).contains(&item.sale) {
        violations.push(format!("{}: must be between 0 and 100", field("sale")));
    }
    if item.status == 0 {
        violations.push(format!("{}: required", field("status")));
    }

    check_length(&field("track_number"), &item.track_number, 3, MAX_FIELD_LENGTH, violations);
    check_length(&field("rid"), &item.rid, 3, MAX_FIELD_LENGTH, violations);
    check_length(&field("name"), &item.name, 1, usize::MAX, violations);
    check_length(&field("brand"), &item.brand, 1, usize::MAX, violations);
    check_max(&field("size"), &item.size, MAX_SHORT_FIELD_LENGTH, violations);
}

fn check_length(field: &str, value: &str, min: usize, max: usize, violations: &mut Vec<String>) {
    let len = value.chars().count();
    if len == 0 && min > 0 {
        violations.push(format!("{field}: required"));
    } else if len < min {
        violations.push(format!("{field}: must be at least {min} characters"));
    } else if len > max {
        violations.push(format!("{field}: must be at most {max} characters"));
    }
}

fn check_max(field: &str, value: &str, max: usize, violations: &mut Vec<String>) {
    if value.chars().count() > max {
        violations.push(format!("{field}: must be at most {max} characters"));
    }
}

fn looks_like_email(value: &str) -> bool {
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}
