//! # Order Models
//!
//! The order aggregate as it travels over the queue, through the cache and
//! into the relational store.

pub mod order;

pub use order::{Delivery, Item, Order, Payment};
