//! Read-only aggregate queries over the business store.
//!
//! This module provides the [`AggregateQueryService`] seam consumed by the snapshot
//! builder and the entity analyses, plus an SQLite implementation. Writes (CRUD for
//! customers, products and orders) belong to the surrounding application.

mod sqlite;

pub use sqlite::SqliteAggregates;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::StorageResult;

/// Order status counted as revenue.
pub const COMPLETED_STATUS: &str = "Concluído";

/// A customer row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRecord {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// Registration timestamp as stored (`YYYY-MM-DD HH:MM:SS`).
    pub created_at: String,
}

/// An order row joined with its customer's name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub id: i64,
    pub customer_name: Option<String>,
    pub date: String,
    pub total: Decimal,
    pub status: String,
}

/// A product row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: i64,
    pub name: String,
    pub price: Decimal,
    pub stock: i64,
}

/// Number of orders in one status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

/// Sum and average of completed-order totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RevenueSummary {
    pub total: Decimal,
    pub average: Decimal,
}

/// Read-only aggregate queries.
///
/// Each operation is independent so callers can tolerate partial failures.
#[async_trait]
pub trait AggregateQueryService: Send + Sync {
    /// Total number of customers.
    async fn count_customers(&self) -> StorageResult<i64>;
    /// Total number of products.
    async fn count_products(&self) -> StorageResult<i64>;
    /// Total number of orders, any status.
    async fn count_orders(&self) -> StorageResult<i64>;
    /// Order counts grouped by status, ordered by status name.
    async fn orders_by_status(&self) -> StorageResult<Vec<StatusCount>>;
    /// Sum and average of completed orders.
    async fn completed_revenue(&self) -> StorageResult<RevenueSummary>;
    /// The `limit` most recently registered customers.
    async fn recent_customers(&self, limit: u32) -> StorageResult<Vec<CustomerRecord>>;
    /// The `limit` most recently created orders.
    async fn recent_orders(&self, limit: u32) -> StorageResult<Vec<OrderRecord>>;
    /// The `limit` products with the highest stock.
    async fn top_stock_products(&self, limit: u32) -> StorageResult<Vec<ProductRecord>>;
    /// A single customer by id.
    async fn customer(&self, id: i64) -> StorageResult<Option<CustomerRecord>>;
    /// Every order of a customer, newest first.
    async fn customer_orders(&self, customer_id: i64) -> StorageResult<Vec<OrderRecord>>;
}
