use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::config::ContextConfig;
use crate::error::StorageResult;
use crate::storage::{AggregateQueryService, CustomerRecord, OrderRecord, ProductRecord};

/// How many recent rows the snapshot keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotLimits {
    pub recent_customers: u32,
    pub recent_orders: u32,
    pub top_products: u32,
}

impl From<&ContextConfig> for SnapshotLimits {
    fn from(config: &ContextConfig) -> Self {
        Self {
            recent_customers: config.recent_customers,
            recent_orders: config.recent_orders,
            top_products: config.top_products,
        }
    }
}

impl Default for SnapshotLimits {
    fn default() -> Self {
        Self::from(&ContextConfig::default())
    }
}

/// Point-in-time read of the business aggregates.
///
/// Built fresh for every question and never mutated afterwards. All figures are
/// non-negative; a failed query contributes zero or an empty list.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregateSnapshot {
    /// Creation time, for logging only
    pub captured_at: DateTime<Utc>,
    pub total_customers: u64,
    pub total_products: u64,
    pub total_orders: u64,
    pub orders_by_status: BTreeMap<String, u64>,
    pub completed_revenue: Decimal,
    pub average_order_value: Decimal,
    pub recent_customers: Vec<CustomerRecord>,
    pub recent_orders: Vec<OrderRecord>,
    pub top_stock_products: Vec<ProductRecord>,
}

fn or_default<T: Default>(query: &str, result: StorageResult<T>) -> T {
    result.unwrap_or_else(|e| {
        warn!(query, error = %e, "Aggregate query failed, using empty value");
        T::default()
    })
}

fn non_negative_count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

fn non_negative_money(value: Decimal) -> Decimal {
    value.max(Decimal::ZERO)
}

impl AggregateSnapshot {
    /// Read every aggregate concurrently, tolerating individual query failures.
    pub async fn collect(service: &dyn AggregateQueryService, limits: SnapshotLimits) -> Self {
        let (
            customers,
            products,
            orders,
            by_status,
            revenue,
            recent_customers,
            recent_orders,
            top_products,
        ) = tokio::join!(
            service.count_customers(),
            service.count_products(),
            service.count_orders(),
            service.orders_by_status(),
            service.completed_revenue(),
            service.recent_customers(limits.recent_customers),
            service.recent_orders(limits.recent_orders),
            service.top_stock_products(limits.top_products),
        );

        let revenue = or_default("completed_revenue", revenue);

        let mut orders_by_status = BTreeMap::new();
        for row in or_default("orders_by_status", by_status) {
            *orders_by_status.entry(row.status).or_insert(0) += non_negative_count(row.count);
        }

        let snapshot = Self {
            captured_at: Utc::now(),
            total_customers: non_negative_count(or_default("count_customers", customers)),
            total_products: non_negative_count(or_default("count_products", products)),
            total_orders: non_negative_count(or_default("count_orders", orders)),
            orders_by_status,
            completed_revenue: non_negative_money(revenue.total),
            average_order_value: non_negative_money(revenue.average),
            recent_customers: or_default("recent_customers", recent_customers)
                .into_iter()
                .take(limits.recent_customers as usize)
                .collect(),
            recent_orders: or_default("recent_orders", recent_orders)
                .into_iter()
                .take(limits.recent_orders as usize)
                .map(|mut o| {
                    o.total = non_negative_money(o.total);
                    o
                })
                .collect(),
            top_stock_products: or_default("top_stock_products", top_products)
                .into_iter()
                .take(limits.top_products as usize)
                .map(|mut p| {
                    p.price = non_negative_money(p.price);
                    p.stock = p.stock.max(0);
                    p
                })
                .collect(),
        };

        debug!(
            captured_at = %snapshot.captured_at,
            customers = snapshot.total_customers,
            products = snapshot.total_products,
            orders = snapshot.total_orders,
            "Aggregate snapshot collected"
        );

        snapshot
    }
}

/// Per-entity detail for analyses: one customer and their order history.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EntityDetail {
    pub customer: Option<CustomerRecord>,
    pub orders: Vec<OrderRecord>,
}

impl EntityDetail {
    /// Load a customer and their orders. A missing customer yields an empty detail.
    pub async fn load(
        service: &dyn AggregateQueryService,
        customer_id: i64,
    ) -> StorageResult<Self> {
        let customer = service.customer(customer_id).await?;
        let orders = match customer {
            Some(_) => service.customer_orders(customer_id).await?,
            None => Vec::new(),
        };
        Ok(Self { customer, orders })
    }

    /// Detail made only of orders (no customer), as used by order analyses.
    pub fn from_orders(orders: Vec<OrderRecord>) -> Self {
        Self {
            customer: None,
            orders,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.customer.is_none() && self.orders.is_empty()
    }

    /// Sum of order totals.
    pub fn total_spent(&self) -> Decimal {
        self.orders.iter().map(|o| o.total).sum()
    }

    /// Average order total, `None` without orders.
    pub fn average_ticket(&self) -> Option<Decimal> {
        if self.orders.is_empty() {
            return None;
        }
        Some((self.total_spent() / Decimal::from(self.orders.len() as u64)).round_dp(2))
    }

    /// Order counts by status, sorted by status name.
    pub fn status_breakdown(&self) -> BTreeMap<String, u64> {
        let mut counts = BTreeMap::new();
        for order in &self.orders {
            *counts.entry(order.status.clone()).or_insert(0) += 1;
        }
        counts
    }
}
