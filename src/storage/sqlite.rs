use async_trait::async_trait;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::info;

use super::{
    AggregateQueryService, CustomerRecord, OrderRecord, ProductRecord, RevenueSummary,
    StatusCount, COMPLETED_STATUS,
};
use crate::config::DatabaseConfig;
use crate::error::{StorageError, StorageResult};

/// Static migrator that embeds migrations at compile time
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// SQLite-backed aggregate queries
#[derive(Clone)]
pub struct SqliteAggregates {
    pool: SqlitePool,
}

impl SqliteAggregates {
    /// Open (creating if needed) the business database and run migrations
    pub async fn new(config: &DatabaseConfig) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Connection {
                message: format!("Failed to create database directory: {}", e),
            })?;
        }

        let database_url = format!("sqlite://{}?mode=rwc", config.path.display());

        let options = SqliteConnectOptions::from_str(&database_url)
            .map_err(|e| StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            })?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to connect to database: {}", e),
            })?;

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// Run database migrations using embedded sqlx migrations
    async fn run_migrations(&self) -> StorageResult<()> {
        info!("Running database migrations...");

        MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|e| StorageError::Migration {
                message: format!("Failed to run migrations: {}", e),
            })?;

        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Get the underlying pool for advanced queries
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn count(&self, sql: &str) -> StorageResult<i64> {
        let count: i64 = sqlx::query_scalar(sql).fetch_one(&self.pool).await?;
        Ok(count)
    }
}

/// REAL column to two-decimal money. NaN and infinities become zero.
fn money(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or_default().round_dp(2)
}

#[async_trait]
impl AggregateQueryService for SqliteAggregates {
    async fn count_customers(&self) -> StorageResult<i64> {
        self.count("SELECT COUNT(*) FROM customers").await
    }

    async fn count_products(&self) -> StorageResult<i64> {
        self.count("SELECT COUNT(*) FROM products").await
    }

    async fn count_orders(&self) -> StorageResult<i64> {
        self.count("SELECT COUNT(*) FROM orders").await
    }

    async fn orders_by_status(&self) -> StorageResult<Vec<StatusCount>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT status, COUNT(*) AS quantity
            FROM orders
            GROUP BY status
            ORDER BY status ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(status, count)| StatusCount { status, count })
            .collect())
    }

    async fn completed_revenue(&self) -> StorageResult<RevenueSummary> {
        let (total, average): (f64, f64) = sqlx::query_as(
            r#"
            SELECT CAST(COALESCE(SUM(total), 0.0) AS REAL),
                   CAST(COALESCE(AVG(total), 0.0) AS REAL)
            FROM orders
            WHERE status = ?
            "#,
        )
        .bind(COMPLETED_STATUS)
        .fetch_one(&self.pool)
        .await?;

        Ok(RevenueSummary {
            total: money(total),
            average: money(average),
        })
    }

    async fn recent_customers(&self, limit: u32) -> StorageResult<Vec<CustomerRecord>> {
        let rows: Vec<CustomerRow> = sqlx::query_as(
            r#"
            SELECT id, name, email, phone, created_at
            FROM customers
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn recent_orders(&self, limit: u32) -> StorageResult<Vec<OrderRecord>> {
        let rows: Vec<OrderRow> = sqlx::query_as(
            r#"
            SELECT o.id, c.name AS customer_name, o.date, CAST(o.total AS REAL) AS total, o.status
            FROM orders o
            LEFT JOIN customers c ON o.customer_id = c.id
            ORDER BY o.created_at DESC, o.id DESC
            LIMIT ?
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn top_stock_products(&self, limit: u32) -> StorageResult<Vec<ProductRecord>> {
        let rows: Vec<ProductRow> = sqlx::query_as(
            r#"
            SELECT id, name, CAST(price AS REAL) AS price, stock
            FROM products
            ORDER BY stock DESC, id ASC
            LIMIT ?
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn customer(&self, id: i64) -> StorageResult<Option<CustomerRecord>> {
        let row: Option<CustomerRow> = sqlx::query_as(
            r#"
            SELECT id, name, email, phone, created_at
            FROM customers
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn customer_orders(&self, customer_id: i64) -> StorageResult<Vec<OrderRecord>> {
        let rows: Vec<OrderRow> = sqlx::query_as(
            r#"
            SELECT o.id, c.name AS customer_name, o.date, CAST(o.total AS REAL) AS total, o.status
            FROM orders o
            LEFT JOIN customers c ON o.customer_id = c.id
            WHERE o.customer_id = ?
            ORDER BY o.date DESC, o.id DESC
            "#,
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

// Internal row types for SQLx mapping
#[derive(sqlx::FromRow)]
struct CustomerRow {
    id: i64,
    name: String,
    email: Option<String>,
    phone: Option<String>,
    created_at: String,
}

impl From<CustomerRow> for CustomerRecord {
    fn from(row: CustomerRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            email: row.email,
            phone: row.phone,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: i64,
    customer_name: Option<String>,
    date: String,
    total: f64,
    status: String,
}

impl From<OrderRow> for OrderRecord {
    fn from(row: OrderRow) -> Self {
        Self {
            id: row.id,
            customer_name: row.customer_name,
            date: row.date,
            total: money(row.total),
            status: row.status,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: i64,
    name: String,
    price: f64,
    stock: i64,
}

impl From<ProductRow> for ProductRecord {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            price: money(row.price),
            stock: row.stock,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_rounds_to_cents() {
        assert_eq!(money(10.0), Decimal::from_str("10.00").unwrap());
        assert_eq!(money(1234.567), Decimal::from_str("1234.57").unwrap());
        assert_eq!(money(f64::NAN), Decimal::ZERO);
    }
}
