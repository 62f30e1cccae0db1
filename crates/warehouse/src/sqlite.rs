// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2024 Jonathan Lee
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License version 3
// as published by the Free Software Foundation.
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see https://www.gnu.org/licenses/.

use crate::error::{WarehouseError, WarehouseResult};
use crate::types::{
    CategoryRevenue, CustomerSegment, CustomerValue, DailySales, MonthlySales, ProductSales,
    SalesMetrics,
};
use crate::warehouse::Warehouse;
use async_trait::async_trait;
use chrono::{Duration, Months, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::{debug, info};

pub const SCHEMA: &str = include_str!("../sql/schema.sql");

/// Product-name substrings checked in order; the first hit names the
/// category, anything else is "Other".
pub const CATEGORY_LABELS: [&str; 5] = ["Pro", "Premium", "Standard", "Lite", "Ultra"];

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone)]
pub struct SqliteWarehouse {
    pool: SqlitePool,
}

impl SqliteWarehouse {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens a pool for `url`. An in-memory database lives and dies with its
    /// connection, so it is pinned to a single connection that never idles out.
    pub async fn connect(url: &str, max_connections: u32) -> WarehouseResult<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let in_memory = url.contains(":memory:") || url.contains("mode=memory");

        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(max_connections.max(1))
        };
        let pool = pool_options.connect_with(options).await?;
        info!(url, in_memory, "warehouse pool ready");
        Ok(Self::new(pool))
    }

    pub async fn apply_schema(&self) -> WarehouseResult<()> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        debug!("warehouse schema applied");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn window(days: u32) -> (String, String) {
        let end = Utc::now();
        let start = end - Duration::days(i64::from(days));
        (
            start.format(TIMESTAMP_FORMAT).to_string(),
            end.format(TIMESTAMP_FORMAT).to_string(),
        )
    }

    fn category_case() -> String {
        let arms: String = CATEGORY_LABELS
            .iter()
            .map(|label| format!("WHEN instr(p.product_name, '{label}') > 0 THEN '{label}' "))
            .collect();
        format!("CASE {arms}ELSE 'Other' END")
    }
}

fn require_positive(name: &'static str, value: u32) -> WarehouseResult<()> {
    if value == 0 {
        return Err(WarehouseError::InvalidParameter {
            name,
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(())
}

#[async_trait]
impl Warehouse for SqliteWarehouse {
    async fn sales_metrics(&self, days: u32) -> WarehouseResult<SalesMetrics> {
        require_positive("days", days)?;
        let (start, end) = Self::window(days);
        let (total_orders, total_revenue, avg_order_value, unique_customers): (i64, f64, f64, i64) =
            sqlx::query_as(
                r"
                SELECT
                    CAST(COUNT(*) AS INTEGER),
                    CAST(COALESCE(SUM(total_amount), 0) AS REAL),
                    CAST(COALESCE(AVG(total_amount), 0) AS REAL),
                    CAST(COUNT(DISTINCT customer_id) AS INTEGER)
                FROM orders
                WHERE order_date >= ?1 AND order_date <= ?2
                ",
            )
            .bind(&start)
            .bind(&end)
            .fetch_one(&self.pool)
            .await?;

        Ok(SalesMetrics {
            period_days: days,
            total_orders,
            total_revenue,
            avg_order_value,
            unique_customers,
        })
    }

    async fn top_products(&self, limit: u32) -> WarehouseResult<Vec<ProductSales>> {
        require_positive("limit", limit)?;
        let rows = sqlx::query_as::<_, ProductSales>(
            r"
            SELECT
                p.product_name AS product_name,
                CAST(COALESCE(SUM(oi.quantity), 0) AS INTEGER) AS total_sold,
                CAST(COALESCE(SUM(oi.total_price), 0) AS REAL) AS total_revenue,
                CAST(COUNT(DISTINCT oi.order_id) AS INTEGER) AS orders_count
            FROM order_items oi
            JOIN products p ON oi.product_id = p.product_id
            GROUP BY p.product_id, p.product_name
            ORDER BY total_revenue DESC
            LIMIT ?1
            ",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn customer_segments(&self) -> WarehouseResult<Vec<CustomerSegment>> {
        let rows = sqlx::query_as::<_, CustomerSegment>(
            r"
            SELECT
                CASE
                    WHEN annual_income >= 80000 THEN 'High Value'
                    WHEN annual_income >= 50000 THEN 'Mid Value'
                    ELSE 'Low Value'
                END AS segment,
                CAST(COUNT(*) AS INTEGER) AS customer_count,
                CAST(COALESCE(AVG(annual_income), 0) AS REAL) AS avg_income
            FROM customers
            WHERE is_active = 1
            GROUP BY segment
            ORDER BY avg_income DESC
            ",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn sales_trend(&self, days: u32) -> WarehouseResult<Vec<DailySales>> {
        require_positive("days", days)?;
        let (start, end) = Self::window(days);
        let rows = sqlx::query_as::<_, DailySales>(
            r#"
            SELECT
                date(order_date) AS "date",
                CAST(COALESCE(SUM(total_amount), 0) AS REAL) AS revenue,
                CAST(COUNT(*) AS INTEGER) AS orders
            FROM orders
            WHERE order_date >= ?1 AND order_date <= ?2
            GROUP BY date(order_date)
            ORDER BY 1
            "#,
        )
        .bind(&start)
        .bind(&end)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn revenue_by_category(&self) -> WarehouseResult<Vec<CategoryRevenue>> {
        let sql = format!(
            r"
            SELECT
                {case} AS category,
                CAST(COALESCE(SUM(oi.total_price), 0) AS REAL) AS revenue,
                CAST(COUNT(DISTINCT oi.order_id) AS INTEGER) AS orders
            FROM order_items oi
            JOIN products p ON oi.product_id = p.product_id
            GROUP BY category
            ORDER BY revenue DESC
            ",
            case = Self::category_case()
        );
        let rows = sqlx::query_as::<_, CategoryRevenue>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn monthly_comparison(&self, months: u32) -> WarehouseResult<Vec<MonthlySales>> {
        require_positive("months", months)?;
        let cutoff = Utc::now()
            .date_naive()
            .checked_sub_months(Months::new(months))
            .ok_or_else(|| WarehouseError::InvalidParameter {
                name: "months",
                reason: format!("{months} months reaches before the calendar start"),
            })?;
        let rows = sqlx::query_as::<_, MonthlySales>(
            r"
            SELECT
                strftime('%Y-%m', order_date) AS month,
                CAST(COALESCE(SUM(total_amount), 0) AS REAL) AS revenue,
                CAST(COUNT(*) AS INTEGER) AS orders,
                CAST(COALESCE(AVG(total_amount), 0) AS REAL) AS avg_order_value
            FROM orders
            WHERE date(order_date) >= ?1
            GROUP BY strftime('%Y-%m', order_date)
            ORDER BY 1
            ",
        )
        .bind(cutoff.format("%Y-%m-%d").to_string())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn customer_lifetime_value(&self, limit: u32) -> WarehouseResult<Vec<CustomerValue>> {
        require_positive("limit", limit)?;
        let rows = sqlx::query_as::<_, CustomerValue>(
            r"
            SELECT
                c.customer_id AS customer_id,
                c.first_name || ' ' || c.last_name AS customer_name,
                CAST(COUNT(DISTINCT o.order_id) AS INTEGER) AS total_orders,
                CAST(COALESCE(SUM(o.total_amount), 0) AS REAL) AS lifetime_value,
                CAST(COALESCE(AVG(o.total_amount), 0) AS REAL) AS avg_order_value
            FROM customers c
            JOIN orders o ON c.customer_id = o.customer_id
            GROUP BY c.customer_id, customer_name
            ORDER BY lifetime_value DESC
            LIMIT ?1
            ",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_case_checks_labels_in_order() {
        let case = SqliteWarehouse::category_case();
        let pro = case.find("'Pro'").unwrap();
        let ultra = case.find("'Ultra'").unwrap();
        assert!(pro < ultra);
        assert!(case.ends_with("ELSE 'Other' END"));
    }

    #[test]
    fn window_is_ordered() {
        let (start, end) = SqliteWarehouse::window(7);
        assert!(start < end);
        assert_eq!(start.len(), "2024-01-01 00:00:00".len());
    }
}
