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

//! Row schemas for the seven aggregation queries and the tagged dataset
//! that carries one query's result under its top-level key.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetKey {
    SalesMetrics,
    TopProducts,
    CustomerSegments,
    SalesTrend,
    RevenueByCategory,
    MonthlyComparison,
    TopCustomers,
}

impl DatasetKey {
    pub const ALL: [DatasetKey; 7] = [
        DatasetKey::SalesMetrics,
        DatasetKey::TopProducts,
        DatasetKey::CustomerSegments,
        DatasetKey::SalesTrend,
        DatasetKey::RevenueByCategory,
        DatasetKey::MonthlyComparison,
        DatasetKey::TopCustomers,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DatasetKey::SalesMetrics => "sales_metrics",
            DatasetKey::TopProducts => "top_products",
            DatasetKey::CustomerSegments => "customer_segments",
            DatasetKey::SalesTrend => "sales_trend",
            DatasetKey::RevenueByCategory => "revenue_by_category",
            DatasetKey::MonthlyComparison => "monthly_comparison",
            DatasetKey::TopCustomers => "top_customers",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }
}

impl fmt::Display for DatasetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesMetrics {
    pub period_days: u32,
    pub total_orders: i64,
    pub total_revenue: f64,
    pub avg_order_value: f64,
    pub unique_customers: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProductSales {
    pub product_name: String,
    pub total_sold: i64,
    pub total_revenue: f64,
    pub orders_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CustomerSegment {
    pub segment: String,
    pub customer_count: i64,
    pub avg_income: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct DailySales {
    /// `YYYY-MM-DD`
    pub date: String,
    pub revenue: f64,
    pub orders: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CategoryRevenue {
    pub category: String,
    pub revenue: f64,
    pub orders: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct MonthlySales {
    /// `YYYY-MM`
    pub month: String,
    pub revenue: f64,
    pub orders: i64,
    pub avg_order_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CustomerValue {
    pub customer_id: i64,
    pub customer_name: String,
    pub total_orders: i64,
    pub lifetime_value: f64,
    pub avg_order_value: f64,
}

/// One fetched aggregation. Serializes as the bare payload so a map of
/// datasets reads `{"top_products": [...], "sales_metrics": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Dataset {
    SalesMetrics(SalesMetrics),
    TopProducts(Vec<ProductSales>),
    CustomerSegments(Vec<CustomerSegment>),
    SalesTrend(Vec<DailySales>),
    RevenueByCategory(Vec<CategoryRevenue>),
    MonthlyComparison(Vec<MonthlySales>),
    TopCustomers(Vec<CustomerValue>),
}

impl Dataset {
    pub fn key(&self) -> DatasetKey {
        match self {
            Dataset::SalesMetrics(_) => DatasetKey::SalesMetrics,
            Dataset::TopProducts(_) => DatasetKey::TopProducts,
            Dataset::CustomerSegments(_) => DatasetKey::CustomerSegments,
            Dataset::SalesTrend(_) => DatasetKey::SalesTrend,
            Dataset::RevenueByCategory(_) => DatasetKey::RevenueByCategory,
            Dataset::MonthlyComparison(_) => DatasetKey::MonthlyComparison,
            Dataset::TopCustomers(_) => DatasetKey::TopCustomers,
        }
    }

    /// Number of rows; a scalar summary counts as one.
    pub fn row_count(&self) -> usize {
        match self {
            Dataset::SalesMetrics(_) => 1,
            Dataset::TopProducts(rows) => rows.len(),
            Dataset::CustomerSegments(rows) => rows.len(),
            Dataset::SalesTrend(rows) => rows.len(),
            Dataset::RevenueByCategory(rows) => rows.len(),
            Dataset::MonthlyComparison(rows) => rows.len(),
            Dataset::TopCustomers(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }
}

/// A parameterised call to one of the seven aggregation queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum DataRequest {
    SalesMetrics { days: u32 },
    TopProducts { limit: u32 },
    CustomerSegments,
    SalesTrend { days: u32 },
    RevenueByCategory,
    MonthlyComparison { months: u32 },
    CustomerLifetimeValue { limit: u32 },
}

impl DataRequest {
    pub fn key(&self) -> DatasetKey {
        match self {
            DataRequest::SalesMetrics { .. } => DatasetKey::SalesMetrics,
            DataRequest::TopProducts { .. } => DatasetKey::TopProducts,
            DataRequest::CustomerSegments => DatasetKey::CustomerSegments,
            DataRequest::SalesTrend { .. } => DatasetKey::SalesTrend,
            DataRequest::RevenueByCategory => DatasetKey::RevenueByCategory,
            DataRequest::MonthlyComparison { .. } => DatasetKey::MonthlyComparison,
            DataRequest::CustomerLifetimeValue { .. } => DatasetKey::TopCustomers,
        }
    }
}

impl fmt::Display for DataRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataRequest::SalesMetrics { days } => write!(f, "sales_metrics(days={days})"),
            DataRequest::TopProducts { limit } => write!(f, "top_products(limit={limit})"),
            DataRequest::CustomerSegments => f.write_str("customer_segments()"),
            DataRequest::SalesTrend { days } => write!(f, "sales_trend(days={days})"),
            DataRequest::RevenueByCategory => f.write_str("revenue_by_category()"),
            DataRequest::MonthlyComparison { months } => {
                write!(f, "monthly_comparison(months={months})")
            }
            DataRequest::CustomerLifetimeValue { limit } => {
                write!(f, "customer_lifetime_value(limit={limit})")
            }
        }
    }
}
