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

use serde::{Deserialize, Serialize};
use warehouse::{Warehouse, WarehouseResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsightCard {
    pub metric: String,
    pub value: String,
    pub trend: String,
}

impl InsightCard {
    fn new(metric: &str, value: impl Into<String>, trend: impl Into<String>) -> Self {
        Self {
            metric: metric.to_string(),
            value: value.into(),
            trend: trend.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickInsights {
    pub insights: Vec<InsightCard>,
}

/// Revenue over 30 days, the best seller and the active customer count.
pub async fn quick_insights(warehouse: &dyn Warehouse) -> WarehouseResult<QuickInsights> {
    let sales = warehouse.sales_metrics(30).await?;
    let products = warehouse.top_products(3).await?;
    let segments = warehouse.customer_segments().await?;

    let top_product = match products.first() {
        Some(p) => InsightCard::new(
            "Top Product",
            p.product_name.clone(),
            format_currency(p.total_revenue),
        ),
        None => InsightCard::new("Top Product", "N/A", "N/A"),
    };
    let active: i64 = segments.iter().map(|s| s.customer_count).sum();

    Ok(QuickInsights {
        insights: vec![
            InsightCard::new(
                "Total Revenue (30 days)",
                format_currency(sales.total_revenue),
                format!("{} orders", sales.total_orders),
            ),
            top_product,
            InsightCard::new("Active Customers", active.to_string(), "Across all segments"),
        ],
    })
}

/// `1234.5` → `$1,234.50`. Non-finite amounts render as `N/A`.
pub fn format_currency(amount: f64) -> String {
    if !amount.is_finite() {
        return "N/A".to_string();
    }
    let fixed = format!("{:.2}", amount.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if amount < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{sign}${grouped}.{cents}")
}
