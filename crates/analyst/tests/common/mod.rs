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

#![allow(dead_code)]

use async_trait::async_trait;
use llm_contracts::{LLMError, LLMResult, TextCompletion};
use std::collections::HashSet;
use std::sync::Mutex;
use warehouse::{
    CategoryRevenue, CustomerSegment, CustomerValue, DailySales, DataRequest, DatasetKey,
    MonthlySales, ProductSales, SalesMetrics, Warehouse, WarehouseError, WarehouseResult,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    Fetch,
    Analyze,
    Recommend,
}

impl PromptKind {
    pub fn of(prompt: &str) -> Self {
        if prompt.starts_with("Original Query:") {
            PromptKind::Recommend
        } else if prompt.starts_with("Query:") {
            PromptKind::Analyze
        } else {
            PromptKind::Fetch
        }
    }
}

type Handler = Box<dyn Fn(PromptKind, usize) -> LLMResult<String> + Send + Sync>;

/// Answers each prompt from a handler keyed on the stage it came from and
/// how many prompts of that stage came before it.
pub struct ScriptedCompletion {
    handler: Handler,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedCompletion {
    pub fn new(
        handler: impl Fn(PromptKind, usize) -> LLMResult<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            handler: Box::new(handler),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn prompts_of(&self, kind: PromptKind) -> Vec<String> {
        self.prompts()
            .into_iter()
            .filter(|p| PromptKind::of(p) == kind)
            .collect()
    }
}

#[async_trait]
impl TextCompletion for ScriptedCompletion {
    async fn complete(&self, prompt: &str) -> LLMResult<String> {
        let kind = PromptKind::of(prompt);
        let seen = {
            let mut prompts = self.prompts.lock().unwrap();
            let seen = prompts.iter().filter(|p| PromptKind::of(p) == kind).count();
            prompts.push(prompt.to_string());
            seen
        };
        (self.handler)(kind, seen)
    }
}

pub fn offline<T>() -> LLMResult<T> {
    Err(LLMError::Network("connection refused".to_string()))
}

/// Canned rows, a record of every call and a set of keys that fail.
#[derive(Default)]
pub struct MemoryWarehouse {
    calls: Mutex<Vec<DataRequest>>,
    failing: HashSet<DatasetKey>,
}

impl MemoryWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(keys: &[DatasetKey]) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failing: keys.iter().copied().collect(),
        }
    }

    pub fn calls(&self) -> Vec<DataRequest> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, request: DataRequest) -> WarehouseResult<()> {
        self.calls.lock().unwrap().push(request);
        if self.failing.contains(&request.key()) {
            return Err(WarehouseError::Unavailable(format!("{request} is down")));
        }
        Ok(())
    }
}

#[async_trait]
impl Warehouse for MemoryWarehouse {
    async fn sales_metrics(&self, days: u32) -> WarehouseResult<SalesMetrics> {
        self.record(DataRequest::SalesMetrics { days })?;
        Ok(SalesMetrics {
            period_days: days,
            total_orders: 12,
            total_revenue: 1_234.5,
            avg_order_value: 102.875,
            unique_customers: 9,
        })
    }

    async fn top_products(&self, limit: u32) -> WarehouseResult<Vec<ProductSales>> {
        self.record(DataRequest::TopProducts { limit })?;
        Ok((1..=6)
            .take(limit as usize)
            .map(|i| ProductSales {
                product_name: format!("Product {i}"),
                total_sold: 10 - i,
                total_revenue: 100.0 * (10 - i) as f64,
                orders_count: 3,
            })
            .collect())
    }

    async fn customer_segments(&self) -> WarehouseResult<Vec<CustomerSegment>> {
        self.record(DataRequest::CustomerSegments)?;
        Ok(vec![CustomerSegment {
            segment: "High Value".to_string(),
            customer_count: 4,
            avg_income: 91_000.0,
        }])
    }

    async fn sales_trend(&self, days: u32) -> WarehouseResult<Vec<DailySales>> {
        self.record(DataRequest::SalesTrend { days })?;
        Ok(vec![
            DailySales {
                date: "2024-06-01".to_string(),
                revenue: 300.0,
                orders: 3,
            },
            DailySales {
                date: "2024-06-02".to_string(),
                revenue: 150.0,
                orders: 1,
            },
        ])
    }

    async fn revenue_by_category(&self) -> WarehouseResult<Vec<CategoryRevenue>> {
        self.record(DataRequest::RevenueByCategory)?;
        Ok(vec![CategoryRevenue {
            category: "Pro".to_string(),
            revenue: 800.0,
            orders: 6,
        }])
    }

    async fn monthly_comparison(&self, months: u32) -> WarehouseResult<Vec<MonthlySales>> {
        self.record(DataRequest::MonthlyComparison { months })?;
        Ok(vec![MonthlySales {
            month: "2024-05".to_string(),
            revenue: 900.0,
            orders: 8,
            avg_order_value: 112.5,
        }])
    }

    async fn customer_lifetime_value(&self, limit: u32) -> WarehouseResult<Vec<CustomerValue>> {
        self.record(DataRequest::CustomerLifetimeValue { limit })?;
        Ok(vec![CustomerValue {
            customer_id: 7,
            customer_name: "Grace Hopper".to_string(),
            total_orders: 5,
            lifetime_value: 640.0,
            avg_order_value: 128.0,
        }])
    }
}
