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

use crate::error::WarehouseResult;
use crate::types::{
    CategoryRevenue, CustomerSegment, CustomerValue, DailySales, DataRequest, Dataset,
    MonthlySales, ProductSales, SalesMetrics,
};
use async_trait::async_trait;
use std::sync::Arc;

/// Read-only aggregations over orders, order items, products and customers.
/// Implementations do no retrying; errors go straight back to the caller.
#[async_trait]
pub trait Warehouse: Send + Sync {
    async fn sales_metrics(&self, days: u32) -> WarehouseResult<SalesMetrics>;

    async fn top_products(&self, limit: u32) -> WarehouseResult<Vec<ProductSales>>;

    async fn customer_segments(&self) -> WarehouseResult<Vec<CustomerSegment>>;

    async fn sales_trend(&self, days: u32) -> WarehouseResult<Vec<DailySales>>;

    async fn revenue_by_category(&self) -> WarehouseResult<Vec<CategoryRevenue>>;

    async fn monthly_comparison(&self, months: u32) -> WarehouseResult<Vec<MonthlySales>>;

    async fn customer_lifetime_value(&self, limit: u32) -> WarehouseResult<Vec<CustomerValue>>;

    async fn fetch(&self, request: DataRequest) -> WarehouseResult<Dataset> {
        Ok(match request {
            DataRequest::SalesMetrics { days } => Dataset::SalesMetrics(self.sales_metrics(days).await?),
            DataRequest::TopProducts { limit } => Dataset::TopProducts(self.top_products(limit).await?),
            DataRequest::CustomerSegments => Dataset::CustomerSegments(self.customer_segments().await?),
            DataRequest::SalesTrend { days } => Dataset::SalesTrend(self.sales_trend(days).await?),
            DataRequest::RevenueByCategory => {
                Dataset::RevenueByCategory(self.revenue_by_category().await?)
            }
            DataRequest::MonthlyComparison { months } => {
                Dataset::MonthlyComparison(self.monthly_comparison(months).await?)
            }
            DataRequest::CustomerLifetimeValue { limit } => {
                Dataset::TopCustomers(self.customer_lifetime_value(limit).await?)
            }
        })
    }
}

#[async_trait]
impl<T: Warehouse + ?Sized> Warehouse for Arc<T> {
    async fn sales_metrics(&self, days: u32) -> WarehouseResult<SalesMetrics> {
        (**self).sales_metrics(days).await
    }

    async fn top_products(&self, limit: u32) -> WarehouseResult<Vec<ProductSales>> {
        (**self).top_products(limit).await
    }

    async fn customer_segments(&self) -> WarehouseResult<Vec<CustomerSegment>> {
        (**self).customer_segments().await
    }

    async fn sales_trend(&self, days: u32) -> WarehouseResult<Vec<DailySales>> {
        (**self).sales_trend(days).await
    }

    async fn revenue_by_category(&self) -> WarehouseResult<Vec<CategoryRevenue>> {
        (**self).revenue_by_category().await
    }

    async fn monthly_comparison(&self, months: u32) -> WarehouseResult<Vec<MonthlySales>> {
        (**self).monthly_comparison(months).await
    }

    async fn customer_lifetime_value(&self, limit: u32) -> WarehouseResult<Vec<CustomerValue>> {
        (**self).customer_lifetime_value(limit).await
    }

    async fn fetch(&self, request: DataRequest) -> WarehouseResult<Dataset> {
        (**self).fetch(request).await
    }
}
