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

use crate::state::AnalysisState;

const DATA_FUNCTIONS: &str = "\
Available data functions:
- get_sales_metrics(days): Revenue, orders, avg order value
- get_top_products(limit): Top products by revenue
- get_customer_segments(): Customer segmentation
- get_sales_trend(days): Daily sales data for LINE CHARTS
- get_revenue_by_category(): Revenue breakdown by category for PIE/BAR CHARTS
- get_monthly_comparison(months): Monthly revenue comparison for BAR CHARTS
- get_customer_lifetime_value(limit): Top customers by LTV";

const ANALYSIS_INSTRUCTIONS: &str = r#"IMPORTANT: The data keys are at the top level (e.g., "top_products", "sales_trend", "customer_segments").
Do NOT use nested paths like "top_products.top_products" - use only the top-level key name.

Your tasks:
1. Determine if you have enough data to answer the query
2. Provide comprehensive analysis
3. Recommend appropriate chart visualizations

Available chart types:
- line: For trends over time
- bar: For vertical comparisons
- pie: For proportions/percentages
- horizontal_bar: For horizontal ranking comparisons

Response format:
SUFFICIENT: YES or NO

If NO:
NEEDED: [specific data points needed]

If YES:
ANALYSIS: [your comprehensive analysis]
CHARTS: [JSON array of chart configs]

CRITICAL CHART CONFIG RULES:
1. data_key: Use ONLY the top-level key name from the data (e.g., "top_products", NOT "top_products.top_products")
2. x_field: ALWAYS the categorical/label field name (e.g., "product_name", "date", "segment")
3. y_fields: ALWAYS array of numeric field names (e.g., ["total_revenue"], ["customer_count"])
4. For pie charts: use name_field and value_field instead of x_field and y_fields

Chart Examples:
{
    "type": "horizontal_bar",
    "title": "Top Products by Revenue",
    "data_key": "top_products",
    "x_field": "product_name",
    "y_fields": ["total_revenue"],
    "description": "Revenue ranking"
}

{
    "type": "pie",
    "title": "Revenue by Category",
    "data_key": "revenue_by_category",
    "name_field": "category",
    "value_field": "revenue",
    "description": "Category distribution"
}"#;

const RECOMMENDATION_INSTRUCTIONS: &str = "\
Based on this analysis, provide 3-5 actionable business recommendations.

Format your response as:
1. [Recommendation]: [Specific action with expected impact]
2. [Recommendation]: [Specific action with expected impact]
3. [Recommendation]: [Specific action with expected impact]

Focus on:
- Practical, implementable actions
- Expected business impact
- Specific metrics to improve";

/// Opening line of the fetch prompt: outstanding requests, or the query on
/// the first pass.
pub fn fetch_context(state: &AnalysisState) -> String {
    if state.data_requests.is_empty() {
        format!("Initial query: {}", state.query)
    } else {
        format!(
            "Additional data requested: {}",
            state.data_requests.join(", ")
        )
    }
}

pub fn fetch_prompt(state: &AnalysisState) -> String {
    format!(
        "{context}\n\n{DATA_FUNCTIONS}\n\nCurrent data: {held}\n\n\
         Determine what data to fetch. Be specific about parameters.\n\
         For chart queries, fetch the appropriate chart data sources.",
        context = fetch_context(state),
        held = state.data.key_list(),
    )
}

pub fn analysis_prompt(query: &str, data_json: &str) -> String {
    format!("Query: {query}\n\nAvailable Data Structure:\n{data_json}\n\n{ANALYSIS_INSTRUCTIONS}")
}

pub fn recommendation_prompt(query: &str, analysis: &str) -> String {
    format!("Original Query: {query}\n\nAnalysis:\n{analysis}\n\n{RECOMMENDATION_INSTRUCTIONS}")
}
