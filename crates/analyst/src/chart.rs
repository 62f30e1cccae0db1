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

//! Chart descriptors and their inference from analysis text.
//!
//! The model is asked to emit a JSON array after a `CHARTS:` marker. When
//! that array is missing or unusable, charts are synthesised from whichever
//! datasets are held.

use crate::state::Datasets;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use warehouse::DatasetKey;

pub const CHARTS_MARKER: &str = "CHARTS:";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChartDescriptor {
    Line(SeriesChart),
    Bar(SeriesChart),
    HorizontalBar(SeriesChart),
    Pie(PieChart),
}

/// Category on one axis, one or more numeric series on the other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesChart {
    pub title: String,
    pub data_key: String,
    pub x_field: String,
    pub y_fields: Vec<String>,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PieChart {
    pub title: String,
    pub data_key: String,
    pub name_field: String,
    pub value_field: String,
    #[serde(default)]
    pub description: String,
}

impl ChartDescriptor {
    pub fn kind(&self) -> &'static str {
        match self {
            ChartDescriptor::Line(_) => "line",
            ChartDescriptor::Bar(_) => "bar",
            ChartDescriptor::HorizontalBar(_) => "horizontal_bar",
            ChartDescriptor::Pie(_) => "pie",
        }
    }

    pub fn title(&self) -> &str {
        match self {
            ChartDescriptor::Line(c) | ChartDescriptor::Bar(c) | ChartDescriptor::HorizontalBar(c) => {
                &c.title
            }
            ChartDescriptor::Pie(c) => &c.title,
        }
    }

    pub fn data_key(&self) -> &str {
        match self {
            ChartDescriptor::Line(c) | ChartDescriptor::Bar(c) | ChartDescriptor::HorizontalBar(c) => {
                &c.data_key
            }
            ChartDescriptor::Pie(c) => &c.data_key,
        }
    }

    fn series(
        key: DatasetKey,
        title: &str,
        x_field: &str,
        y_field: &str,
        description: &str,
    ) -> SeriesChart {
        SeriesChart {
            title: title.to_string(),
            data_key: key.as_str().to_string(),
            x_field: x_field.to_string(),
            y_fields: vec![y_field.to_string()],
            description: description.to_string(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ChartParseError {
    #[error("no '[' after the CHARTS: marker")]
    MissingArray,
    #[error("chart array is never closed")]
    Unbalanced,
    #[error("chart array is not valid: {0}")]
    Json(#[from] serde_json::Error),
    #[error("chart '{0}' has no y_fields")]
    EmptySeries(String),
    #[error("chart '{title}' references '{data_key}', which is not a held dataset")]
    UnknownDataKey { title: String, data_key: String },
}

/// Returns the first JSON array in `text`, from its opening `[` through the
/// matching `]`. Brackets inside string literals are not counted.
pub fn extract_json_array(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parses the array following a `CHARTS:` section body. Every chart must
/// point at a top-level dataset held in `data`.
pub fn parse_chart_section(
    section: &str,
    data: &Datasets,
) -> Result<Vec<ChartDescriptor>, ChartParseError> {
    if !section.contains('[') {
        return Err(ChartParseError::MissingArray);
    }
    let array = extract_json_array(section).ok_or(ChartParseError::Unbalanced)?;
    let charts: Vec<ChartDescriptor> = serde_json::from_str(array)?;

    for chart in &charts {
        if let ChartDescriptor::Line(c) | ChartDescriptor::Bar(c) | ChartDescriptor::HorizontalBar(c) =
            chart
        {
            if c.y_fields.is_empty() {
                return Err(ChartParseError::EmptySeries(c.title.clone()));
            }
        }
        let held = DatasetKey::parse(chart.data_key()).is_some_and(|key| data.contains(key));
        if !held {
            return Err(ChartParseError::UnknownDataKey {
                title: chart.title().to_string(),
                data_key: chart.data_key().to_string(),
            });
        }
    }
    Ok(charts)
}

/// Charts from the model's `CHARTS:` array when it parses, otherwise the
/// defaults for the held datasets.
pub fn infer_charts(text: &str, data: &Datasets) -> Vec<ChartDescriptor> {
    if let Some((_, section)) = text.split_once(CHARTS_MARKER) {
        match parse_chart_section(section, data) {
            Ok(charts) => {
                info!(count = charts.len(), "parsed charts from analysis");
                return charts;
            }
            Err(e) => warn!(error = %e, "failed to parse charts from analysis"),
        }
    }
    debug!("using default chart generation");
    default_charts(data)
}

pub fn default_charts(data: &Datasets) -> Vec<ChartDescriptor> {
    let mut charts = Vec::new();

    if data.has_rows(DatasetKey::SalesTrend) {
        charts.push(ChartDescriptor::Line(ChartDescriptor::series(
            DatasetKey::SalesTrend,
            "Sales Trend Over Time",
            "date",
            "revenue",
            "Daily revenue trend",
        )));
    }
    if data.has_rows(DatasetKey::TopProducts) {
        charts.push(ChartDescriptor::HorizontalBar(ChartDescriptor::series(
            DatasetKey::TopProducts,
            "Top Products by Revenue",
            "product_name",
            "total_revenue",
            "Product performance comparison",
        )));
    }
    if data.has_rows(DatasetKey::RevenueByCategory) {
        charts.push(ChartDescriptor::Pie(PieChart {
            title: "Revenue Distribution by Category".to_string(),
            data_key: DatasetKey::RevenueByCategory.as_str().to_string(),
            name_field: "category".to_string(),
            value_field: "revenue".to_string(),
            description: "Category revenue breakdown".to_string(),
        }));
    }
    if data.has_rows(DatasetKey::MonthlyComparison) {
        charts.push(ChartDescriptor::Bar(ChartDescriptor::series(
            DatasetKey::MonthlyComparison,
            "Monthly Revenue Comparison",
            "month",
            "revenue",
            "Month-over-month revenue performance",
        )));
    }
    if data.has_rows(DatasetKey::CustomerSegments) {
        charts.push(ChartDescriptor::HorizontalBar(ChartDescriptor::series(
            DatasetKey::CustomerSegments,
            "Customer Segments Distribution",
            "segment",
            "customer_count",
            "Customer distribution across segments",
        )));
    }

    debug!(count = charts.len(), "generated default charts");
    charts
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use warehouse::{CategoryRevenue, DailySales, Dataset, ProductSales};

    fn held() -> Datasets {
        let mut data = Datasets::new();
        data.insert_if_absent(Dataset::RevenueByCategory(vec![CategoryRevenue {
            category: "Pro".into(),
            revenue: 10.0,
            orders: 1,
        }]));
        data.insert_if_absent(Dataset::TopProducts(vec![ProductSales {
            product_name: "Widget Pro".into(),
            total_sold: 1,
            total_revenue: 10.0,
            orders_count: 1,
        }]));
        data.insert_if_absent(Dataset::SalesTrend(vec![DailySales {
            date: "2024-01-01".into(),
            revenue: 10.0,
            orders: 1,
        }]));
        data
    }

    #[test]
    fn defaults_follow_a_fixed_order() {
        let charts = default_charts(&held());
        let kinds: Vec<&str> = charts.iter().map(ChartDescriptor::kind).collect();
        assert_eq!(kinds, vec!["line", "horizontal_bar", "pie"]);

        assert_eq!(
            serde_json::to_value(&charts).unwrap(),
            json!([
                {
                    "type": "line",
                    "title": "Sales Trend Over Time",
                    "data_key": "sales_trend",
                    "x_field": "date",
                    "y_fields": ["revenue"],
                    "description": "Daily revenue trend"
                },
                {
                    "type": "horizontal_bar",
                    "title": "Top Products by Revenue",
                    "data_key": "top_products",
                    "x_field": "product_name",
                    "y_fields": ["total_revenue"],
                    "description": "Product performance comparison"
                },
                {
                    "type": "pie",
                    "title": "Revenue Distribution by Category",
                    "data_key": "revenue_by_category",
                    "name_field": "category",
                    "value_field": "revenue",
                    "description": "Category revenue breakdown"
                }
            ])
        );
    }

    #[test]
    fn empty_datasets_get_no_default_chart() {
        let mut data = Datasets::new();
        data.insert_if_absent(Dataset::SalesTrend(Vec::new()));
        assert!(default_charts(&data).is_empty());
    }

    #[test]
    fn extraction_stops_at_the_matching_bracket() {
        let text = r#"intro [{"a": [1, [2, 3]], "b": {"c": [4]}}, {"d": 5}] trailing ] text"#;
        let array = extract_json_array(text).unwrap();
        assert_eq!(array, r#"[{"a": [1, [2, 3]], "b": {"c": [4]}}, {"d": 5}]"#);

        let direct: Value = serde_json::from_str(array).unwrap();
        assert_eq!(direct, json!([{"a": [1, [2, 3]], "b": {"c": [4]}}, {"d": 5}]));
    }

    #[test]
    fn brackets_inside_strings_are_ignored() {
        let text = r#"[{"title": "Top ] products [by revenue", "esc": "a \" ] b"}] rest"#;
        assert_eq!(
            extract_json_array(text),
            Some(r#"[{"title": "Top ] products [by revenue", "esc": "a \" ] b"}]"#)
        );
        assert_eq!(extract_json_array("[1, [2]"), None);
        assert_eq!(extract_json_array("no array"), None);
    }

    #[test]
    fn parses_model_charts_when_valid() {
        let text = r#"ANALYSIS: fine
CHARTS: [{"type": "pie", "title": "Split", "data_key": "revenue_by_category",
"name_field": "category", "value_field": "revenue", "description": "d"}]"#;
        let charts = infer_charts(text, &held());
        assert_eq!(charts.len(), 1);
        assert_eq!(charts[0].kind(), "pie");
        assert_eq!(charts[0].title(), "Split");
    }

    #[test]
    fn unusable_chart_sections_fall_back_to_defaults() {
        let defaults = default_charts(&held());
        for text in [
            "CHARTS: none this time",
            "CHARTS: [{\"type\": \"line\"",
            "CHARTS: [{\"type\": \"scatter\", \"title\": \"t\", \"data_key\": \"k\"}]",
            "CHARTS: [{\"type\": \"bar\", \"title\": \"t\", \"data_key\": \"k\", \"x_field\": \"x\", \"y_fields\": []}]",
            "no marker at all",
        ] {
            assert_eq!(infer_charts(text, &held()), defaults, "input: {text}");
        }
    }

    #[test]
    fn charts_must_reference_held_top_level_keys() {
        let mut data = Datasets::new();
        data.insert_if_absent(Dataset::SalesTrend(vec![DailySales {
            date: "2024-01-01".into(),
            revenue: 10.0,
            orders: 1,
        }]));

        let dotted = r#"[{"type": "bar", "title": "Best sellers", "data_key": "top_products.top_products",
"x_field": "product_name", "y_fields": ["total_revenue"]}]"#;
        let unheld = r#"[{"type": "bar", "title": "Best sellers", "data_key": "top_products",
"x_field": "product_name", "y_fields": ["total_revenue"]}]"#;
        for section in [dotted, unheld] {
            assert!(matches!(
                parse_chart_section(section, &data),
                Err(ChartParseError::UnknownDataKey { ref title, .. }) if title == "Best sellers"
            ));
            let charts = infer_charts(&format!("CHARTS: {section}"), &data);
            assert_eq!(charts, default_charts(&data));
            assert_eq!(charts[0].data_key(), "sales_trend");
        }
    }
}
