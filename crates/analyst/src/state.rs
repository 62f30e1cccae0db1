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

use crate::chart::ChartDescriptor;
use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;
use warehouse::{Dataset, DatasetKey};

/// The stages of one analysis run. `Fetch` is the entry point, `Done` is
/// terminal; `Analyze` may loop back to `Fetch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Fetch,
    Analyze,
    Recommend,
    Done,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Fetch => "fetch",
            Stage::Analyze => "analyze",
            Stage::Recommend => "recommend",
            Stage::Done => "done",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Datasets held by a run, in fetch order. A key is written at most once.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Datasets(IndexMap<DatasetKey, Dataset>);

impl Datasets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `dataset` under its own key unless that key is already held.
    /// Returns whether it was stored.
    pub fn insert_if_absent(&mut self, dataset: Dataset) -> bool {
        let key = dataset.key();
        if self.0.contains_key(&key) {
            return false;
        }
        self.0.insert(key, dataset);
        true
    }

    pub fn contains(&self, key: DatasetKey) -> bool {
        self.0.contains_key(&key)
    }

    pub fn get(&self, key: DatasetKey) -> Option<&Dataset> {
        self.0.get(&key)
    }

    /// True when `key` is held with at least one row.
    pub fn has_rows(&self, key: DatasetKey) -> bool {
        self.get(key).is_some_and(|ds| !ds.is_empty())
    }

    pub fn keys(&self) -> impl Iterator<Item = DatasetKey> + '_ {
        self.0.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Held keys rendered for prompts and fallback text, e.g.
    /// `['sales_metrics', 'sales_trend']`.
    pub fn key_list(&self) -> String {
        let quoted: Vec<String> = self.keys().map(|k| format!("'{k}'")).collect();
        format!("[{}]", quoted.join(", "))
    }
}

/// The single record threaded through every stage of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnalysisState {
    pub query: String,
    pub data: Datasets,
    pub analysis: String,
    pub recommendations: String,
    pub charts: Vec<ChartDescriptor>,
    pub needs_more_data: bool,
    pub data_requests: Vec<String>,
    pub iteration_count: u32,
}

impl AnalysisState {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }
}

/// What a finished run hands back to its caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub query: String,
    pub data: Datasets,
    pub analysis: String,
    pub recommendations: String,
    pub charts: Vec<ChartDescriptor>,
}

impl From<AnalysisState> for AnalysisResult {
    fn from(state: AnalysisState) -> Self {
        Self {
            query: state.query,
            data: state.data,
            analysis: state.analysis,
            recommendations: state.recommendations,
            charts: state.charts,
        }
    }
}
