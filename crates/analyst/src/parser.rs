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

use crate::chart::{infer_charts, ChartDescriptor, CHARTS_MARKER};
use crate::planner::plan_fetches;
use crate::state::Datasets;
use warehouse::DataRequest;

pub const SUFFICIENT_NO: &str = "SUFFICIENT: NO";
pub const SUFFICIENT_YES: &str = "SUFFICIENT: YES";
pub const NEEDED_MARKER: &str = "NEEDED:";
pub const ANALYSIS_MARKER: &str = "ANALYSIS:";

/// The analyst's judgement of whether the held data answers the query.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    NeedsMoreData {
        requests: Vec<String>,
    },
    Sufficient {
        analysis: String,
        charts: Vec<ChartDescriptor>,
    },
}

/// Turns free-text model output into decisions for the orchestrator.
pub trait ResponseParser: Send + Sync {
    /// Warehouse calls named by a fetch decision.
    fn plan_fetches(&self, decision: &str) -> Vec<DataRequest>;

    /// Sufficiency verdict for an analysis response, given the held data.
    fn verdict(&self, response: &str, data: &Datasets) -> Verdict;
}

/// Reads the `SUFFICIENT:` / `NEEDED:` / `ANALYSIS:` / `CHARTS:` markers.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkerResponseParser;

impl ResponseParser for MarkerResponseParser {
    fn plan_fetches(&self, decision: &str) -> Vec<DataRequest> {
        plan_fetches(decision)
    }

    fn verdict(&self, response: &str, data: &Datasets) -> Verdict {
        if response.contains(SUFFICIENT_NO) {
            return Verdict::NeedsMoreData {
                requests: needed_lines(response),
            };
        }
        Verdict::Sufficient {
            analysis: analysis_text(response),
            charts: infer_charts(response, data),
        }
    }
}

fn needed_lines(response: &str) -> Vec<String> {
    let Some((_, after)) = response.split_once(NEEDED_MARKER) else {
        return Vec::new();
    };
    let section = after
        .split_once(ANALYSIS_MARKER)
        .map_or(after, |(needed, _)| needed);

    section
        .lines()
        .filter(|line| !line.trim().is_empty() && !line.starts_with("SUFFICIENT"))
        .map(|line| {
            line.trim()
                .trim_start_matches(['-', ' ', '•'])
                .trim()
                .to_string()
        })
        .filter(|line| !line.is_empty())
        .collect()
}

fn analysis_text(response: &str) -> String {
    match response.split_once(ANALYSIS_MARKER) {
        Some((_, after)) => after
            .split_once(CHARTS_MARKER)
            .map_or(after, |(analysis, _)| analysis)
            .trim()
            .to_string(),
        None => response.replace(SUFFICIENT_YES, "").trim().to_string(),
    }
}
