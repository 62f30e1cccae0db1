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

//! Iterative, model-driven analysis of storefront data: decide what to
//! fetch, judge sufficiency, narrate with charts, then recommend.

pub mod chart;
pub mod error;
pub mod orchestrator;
pub mod parser;
pub mod planner;
pub mod prompts;
pub mod session;
pub mod state;

pub use chart::{default_charts, extract_json_array, infer_charts, ChartDescriptor, PieChart, SeriesChart};
pub use error::{AnalystError, AnalystResult};
pub use orchestrator::{should_continue, Orchestrator, MAX_FETCH_ITERATIONS};
pub use parser::{MarkerResponseParser, ResponseParser, Verdict};
pub use planner::plan_fetches;
pub use session::{Checkpoint, InMemorySessionStore, SessionStore, DEFAULT_SESSION_CAPACITY};
pub use state::{AnalysisResult, AnalysisState, Datasets, Stage};
