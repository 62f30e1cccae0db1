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

//! The Fetch → Analyze → Recommend loop.
//!
//! Every stage absorbs its own failures: a completion or warehouse error
//! swaps in that stage's fallback and the run carries on. The only bound on
//! the Analyze → Fetch back-edge is [`MAX_FETCH_ITERATIONS`].

use crate::chart::default_charts;
use crate::error::{AnalystError, AnalystResult};
use crate::parser::{MarkerResponseParser, ResponseParser, Verdict};
use crate::planner::{DEFAULT_REQUESTS, FALLBACK_REQUESTS};
use crate::prompts;
use crate::session::{Checkpoint, InMemorySessionStore, SessionStore};
use crate::state::{AnalysisResult, AnalysisState, Stage};
use llm_contracts::TextCompletion;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use warehouse::{DataRequest, Dataset, Warehouse, WarehouseResult};

/// Fetch visits allowed before Recommend is forced; the fourth fetch is
/// the last.
pub const MAX_FETCH_ITERATIONS: u32 = 3;

pub const GATHERING_PLACEHOLDER: &str = "Gathering additional data based on analysis needs...";
pub const RECOMMENDATION_FALLBACK: &str =
    "Unable to generate recommendations. Please review the analysis.";

/// Where to go after Analyze.
pub fn should_continue(state: &AnalysisState) -> Stage {
    if state.iteration_count > MAX_FETCH_ITERATIONS {
        warn!(
            iterations = state.iteration_count,
            "iteration cap reached, moving to recommendations"
        );
        return Stage::Recommend;
    }
    if state.needs_more_data && !state.data_requests.is_empty() {
        info!(requests = ?state.data_requests, "analyst requested more data");
        return Stage::Fetch;
    }
    Stage::Recommend
}

pub struct Orchestrator<C, W> {
    completion: C,
    warehouse: W,
    parser: Arc<dyn ResponseParser>,
    sessions: Arc<dyn SessionStore>,
}

impl<C, W> Orchestrator<C, W>
where
    C: TextCompletion,
    W: Warehouse,
{
    pub fn new(completion: C, warehouse: W) -> Self {
        Self {
            completion,
            warehouse,
            parser: Arc::new(MarkerResponseParser),
            sessions: Arc::new(InMemorySessionStore::new()),
        }
    }

    pub fn with_parser(mut self, parser: Arc<dyn ResponseParser>) -> Self {
        self.parser = parser;
        self
    }

    pub fn with_session_store(mut self, sessions: Arc<dyn SessionStore>) -> Self {
        self.sessions = sessions;
        self
    }

    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    pub fn warehouse(&self) -> &W {
        &self.warehouse
    }

    /// Runs a fresh analysis of `query`, checkpointing under `session_id`.
    pub async fn analyze(&self, query: &str, session_id: &str) -> AnalysisResult {
        info!(session_id, query, "starting analysis");
        self.run(session_id, AnalysisState::new(query), Stage::Fetch)
            .await
    }

    /// Continues the run checkpointed under `session_id` from its recorded
    /// next stage. A finished run is returned as is.
    pub async fn resume(&self, session_id: &str) -> AnalystResult<AnalysisResult> {
        let checkpoint = self
            .sessions
            .get(session_id)
            .ok_or_else(|| AnalystError::UnknownSession(session_id.to_string()))?;
        info!(session_id, next = %checkpoint.next, "resuming analysis");
        Ok(self
            .run(session_id, checkpoint.state, checkpoint.next)
            .await)
    }

    async fn run(&self, session_id: &str, mut state: AnalysisState, mut stage: Stage) -> AnalysisResult {
        loop {
            self.sessions
                .put(session_id, Checkpoint::new(state.clone(), stage));
            debug!(session_id, %stage, iteration = state.iteration_count, "entering stage");

            stage = match stage {
                Stage::Fetch => {
                    self.fetch_stage(&mut state).await;
                    Stage::Analyze
                }
                Stage::Analyze => {
                    self.analyze_stage(&mut state).await;
                    should_continue(&state)
                }
                Stage::Recommend => {
                    self.recommend_stage(&mut state).await;
                    Stage::Done
                }
                Stage::Done => break,
            };
        }

        info!(
            session_id,
            iterations = state.iteration_count,
            datasets = state.data.len(),
            charts = state.charts.len(),
            "analysis complete"
        );
        state.into()
    }

    pub async fn fetch_stage(&self, state: &mut AnalysisState) {
        let prompt = prompts::fetch_prompt(state);

        if let Err(e) = self.fetch_decided(state, &prompt).await {
            error!(error = %e, "fetch stage failed");
            if state.data.is_empty() {
                match self.fetch_batch(&FALLBACK_REQUESTS).await {
                    Ok(datasets) => Self::store(state, datasets),
                    Err(e) => error!(error = %e, "fallback fetch failed, continuing without data"),
                }
            }
        }

        state.data_requests.clear();
        state.iteration_count += 1;
    }

    async fn fetch_decided(&self, state: &mut AnalysisState, prompt: &str) -> AnalystResult<()> {
        let decision = self.completion.complete(prompt).await?;
        debug!(decision = %decision, "fetch decision");

        for request in self.parser.plan_fetches(&decision) {
            if state.data.contains(request.key()) {
                debug!(%request, "already held, skipping");
                continue;
            }
            let dataset = self.warehouse.fetch(request).await?;
            info!(%request, rows = dataset.row_count(), "fetched dataset");
            state.data.insert_if_absent(dataset);
        }

        if state.data.is_empty() && state.iteration_count == 0 {
            info!("no specific data requested, fetching the default datasets");
            let datasets = self.fetch_batch(&DEFAULT_REQUESTS).await?;
            Self::store(state, datasets);
        }
        Ok(())
    }

    /// All of `requests` or nothing.
    async fn fetch_batch(&self, requests: &[DataRequest]) -> WarehouseResult<Vec<Dataset>> {
        let mut datasets = Vec::with_capacity(requests.len());
        for request in requests {
            datasets.push(self.warehouse.fetch(*request).await?);
        }
        Ok(datasets)
    }

    fn store(state: &mut AnalysisState, datasets: Vec<Dataset>) {
        for dataset in datasets {
            state.data.insert_if_absent(dataset);
        }
    }

    pub async fn analyze_stage(&self, state: &mut AnalysisState) {
        let response = match serde_json::to_string_pretty(&state.data) {
            Ok(data_json) => {
                let prompt = prompts::analysis_prompt(&state.query, &data_json);
                self.completion.complete(&prompt).await.map_err(AnalystError::from)
            }
            Err(e) => Err(AnalystError::Completion(llm_contracts::LLMError::Serialisation(
                e.to_string(),
            ))),
        };

        match response {
            Ok(text) => match self.parser.verdict(&text, &state.data) {
                Verdict::NeedsMoreData { requests } => {
                    state.needs_more_data = true;
                    state.data_requests = requests;
                    state.analysis = GATHERING_PLACEHOLDER.to_string();
                    state.charts.clear();
                }
                Verdict::Sufficient { analysis, charts } => {
                    state.needs_more_data = false;
                    state.data_requests.clear();
                    state.analysis = analysis;
                    state.charts = charts;
                    info!(charts = state.charts.len(), "analysis ready");
                }
            },
            Err(e) => {
                error!(error = %e, "analyze stage failed, using available data");
                state.needs_more_data = false;
                state.analysis = format!(
                    "Analysis based on available data: {}",
                    state.data.key_list()
                );
                state.charts = default_charts(&state.data);
            }
        }
    }

    pub async fn recommend_stage(&self, state: &mut AnalysisState) {
        let prompt = prompts::recommendation_prompt(&state.query, &state.analysis);
        state.recommendations = match self.completion.complete(&prompt).await {
            Ok(text) => text,
            Err(e) => {
                error!(error = %e, "recommend stage failed");
                RECOMMENDATION_FALLBACK.to_string()
            }
        };
    }
}
