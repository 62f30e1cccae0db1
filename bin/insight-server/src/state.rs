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

use crate::config::ServerConfig;
use crate::routes::ApiError;
use analyst::{InMemorySessionStore, Orchestrator, SessionStore};
use llm_contracts::TextCompletion;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::debug;
use warehouse::Warehouse;

pub type SharedOrchestrator = Orchestrator<Arc<dyn TextCompletion>, Arc<dyn Warehouse>>;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<SharedOrchestrator>,
    pub warehouse: Arc<dyn Warehouse>,
    workers: Arc<Semaphore>,
}

impl AppState {
    pub fn new(
        completion: Arc<dyn TextCompletion>,
        warehouse: Arc<dyn Warehouse>,
        server: &ServerConfig,
    ) -> Self {
        let sessions = Arc::new(InMemorySessionStore::with_capacity(server.session_capacity));
        let orchestrator =
            Orchestrator::new(completion, warehouse.clone()).with_session_store(sessions);
        Self {
            orchestrator: Arc::new(orchestrator),
            warehouse,
            workers: Arc::new(Semaphore::new(server.worker_limit.max(1))),
        }
    }

    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        self.orchestrator.sessions()
    }

    /// Runs `job` on its own task once a worker permit is free. At most
    /// `worker_limit` jobs run at a time; the rest wait for a permit.
    pub async fn offload<F, T>(&self, job: F) -> Result<T, ApiError>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let permit = self
            .workers
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| ApiError::internal(format!("worker pool closed: {e}")))?;
        debug!(available = self.workers.available_permits(), "worker permit acquired");

        tokio::spawn(async move {
            let _permit = permit;
            job.await
        })
        .await
        .map_err(|e| ApiError::internal(format!("worker task failed: {e}")))
    }
}
