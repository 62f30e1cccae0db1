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

// Minimal bootstrap; handlers and configuration live in the library.
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use insight_server::{build_router, AppConfig, AppState};
use llm_contracts::TextCompletion;
use llm_providers::CompletionClient;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;
use warehouse::{SqliteWarehouse, Warehouse};

#[derive(Parser, Debug, Clone)]
#[command(name = "insight-server", about = "Storefront analysis service")]
struct Cli {
    #[command(subcommand)]
    cmd: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Serve the HTTP API (default).
    Serve,
    /// Run one analysis and print the result as JSON.
    Ask {
        query: String,
        #[arg(long)]
        session: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load().context("loading configuration")?;
    let state = build_state(&config).await?;

    match cli.cmd.unwrap_or(Command::Serve) {
        Command::Serve => run_server(config, state).await,
        Command::Ask { query, session } => ask(state, &query, session).await,
    }
}

async fn build_state(config: &AppConfig) -> Result<AppState> {
    let warehouse = SqliteWarehouse::connect(&config.warehouse.url, config.warehouse.max_connections)
        .await
        .with_context(|| format!("connecting to warehouse at {}", config.warehouse.url))?;
    if config.warehouse.apply_schema {
        warehouse.apply_schema().await.context("applying warehouse schema")?;
    }

    let completion = CompletionClient::from_settings(&config.llm)
        .context("configuring completion client")?;
    info!(provider = completion.provider_name(), model = completion.model(), "llm ready");

    let completion: Arc<dyn TextCompletion> = Arc::new(completion);
    let warehouse: Arc<dyn Warehouse> = Arc::new(warehouse);
    Ok(AppState::new(completion, warehouse, &config.server))
}

async fn ask(state: AppState, query: &str, session: Option<String>) -> Result<()> {
    let session_id = session.unwrap_or_else(|| Uuid::new_v4().to_string());
    let result = state.orchestrator.analyze(query, &session_id).await;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn run_server(config: AppConfig, state: AppState) -> Result<()> {
    info!("insight-server starting");

    let app = build_router(state, &config.server)?;
    let addr = config.socket_addr()?;
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            warn!(error=%e, %addr, "bind failed, using ephemeral");
            tokio::net::TcpListener::bind("127.0.0.1:0").await?
        }
    };
    let local = listener.local_addr()?;
    info!(%local, workers = config.server.worker_limit, "api listening");

    tokio::select! { res = axum::serve(listener, app) => res?, _ = tokio::signal::ctrl_c() => {} }

    info!("insight-server shutting down");
    Ok(())
}
