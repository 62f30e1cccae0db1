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

use crate::config::{ConfigError, ServerConfig};
use crate::insights::{self, QuickInsights};
use crate::state::AppState;
use analyst::{AnalysisResult, ChartDescriptor, Datasets, Stage};
use axum::{
    extract::{DefaultBodyLimit, Path, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use tower_http::{
    cors::{AllowHeaders, AllowMethods, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info};
use uuid::Uuid;
use warehouse::WarehouseError;

pub const SERVICE_NAME: &str = "storefront-insights";

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<JsonValue>,
    pub request_id: String,
    #[serde(skip)]
    status: StatusCode,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details: None,
            request_id: Uuid::new_v4().to_string(),
            status,
        }
    }

    pub fn with_details(mut self, details: JsonValue) -> Self {
        self.details = Some(details);
        self
    }

    pub fn bad_request(code: &str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, message)
    }

    pub fn not_found(code: &str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, code, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<WarehouseError> for ApiError {
    fn from(e: WarehouseError) -> Self {
        let (status, code) = match &e {
            WarehouseError::InvalidParameter { .. } => (StatusCode::BAD_REQUEST, "INVALID_PARAMETER"),
            WarehouseError::Unavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "WAREHOUSE_UNAVAILABLE"),
            WarehouseError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "WAREHOUSE_ERROR"),
        };
        Self::new(status, code, e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status;
        if status.is_server_error() {
            error!(code = %self.code, message = %self.message, request_id = %self.request_id, "request failed");
        }
        let body = Json(self);
        (status, body).into_response()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalyzeRequest {
    pub query: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisBody {
    pub data: Datasets,
    pub analysis: String,
    pub recommendations: String,
    pub charts: Vec<ChartDescriptor>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzeResponse {
    pub analysis_id: String,
    pub query: String,
    pub status: &'static str,
    pub results: AnalysisBody,
}

impl AnalyzeResponse {
    fn completed(analysis_id: String, result: AnalysisResult) -> Self {
        Self {
            analysis_id,
            query: result.query,
            status: "completed",
            results: AnalysisBody {
                data: result.data,
                analysis: result.analysis,
                recommendations: result.recommendations,
                charts: result.charts,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisStatus {
    pub analysis_id: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_stage: Option<Stage>,
}

async fn health() -> Json<JsonValue> {
    Json(json!({ "status": "healthy", "service": SERVICE_NAME }))
}

async fn quick_insights(State(state): State<AppState>) -> Result<Json<QuickInsights>, ApiError> {
    let warehouse = state.warehouse.clone();
    let insights = state
        .offload(async move { insights::quick_insights(warehouse.as_ref()).await })
        .await??;
    Ok(Json(insights))
}

async fn analyze(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let query = request.query.trim().to_string();
    if query.is_empty() {
        return Err(ApiError::bad_request("QUERY_REQUIRED", "query must not be empty"));
    }
    let analysis_id = request
        .session_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    info!(%analysis_id, %query, "analysis requested");

    let orchestrator = state.orchestrator.clone();
    let session_id = analysis_id.clone();
    let result = state
        .offload(async move { orchestrator.analyze(&query, &session_id).await })
        .await?;

    Ok(Json(AnalyzeResponse::completed(analysis_id, result)))
}

async fn analysis_status(
    State(state): State<AppState>,
    Path(analysis_id): Path<String>,
) -> Result<Json<AnalysisStatus>, ApiError> {
    let checkpoint = state.sessions().get(&analysis_id).ok_or_else(|| {
        ApiError::not_found(
            "ANALYSIS_NOT_FOUND",
            format!("No analysis with id '{analysis_id}'"),
        )
        .with_details(json!({ "analysis_id": analysis_id }))
    })?;

    let status = if checkpoint.is_complete() {
        AnalysisStatus {
            analysis_id,
            status: "completed",
            next_stage: None,
        }
    } else {
        AnalysisStatus {
            analysis_id,
            status: "in_progress",
            next_stage: Some(checkpoint.next),
        }
    };
    Ok(Json(status))
}

async fn discard_analysis(
    State(state): State<AppState>,
    Path(analysis_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    match state.sessions().remove(&analysis_id) {
        Some(_) => {
            info!(%analysis_id, "analysis discarded");
            Ok(StatusCode::NO_CONTENT)
        }
        None => Err(ApiError::not_found(
            "ANALYSIS_NOT_FOUND",
            format!("No analysis with id '{analysis_id}'"),
        )
        .with_details(json!({ "analysis_id": analysis_id }))),
    }
}

/// Credentialed CORS for one origin. Wildcards are not allowed alongside
/// credentials, so methods and headers mirror the preflight.
pub fn cors_layer(origin: &str) -> Result<CorsLayer, ConfigError> {
    let origin = HeaderValue::from_str(origin)
        .map_err(|e| ConfigError::Invalid(format!("server.cors_origin '{origin}': {e}")))?;
    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true))
}

pub fn build_router(state: AppState, server: &ServerConfig) -> Result<Router, ConfigError> {
    Ok(Router::new()
        .route("/health", get(health))
        .route("/quick-insights", get(quick_insights))
        .route("/analyze", post(analyze))
        .route(
            "/analyze/{analysis_id}",
            get(analysis_status).delete(discard_analysis),
        )
        .layer(DefaultBodyLimit::max(server.body_limit_bytes))
        .layer(cors_layer(&server.cors_origin)?)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}
