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

use analyst::{AnalysisState, Checkpoint, SessionStore, Stage};
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use insight_server::{build_router, AppState, ServerConfig};
use llm_contracts::{LLMError, LLMResult, TextCompletion};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use warehouse::{SqliteWarehouse, Warehouse};

/// Answers by stage so a whole run completes in one pass.
struct StageScript;

#[async_trait]
impl TextCompletion for StageScript {
    async fn complete(&self, prompt: &str) -> LLMResult<String> {
        if prompt.starts_with("Original Query:") {
            Ok("1. Bundle: pair Widget Pro with accessories".to_string())
        } else if prompt.starts_with("Query:") {
            Ok("SUFFICIENT: YES\nANALYSIS: Widget Pro leads revenue.\nCHARTS: none".to_string())
        } else if prompt.starts_with("Initial query:") {
            Ok("top products and sales metrics".to_string())
        } else {
            Err(LLMError::Provider("unexpected prompt".to_string()))
        }
    }
}

async fn store(seed: bool) -> SqliteWarehouse {
    let wh = SqliteWarehouse::connect("sqlite::memory:", 1).await.unwrap();
    wh.apply_schema().await.unwrap();
    if seed {
        seed_one_order(&wh).await;
    }
    wh
}

async fn seed_one_order(wh: &SqliteWarehouse) {
    for statement in [
        "INSERT INTO customers (customer_id, first_name, last_name, annual_income) VALUES (1, 'Ada', 'Lovelace', 90000)",
        "INSERT INTO customers (customer_id, first_name, last_name, annual_income) VALUES (2, 'Alan', 'Turing', 30000)",
        "INSERT INTO products (product_id, product_name) VALUES (1, 'Widget Pro')",
        "INSERT INTO orders (order_id, customer_id, order_date, total_amount) VALUES (1, 1, datetime('now', '-1 day'), 1234.5)",
        "INSERT INTO order_items (order_id, product_id, quantity, total_price) VALUES (1, 1, 3, 1234.5)",
    ] {
        sqlx::query(statement).execute(wh.pool()).await.unwrap();
    }
}

async fn app(seed: bool) -> (Router, AppState) {
    let completion: Arc<dyn TextCompletion> = Arc::new(StageScript);
    let warehouse: Arc<dyn Warehouse> = Arc::new(store(seed).await);
    let server = ServerConfig {
        worker_limit: 2,
        ..ServerConfig::default()
    };
    let state = AppState::new(completion, warehouse, &server);
    let router = build_router(state.clone(), &server).unwrap();
    (router, state)
}

async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health_reports_service() {
    let (router, _) = app(false).await;
    let (status, body) = send(router, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "healthy", "service": "storefront-insights"}));
}

#[tokio::test]
async fn test_quick_insights_from_seeded_data() {
    let (router, _) = app(true).await;
    let (status, body) = send(router, get("/quick-insights")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"insights": [
            {"metric": "Total Revenue (30 days)", "value": "$1,234.50", "trend": "1 orders"},
            {"metric": "Top Product", "value": "Widget Pro", "trend": "$1,234.50"},
            {"metric": "Active Customers", "value": "2", "trend": "Across all segments"}
        ]})
    );
}

#[tokio::test]
async fn test_quick_insights_on_an_empty_store() {
    let (router, _) = app(false).await;
    let (status, body) = send(router, get("/quick-insights")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["insights"][0]["value"], "$0.00");
    assert_eq!(body["insights"][0]["trend"], "0 orders");
    assert_eq!(body["insights"][1]["value"], "N/A");
    assert_eq!(body["insights"][1]["trend"], "N/A");
    assert_eq!(body["insights"][2]["value"], "0");
}

#[tokio::test]
async fn test_analyze_runs_to_completion_and_is_queryable() {
    let (router, _) = app(true).await;

    let (status, body) = send(
        router.clone(),
        post_json(
            "/analyze",
            json!({"query": "What sells best?", "session_id": "run-1"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["analysis_id"], "run-1");
    assert_eq!(body["query"], "What sells best?");
    assert_eq!(body["status"], "completed");
    assert_eq!(body["results"]["analysis"], "Widget Pro leads revenue.");
    assert_eq!(
        body["results"]["recommendations"],
        "1. Bundle: pair Widget Pro with accessories"
    );
    assert_eq!(body["results"]["data"]["top_products"][0]["product_name"], "Widget Pro");
    assert_eq!(body["results"]["data"]["sales_metrics"]["total_orders"], 1);
    assert_eq!(body["results"]["charts"][0]["type"], "horizontal_bar");

    let (status, body) = send(router, get("/analyze/run-1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"analysis_id": "run-1", "status": "completed"}));
}

#[tokio::test]
async fn test_analyze_without_session_gets_a_fresh_id() {
    let (router, _) = app(false).await;
    let (status, body) = send(router, post_json("/analyze", json!({"query": "Sales?"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!body["analysis_id"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_blank_query_is_rejected() {
    let (router, _) = app(false).await;
    let (status, body) = send(router, post_json("/analyze", json!({"query": "   "}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "QUERY_REQUIRED");
    assert!(body["request_id"].is_string());
}

#[tokio::test]
async fn test_status_of_running_and_unknown_analyses() {
    let (router, state) = app(false).await;
    state.sessions().put(
        "halfway",
        Checkpoint::new(AnalysisState::new("q"), Stage::Analyze),
    );

    let (status, body) = send(router.clone(), get("/analyze/halfway")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"analysis_id": "halfway", "status": "in_progress", "next_stage": "analyze"})
    );

    let (status, body) = send(router, get("/analyze/missing")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "ANALYSIS_NOT_FOUND");
    assert_eq!(body["details"]["analysis_id"], "missing");
}

#[tokio::test]
async fn test_delete_discards_a_finished_analysis() {
    let (router, state) = app(false).await;
    let (status, _) = send(
        router.clone(),
        post_json("/analyze", json!({"query": "Sales?", "session_id": "gone"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(state.sessions().get("gone").is_some());

    let delete = || {
        Request::builder()
            .method(Method::DELETE)
            .uri("/analyze/gone")
            .body(Body::empty())
            .unwrap()
    };
    let (status, body) = send(router.clone(), delete()).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);
    assert!(state.sessions().get("gone").is_none());

    let (status, body) = send(router.clone(), delete()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "ANALYSIS_NOT_FOUND");

    let (status, _) = send(router, get("/analyze/gone")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_finished_sessions_are_bounded() {
    let completion: Arc<dyn TextCompletion> = Arc::new(StageScript);
    let warehouse: Arc<dyn Warehouse> = Arc::new(store(false).await);
    let server = ServerConfig {
        session_capacity: 3,
        ..ServerConfig::default()
    };
    let state = AppState::new(completion, warehouse, &server);
    let router = build_router(state.clone(), &server).unwrap();

    for i in 0..6 {
        let (status, _) = send(
            router.clone(),
            post_json("/analyze", json!({"query": "Sales?", "session_id": format!("s{i}")})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    assert!(state.sessions().get("s0").is_none());
    assert!(state.sessions().get("s5").is_some());
    let held = (0..6)
        .filter(|i| state.sessions().get(&format!("s{i}")).is_some())
        .count();
    assert_eq!(held, 3);
}

#[tokio::test]
async fn test_cors_preflight_allows_the_front_end() {
    let (router, _) = app(false).await;
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/analyze")
        .header(header::ORIGIN, "http://localhost:3000")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
        .body(Body::empty())
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    let headers = response.headers();
    assert_eq!(
        headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://localhost:3000"
    );
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], "POST");
}
