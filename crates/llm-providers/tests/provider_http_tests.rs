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

use llm_contracts::{LLMError, Provider, TextCompletion};
use llm_providers::{CompletionClient, ProviderSettings};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn anthropic_settings(server: &MockServer) -> ProviderSettings {
    ProviderSettings {
        provider: Provider::Anthropic,
        model: "claude-test".into(),
        endpoint: Some(format!("{}/v1/messages", server.uri())),
        api_key: Some("test-key".into()),
        max_tokens: 512,
        temperature: None,
        timeout_seconds: 5,
    }
}

#[tokio::test]
async fn test_anthropic_completion_returns_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "test-key"))
        .and(header("anthropic-version", "2023-06-01"))
        .and(body_partial_json(json!({
            "model": "claude-test",
            "max_tokens": 512,
            "messages": [{"role": "user", "content": "Which products sell best?"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{"type": "text", "text": "SUFFICIENT: YES\nANALYSIS: fine"}],
            "usage": {"input_tokens": 10, "output_tokens": 6},
            "stop_reason": "end_turn"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = CompletionClient::from_settings(&anthropic_settings(&server)).unwrap();
    let text = client.complete("Which products sell best?").await.unwrap();
    assert_eq!(text, "SUFFICIENT: YES\nANALYSIS: fine");
}

#[tokio::test]
async fn test_anthropic_rate_limit_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(429))
        .expect(1)
        .mount(&server)
        .await;

    let client = CompletionClient::from_settings(&anthropic_settings(&server)).unwrap();
    let err = client.complete("hi").await.unwrap_err();
    assert!(matches!(err, LLMError::RateLimit));
}

#[tokio::test]
async fn test_anthropic_auth_failure_maps_to_authentication() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid x-api-key"))
        .mount(&server)
        .await;

    let client = CompletionClient::from_settings(&anthropic_settings(&server)).unwrap();
    let err = client.complete("hi").await.unwrap_err();
    assert!(matches!(err, LLMError::Authentication(msg) if msg.contains("invalid x-api-key")));
}

#[tokio::test]
async fn test_anthropic_server_error_is_provider_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(529).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let client = CompletionClient::from_settings(&anthropic_settings(&server)).unwrap();
    let err = client.complete("hi").await.unwrap_err();
    assert!(matches!(err, LLMError::Provider(msg) if msg.contains("overloaded")));
}

#[tokio::test]
async fn test_ollama_chat_completion() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({"model": "llama3.1", "stream": false})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": {"role": "assistant", "content": "fetch the sales trend"},
            "done": true,
            "prompt_eval_count": 20,
            "eval_count": 4
        })))
        .mount(&server)
        .await;

    let settings = ProviderSettings {
        provider: Provider::Ollama,
        model: "llama3.1".into(),
        endpoint: Some(server.uri()),
        ..ProviderSettings::default()
    };
    let client = CompletionClient::from_settings(&settings).unwrap();
    assert_eq!(client.complete("what now?").await.unwrap(), "fetch the sales trend");
}

#[tokio::test]
async fn test_malformed_body_is_a_provider_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"unexpected": true})))
        .mount(&server)
        .await;

    let client = CompletionClient::from_settings(&anthropic_settings(&server)).unwrap();
    assert!(matches!(
        client.complete("hi").await,
        Err(LLMError::Provider(_))
    ));
}
