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

pub mod anthropic;
pub mod ollama;

use async_trait::async_trait;
use llm_contracts::{LLMError, LLMResult, ProviderRequest, ProviderResponse};
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

#[async_trait]
pub trait ApiClient: Send + Sync {
    async fn send_request(&self, request: ProviderRequest) -> LLMResult<ProviderResponse>;

    fn provider_name(&self) -> &'static str;
}

pub use anthropic::AnthropicClient;
pub use ollama::OllamaClient;

pub(crate) fn build_http_client(timeout: Duration) -> LLMResult<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| LLMError::Configuration(format!("Failed to create HTTP client: {e}")))
}

/// One attempt, no retry. The caller decides what a failure means.
pub(crate) async fn send_once(
    provider: &str,
    timeout: Duration,
    request: reqwest::RequestBuilder,
) -> LLMResult<Value> {
    debug!(provider, "Sending completion request");
    let response = match tokio::time::timeout(timeout, request.send()).await {
        Ok(Ok(resp)) => resp,
        Ok(Err(e)) if e.is_timeout() => return Err(LLMError::Timeout),
        Ok(Err(e)) => return Err(LLMError::Network(format!("Request failed: {e}"))),
        Err(_) => {
            warn!(
                provider,
                "Request timed out after {} seconds",
                timeout.as_secs()
            );
            return Err(LLMError::Timeout);
        }
    };
    read_json(provider, response).await
}

async fn read_json(provider: &str, resp: Response) -> LLMResult<Value> {
    let status = resp.status();
    debug!(provider, %status, "Received provider response");

    if status.is_success() {
        return resp
            .json::<Value>()
            .await
            .map_err(|e| LLMError::Serialisation(format!("Failed to parse JSON response: {e}")));
    }

    let body = resp.text().await.unwrap_or_default();
    Err(match status {
        StatusCode::TOO_MANY_REQUESTS => LLMError::RateLimit,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            LLMError::Authentication(format!("{provider} rejected credentials: {body}"))
        }
        _ => LLMError::Provider(format!("{provider} API error {status}: {body}")),
    })
}

pub(crate) fn token_count(value: &Value) -> u32 {
    value
        .as_u64()
        .and_then(|n| u32::try_from(n).ok())
        .unwrap_or(0)
}
