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

use async_trait::async_trait;
use llm_contracts::{LLMError, LLMResult, ProviderRequest, ProviderResponse, Usage};
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

use super::{build_http_client, send_once, token_count, ApiClient};

pub const DEFAULT_ENDPOINT: &str = "https://api.anthropic.com/v1/messages";
pub const DEFAULT_API_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone)]
pub struct AnthropicClient {
    client: Client,
    api_key: String,
    endpoint: String,
    api_version: String,
    timeout: Duration,
}

impl AnthropicClient {
    pub fn new(
        api_key: String,
        endpoint: Option<String>,
        api_version: Option<String>,
        timeout_seconds: Option<u32>,
    ) -> LLMResult<Self> {
        if api_key.trim().is_empty() {
            return Err(LLMError::Authentication(
                "Anthropic API key is not set".to_string(),
            ));
        }
        let timeout = Duration::from_secs(timeout_seconds.unwrap_or(60).into());

        Ok(Self {
            client: build_http_client(timeout)?,
            api_key,
            endpoint: endpoint.unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            api_version: api_version.unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
            timeout,
        })
    }

    fn build_anthropic_payload(request: &ProviderRequest) -> Value {
        let mut system_content = Vec::new();
        let mut regular_messages = Vec::new();

        for msg in &request.messages {
            if msg.role == "system" {
                system_content.push(msg.content.clone());
            } else {
                regular_messages.push(json!({
                    "role": msg.role,
                    "content": msg.content
                }));
            }
        }

        let mut payload = json!({
            "model": request.model,
            "messages": regular_messages,
            "max_tokens": request.max_tokens.unwrap_or(4096),
        });

        if !system_content.is_empty() {
            payload["system"] = json!(system_content.join("\n\n"));
        }
        if let Some(temperature) = request.temperature {
            payload["temperature"] = json!(temperature);
        }

        payload
    }

    fn parse_anthropic_response(
        response_data: &Value,
        model: String,
    ) -> LLMResult<ProviderResponse> {
        // Content is a list of blocks; join every text block.
        let blocks = response_data["content"].as_array().ok_or_else(|| {
            LLMError::Provider("Failed to extract content from Anthropic response".to_string())
        })?;
        let content = blocks
            .iter()
            .filter_map(|block| block["text"].as_str())
            .collect::<Vec<_>>()
            .join("");
        if content.is_empty() {
            return Err(LLMError::Provider(
                "Anthropic response contained no text blocks".to_string(),
            ));
        }

        let usage = response_data.get("usage").map_or_else(Usage::default, |u| {
            Usage::new(token_count(&u["input_tokens"]), token_count(&u["output_tokens"]))
        });

        Ok(ProviderResponse {
            content,
            model,
            usage,
            finish_reason: response_data["stop_reason"].as_str().map(str::to_string),
        })
    }
}

#[async_trait]
impl ApiClient for AnthropicClient {
    async fn send_request(&self, request: ProviderRequest) -> LLMResult<ProviderResponse> {
        let payload = Self::build_anthropic_payload(&request);
        let builder = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", &self.api_version)
            .header("content-type", "application/json")
            .json(&payload);
        let response_data = send_once(self.provider_name(), self.timeout, builder).await?;
        Self::parse_anthropic_response(&response_data, request.model)
    }

    fn provider_name(&self) -> &'static str {
        "anthropic"
    }
}
