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

use crate::providers::{AnthropicClient, ApiClient, OllamaClient};
use async_trait::async_trait;
use llm_contracts::{LLMError, LLMResult, Provider, ProviderRequest, TextCompletion};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Which provider to talk to and how. Deserialized from the `llm` section of
/// the service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub provider: Provider,
    pub model: String,
    pub endpoint: Option<String>,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
    pub timeout_seconds: u32,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            provider: Provider::Anthropic,
            model: DEFAULT_MODEL.to_string(),
            endpoint: None,
            api_key: None,
            max_tokens: 4096,
            temperature: None,
            timeout_seconds: 120,
        }
    }
}

/// A provider bound to one model: the `TextCompletion` every analysis stage
/// talks to.
#[derive(Clone)]
pub struct CompletionClient {
    api: Arc<dyn ApiClient>,
    model: String,
    max_tokens: u32,
    temperature: Option<f32>,
}

impl CompletionClient {
    pub fn new(api: Arc<dyn ApiClient>, model: impl Into<String>) -> Self {
        Self {
            api,
            model: model.into(),
            max_tokens: ProviderSettings::default().max_tokens,
            temperature: None,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn from_settings(settings: &ProviderSettings) -> LLMResult<Self> {
        if settings.model.trim().is_empty() {
            return Err(LLMError::Configuration("llm.model must not be empty".into()));
        }
        let api: Arc<dyn ApiClient> = match settings.provider {
            Provider::Anthropic => {
                let key = settings.api_key.clone().unwrap_or_default();
                Arc::new(AnthropicClient::new(
                    key,
                    settings.endpoint.clone(),
                    None,
                    Some(settings.timeout_seconds),
                )?)
            }
            Provider::Ollama => Arc::new(OllamaClient::new(
                settings.endpoint.clone(),
                Some(settings.timeout_seconds),
            )?),
        };
        info!(provider = %settings.provider, model = %settings.model, "completion client ready");

        Ok(Self::new(api, settings.model.clone())
            .with_max_tokens(settings.max_tokens)
            .with_temperature(settings.temperature))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn provider_name(&self) -> &'static str {
        self.api.provider_name()
    }
}

#[async_trait]
impl TextCompletion for CompletionClient {
    async fn complete(&self, prompt: &str) -> LLMResult<String> {
        let request = ProviderRequest::user_prompt(&self.model, prompt)
            .with_max_tokens(self.max_tokens)
            .with_temperature(self.temperature);
        let response = self.api.send_request(request).await?;
        debug!(
            provider = self.api.provider_name(),
            model = %response.model,
            prompt_tokens = response.usage.prompt_tokens,
            completion_tokens = response.usage.completion_tokens,
            "completion finished"
        );
        Ok(response.content)
    }
}
