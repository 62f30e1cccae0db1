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

//! Service configuration.
//!
//! Sources, later ones winning:
//! 1. Built-in defaults
//! 2. `config/insights.toml` (optional)
//! 3. Environment variables (`INSIGHTS__*`, `__` between levels, e.g.
//!    `INSIGHTS__SERVER__WORKER_LIMIT=8`)
//!
//! `ANTHROPIC_API_KEY` fills `llm.api_key` when nothing else set it.

use analyst::DEFAULT_SESSION_CAPACITY;
use llm_contracts::Provider;
use llm_providers::ProviderSettings;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_CONFIG_FILE: &str = "config/insights.toml";
pub const ENV_PREFIX: &str = "INSIGHTS";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: String,
    pub cors_origin: String,
    pub worker_limit: usize,
    pub body_limit_bytes: usize,
    /// Analysis checkpoints kept in memory before older ones are evicted.
    pub session_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8000".to_string(),
            cors_origin: "http://localhost:3000".to_string(),
            worker_limit: 4,
            body_limit_bytes: 64 * 1024,
            session_capacity: DEFAULT_SESSION_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WarehouseConfig {
    pub url: String,
    pub max_connections: u32,
    /// Create missing tables on startup.
    pub apply_schema: bool,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://storefront.db".to_string(),
            max_connections: 5,
            apply_schema: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub llm: ProviderSettings,
    pub warehouse: WarehouseConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Path::new(DEFAULT_CONFIG_FILE))
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut cfg: AppConfig = settings.try_deserialize()?;
        if cfg.llm.api_key.is_none() && cfg.llm.provider == Provider::Anthropic {
            cfg.llm.api_key = std::env::var("ANTHROPIC_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty());
        }
        cfg.validate()?;
        debug!(path = %path.display(), "configuration loaded");
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.socket_addr()?;
        if self.server.worker_limit == 0 {
            return Err(ConfigError::Invalid(
                "server.worker_limit must be at least 1".into(),
            ));
        }
        if self.server.body_limit_bytes == 0 {
            return Err(ConfigError::Invalid(
                "server.body_limit_bytes must be greater than zero".into(),
            ));
        }
        if self.server.session_capacity == 0 {
            return Err(ConfigError::Invalid(
                "server.session_capacity must be at least 1".into(),
            ));
        }
        if self.server.cors_origin.trim().is_empty() {
            return Err(ConfigError::Invalid("server.cors_origin must be set".into()));
        }
        if self.llm.model.trim().is_empty() {
            return Err(ConfigError::Invalid("llm.model must be set".into()));
        }
        if self.llm.timeout_seconds == 0 {
            return Err(ConfigError::Invalid(
                "llm.timeout_seconds must be greater than zero".into(),
            ));
        }
        if self.warehouse.url.trim().is_empty() {
            return Err(ConfigError::Invalid("warehouse.url must be set".into()));
        }
        if self.warehouse.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "warehouse.max_connections must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.server.addr.parse().map_err(|e| {
            ConfigError::Invalid(format!("server.addr '{}': {e}", self.server.addr))
        })
    }
}
