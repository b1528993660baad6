// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Store configuration.
//!
//! Sources in priority order (lowest to highest):
//! 1. Code defaults
//! 2. TOML file named by `DYN_VERSION_CACHE_CONFIG_PATH`
//! 3. Environment variables prefixed with `DYN_VERSION_CACHE_`

use std::time::Duration;

use figment::{
    Figment, Provider,
    providers::{Env, Format, Json, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::{Validate, ValidationErrors};

/// Environment variable naming an optional TOML configuration file.
pub const CONFIG_PATH_ENV: &str = "DYN_VERSION_CACHE_CONFIG_PATH";

/// Prefix for environment overrides, e.g. `DYN_VERSION_CACHE_SETTER_TIMEOUT_MS`.
pub const ENV_PREFIX: &str = "DYN_VERSION_CACHE_";

const MAX_INITIAL_CAPACITY: usize = 1 << 24;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to extract configuration: {0}")]
    Extraction(#[from] Box<figment::Error>),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] ValidationErrors),
}

/// Tuning for a [`Store`](crate::Store).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct StoreConfig {
    /// Capacity reserved for each fresh generation's key mapping.
    #[validate(range(max = MAX_INITIAL_CAPACITY))]
    pub initial_capacity: usize,

    /// Upper bound on how long a deferred setter may hold its slot.
    /// None = reservations only end on delivery, cancellation, or drop.
    #[validate(range(min = 1))]
    pub setter_timeout_ms: Option<u64>,
}

impl StoreConfig {
    /// Deadline applied to every reservation, if any.
    pub fn setter_timeout(&self) -> Option<Duration> {
        self.setter_timeout_ms.map(Duration::from_millis)
    }

    /// Figment with defaults, the optional TOML file, and env overrides merged.
    pub fn figment() -> Figment {
        let config_path = std::env::var(CONFIG_PATH_ENV).unwrap_or_default();

        Figment::new()
            .merge(Serialized::defaults(StoreConfig::default()))
            .merge(Toml::file(&config_path))
            .merge(Env::prefixed(ENV_PREFIX))
    }

    /// Load configuration from the default figment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::extract_from(Self::figment())
    }

    /// Load configuration with a JSON document layered over env and files.
    pub fn from_figment_with_json(json: &str) -> Result<Self, ConfigError> {
        Self::extract_from(Self::figment().merge(Json::string(json)))
    }

    /// Extract and validate configuration from any provider.
    pub fn extract_from<T: Provider>(provider: T) -> Result<Self, ConfigError> {
        let config: Self = Figment::from(provider)
            .extract()
            .map_err(|e| ConfigError::Extraction(Box::new(e)))?;
        config.validate()?;
        Ok(config)
    }
}
