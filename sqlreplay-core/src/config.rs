// Copyright 2025 Sqlreplay Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Job configuration.
//!
//! Replay jobs receive target connection parameters from the environment
//! (the deployment sets DATABASE_* variables per target engine), with CLI
//! flags layered on top.

use crate::partition::DEFAULT_SHARD_COUNT;
use serde::{Deserialize, Serialize};
use std::env;

/// Target database connection descriptor for one replay job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    pub host: String,
    pub port: u16,
    pub database: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Engine/variant tag, recorded on every outcome so runs against
    /// different targets can be compared side by side.
    pub engine: String,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1433,
            database: None,
            username: None,
            password: None,
            engine: "sqlserver".to_string(),
        }
    }
}

impl TargetConfig {
    /// Read connection parameters from DATABASE_HOST, DATABASE_PORT,
    /// DATABASE_NAME, DATABASE_USERNAME, DATABASE_PASSWORD and
    /// DATABASE_ENGINE, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: env::var("DATABASE_HOST").unwrap_or(defaults.host),
            port: env::var("DATABASE_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            database: env::var("DATABASE_NAME").ok(),
            username: env::var("DATABASE_USERNAME").ok(),
            password: env::var("DATABASE_PASSWORD").ok(),
            engine: env::var("DATABASE_ENGINE").unwrap_or(defaults.engine),
        }
    }
}

/// Dispatch-side deployment parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Number of queue partitions. Fixes the maximum replay parallelism.
    pub shard_count: u32,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            shard_count: DEFAULT_SHARD_COUNT,
        }
    }
}
