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

//! Target execution engines.
//!
//! `SqliteFactory` replays against a local SQLite database with real
//! driver errors; `NullFactory` accepts every statement (dry runs and
//! pipeline tests). Server engines plug in behind the same
//! [`ConnectionFactory`] seam.

use crate::connection::{
    ConnectionError, ConnectionFactory, SessionConnection, StatementFailure,
};
use std::path::{Path, PathBuf};

pub struct SqliteFactory {
    database: PathBuf,
    engine_tag: String,
}

impl SqliteFactory {
    pub fn new(database: impl AsRef<Path>) -> Self {
        Self {
            database: database.as_ref().to_path_buf(),
            engine_tag: "sqlite".to_string(),
        }
    }
}

struct SqliteSession {
    conn: rusqlite::Connection,
}

impl SessionConnection for SqliteSession {
    fn execute(&mut self, statement: &str) -> Result<(), StatementFailure> {
        self.conn
            .execute_batch(statement)
            .map_err(|err| StatementFailure(err.to_string()))
    }
}

impl ConnectionFactory for SqliteFactory {
    fn connect(&self, session_id: u16) -> Result<Box<dyn SessionConnection>, ConnectionError> {
        let conn = rusqlite::Connection::open(&self.database)
            .map_err(|err| ConnectionError::new(session_id, err.to_string()))?;
        Ok(Box::new(SqliteSession { conn }))
    }

    fn engine_tag(&self) -> &str {
        &self.engine_tag
    }
}

/// Accepts every statement without touching a database.
pub struct NullFactory {
    engine_tag: String,
}

impl Default for NullFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl NullFactory {
    pub fn new() -> Self {
        Self {
            engine_tag: "null".to_string(),
        }
    }
}

struct NullSession;

impl SessionConnection for NullSession {
    fn execute(&mut self, _statement: &str) -> Result<(), StatementFailure> {
        Ok(())
    }
}

impl ConnectionFactory for NullFactory {
    fn connect(&self, _session_id: u16) -> Result<Box<dyn SessionConnection>, ConnectionError> {
        Ok(Box::new(NullSession))
    }

    fn engine_tag(&self) -> &str {
        &self.engine_tag
    }
}
