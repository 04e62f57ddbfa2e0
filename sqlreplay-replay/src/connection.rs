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

//! Session-affine connections.
//!
//! Each worker owns one [`SessionPool`]: a private session-to-connection
//! map with no cross-worker sharing. Connections open lazily on first use
//! and every later statement of that session reuses the same connection,
//! reproducing the captured workload's session-scoped state (session
//! variables, temp objects).
//!
//! Slot lifecycle: `Unopened -> Open -> Closed`. All slots close at the
//! end-of-partition drain; nothing reopens afterwards within the same
//! worker lifetime. A failed open parks the slot in `Failed`, which every
//! later statement of that session observes as a connection error - the
//! partition itself is never aborted.

use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, warn};

/// Failure to open or use a session connection. Distinct from a statement
/// failure: the driver never got a chance to run the statement.
#[derive(Debug, Clone, Error)]
#[error("connection error for session {session_id}: {reason}")]
pub struct ConnectionError {
    pub session_id: u16,
    pub reason: String,
}

impl ConnectionError {
    pub fn new(session_id: u16, reason: impl Into<String>) -> Self {
        Self {
            session_id,
            reason: reason.into(),
        }
    }
}

/// Driver-reported statement failure. Expected during replay (deadlocks,
/// lock timeouts, constraint violations); recorded, never propagated.
#[derive(Debug, Clone)]
pub struct StatementFailure(pub String);

/// An open connection bound to one replayed session. Dropping it closes
/// the underlying connection.
pub trait SessionConnection: Send {
    /// Execute statement text as a non-query command.
    fn execute(&mut self, statement: &str) -> Result<(), StatementFailure>;
}

/// Opens connections against one target database.
pub trait ConnectionFactory: Send + Sync {
    fn connect(&self, session_id: u16) -> Result<Box<dyn SessionConnection>, ConnectionError>;

    /// Engine/variant tag stamped on every outcome.
    fn engine_tag(&self) -> &str;
}

impl<F: ConnectionFactory + ?Sized> ConnectionFactory for Box<F> {
    fn connect(&self, session_id: u16) -> Result<Box<dyn SessionConnection>, ConnectionError> {
        (**self).connect(session_id)
    }

    fn engine_tag(&self) -> &str {
        (**self).engine_tag()
    }
}

enum SessionSlot {
    Open(Box<dyn SessionConnection>),
    /// Open failed; the reason replays into every later outcome.
    Failed(String),
    Closed,
}

/// Worker-private session connection map. The pool is the sole owner and
/// closer of its connections.
pub struct SessionPool<F: ConnectionFactory> {
    factory: F,
    slots: HashMap<u16, SessionSlot>,
    drained: bool,
}

impl<F: ConnectionFactory> SessionPool<F> {
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            slots: HashMap::new(),
            drained: false,
        }
    }

    pub fn engine_tag(&self) -> &str {
        self.factory.engine_tag()
    }

    pub fn open_sessions(&self) -> usize {
        self.slots
            .values()
            .filter(|slot| matches!(slot, SessionSlot::Open(_)))
            .count()
    }

    /// Resolve the session's connection, opening it on first use.
    pub fn connection(
        &mut self,
        session_id: u16,
    ) -> Result<&mut dyn SessionConnection, ConnectionError> {
        if self.drained {
            return Err(ConnectionError::new(session_id, "session pool already drained"));
        }
        use std::collections::hash_map::Entry;
        let slot = match self.slots.entry(session_id) {
            Entry::Occupied(occupied) => occupied.into_mut(),
            Entry::Vacant(vacant) => {
                let slot = match self.factory.connect(session_id) {
                    Ok(conn) => {
                        debug!(session_id, "opened session connection");
                        SessionSlot::Open(conn)
                    }
                    Err(err) => {
                        warn!(session_id, error = %err, "session connection open failed");
                        SessionSlot::Failed(err.reason)
                    }
                };
                vacant.insert(slot)
            }
        };
        match slot {
            SessionSlot::Open(conn) => Ok(conn.as_mut()),
            SessionSlot::Failed(reason) => Err(ConnectionError::new(session_id, reason.clone())),
            SessionSlot::Closed => {
                Err(ConnectionError::new(session_id, "session connection closed"))
            }
        }
    }

    /// End-of-partition drain: close every open connection. No statement
    /// may be dispatched to this pool afterwards.
    pub fn close_all(&mut self) {
        let open = self.open_sessions();
        for slot in self.slots.values_mut() {
            *slot = SessionSlot::Closed;
        }
        self.drained = true;
        debug!(closed = open, "closed session connections");
    }
}
