//! Connection handles returned to callers.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, trace};

use crate::config::ConsistencyLevel;
use crate::error::{AstraError, AstraResult};
use crate::session::SharedSession;
use crate::url::AstraUrl;

/// A connection to one keyspace of an Astra database.
///
/// Many connections can share one cached session. Closing a connection only
/// closes the handle; the session stays in the cache for the next caller.
pub struct AstraConnection {
    session: SharedSession,
    keyspace: String,
    consistency: ConsistencyLevel,
    debug: bool,
    closed: AtomicBool,
}

impl AstraConnection {
    /// Wrap a session.
    pub fn new(
        session: SharedSession,
        keyspace: impl Into<String>,
        consistency: ConsistencyLevel,
        debug: bool,
    ) -> Self {
        Self {
            session,
            keyspace: keyspace.into(),
            consistency,
            debug,
            closed: AtomicBool::new(false),
        }
    }

    /// Wrap a session with the settings carried by `url`.
    pub(crate) fn for_url(session: SharedSession, url: &AstraUrl) -> Self {
        Self::new(session, url.keyspace(), url.consistency_level(), url.is_debug())
    }

    /// Get a reference to the underlying session.
    #[must_use]
    pub fn session(&self) -> &SharedSession {
        &self.session
    }

    /// Keyspace statements run against.
    #[must_use]
    pub fn keyspace(&self) -> &str {
        &self.keyspace
    }

    /// Consistency level applied to every statement.
    #[must_use]
    pub fn consistency(&self) -> ConsistencyLevel {
        self.consistency
    }

    /// Whether statements are logged.
    #[must_use]
    pub fn is_debug(&self) -> bool {
        self.debug
    }

    /// Execute a CQL statement with the connection's consistency level.
    pub async fn execute(&self, cql: &str) -> AstraResult<()> {
        if self.is_closed() {
            return Err(AstraError::ConnectionClosed);
        }
        if self.debug {
            info!(keyspace = %self.keyspace, consistency = %self.consistency, cql, "Executing statement");
        } else {
            trace!(keyspace = %self.keyspace, cql, "Executing statement");
        }
        self.session.execute(cql, self.consistency).await
    }

    /// Close this handle. The shared session is left open.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!(keyspace = %self.keyspace, "Connection closed");
        }
    }

    /// Whether [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for AstraConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AstraConnection")
            .field("keyspace", &self.keyspace)
            .field("consistency", &self.consistency)
            .field("debug", &self.debug)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// A connection handed to an external pool.
///
/// Pooling itself is left to the pool; this type only delegates.
#[derive(Debug)]
pub struct PooledAstraConnection {
    connection: Arc<AstraConnection>,
}

impl PooledAstraConnection {
    /// Wrap a connection.
    pub fn new(connection: AstraConnection) -> Self {
        Self {
            connection: Arc::new(connection),
        }
    }

    /// The wrapped connection.
    #[must_use]
    pub fn connection(&self) -> Arc<AstraConnection> {
        Arc::clone(&self.connection)
    }

    /// Close the wrapped connection.
    pub fn close(&self) {
        self.connection.close();
    }

    /// Whether the wrapped connection is closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.connection.is_closed()
    }
}
