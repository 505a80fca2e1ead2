//! Cloud sessions backed by the `scylla` driver.

use async_trait::async_trait;
use scylla::execution_profile::ExecutionProfile;
use scylla::query::Query;
use scylla::{CloudSessionBuilder, Session};
use std::io::Write;
use std::sync::Arc;
use tracing::debug;

use crate::config::ConsistencyLevel;
use crate::error::{AstraError, AstraResult};
use crate::session::{CqlSession, SessionConnector, SessionRequest, SharedSession};

/// Zip archives start with a local file header.
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// Reject bundles `CloudSessionBuilder` cannot read.
fn ensure_cloud_config(bytes: &[u8]) -> AstraResult<()> {
    if bytes.is_empty() {
        return Err(AstraError::bundle("connect bundle is empty"));
    }
    if bytes.starts_with(ZIP_MAGIC) {
        return Err(AstraError::bundle(
            "connect bundle is a zip archive; ScyllaConnector needs a cloud-config YAML bundle",
        ));
    }
    Ok(())
}

/// Opens `scylla` sessions from cloud-config bundles.
///
/// The bundle must be a scylla cloud-config YAML document. The zip secure
/// connect bundles served by the DevOps API are rejected with
/// [`AstraError::BundleDownload`]; pair this connector with a control plane
/// that returns cloud-config bundles.
///
/// The bundle is written to a temporary file for the duration of the
/// handshake; the file is removed once the session is established.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScyllaConnector;

impl ScyllaConnector {
    /// Create a connector.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SessionConnector for ScyllaConnector {
    async fn open_session(&self, request: SessionRequest) -> AstraResult<SharedSession> {
        ensure_cloud_config(&request.bundle.bytes)?;

        let mut bundle_file = tempfile::NamedTempFile::new()
            .map_err(|e| AstraError::bundle(format!("Failed to create bundle file: {e}")))?;
        bundle_file
            .write_all(&request.bundle.bytes)
            .and_then(|()| bundle_file.flush())
            .map_err(|e| AstraError::bundle(format!("Failed to write bundle file: {e}")))?;

        let profile = ExecutionProfile::builder()
            .consistency(request.consistency.into())
            .request_timeout(Some(request.request_timeout))
            .build();

        let session = CloudSessionBuilder::new(bundle_file.path())
            .map_err(|e| AstraError::bundle(format!("Invalid connect bundle: {e}")))?
            .user(request.auth.username(), request.auth.secret())
            .use_keyspace(&request.keyspace, true)
            .default_execution_profile_handle(profile.into_handle())
            .build()
            .await?;

        debug!(
            database_id = %request.bundle.database_id,
            keyspace = %request.keyspace,
            "scylla session connected"
        );
        Ok(Arc::new(ScyllaSession {
            session,
            keyspace: request.keyspace,
        }))
    }
}

/// A live `scylla` session.
pub struct ScyllaSession {
    session: Session,
    keyspace: String,
}

impl ScyllaSession {
    /// Get a reference to the underlying session.
    pub fn inner(&self) -> &Session {
        &self.session
    }
}

#[async_trait]
impl CqlSession for ScyllaSession {
    fn keyspace(&self) -> &str {
        &self.keyspace
    }

    async fn execute(&self, cql: &str, consistency: ConsistencyLevel) -> AstraResult<()> {
        let mut query = Query::new(cql);
        query.set_consistency(consistency.into());
        self.session.query_unpaged(query, &[]).await?;
        Ok(())
    }

    async fn close(&self) {
        // Connections are released when the last handle drops the session.
        debug!(keyspace = %self.keyspace, "scylla session released");
    }
}

impl std::fmt::Debug for ScyllaSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScyllaSession")
            .field("keyspace", &self.keyspace)
            .finish_non_exhaustive()
    }
}
