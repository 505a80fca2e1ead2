//! Target resolution against the Astra control plane.
//!
//! A connection string names a database either by name or by id. The
//! resolver asks the control plane for databases with that name first and
//! only falls back to an id lookup when no database carries the name.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::error::{AstraError, AstraResult};
use crate::url::AstraUrl;

/// A database known to the control plane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseRef {
    /// Opaque database id.
    pub id: String,
    /// Human readable database name, not unique.
    pub name: String,
    /// Regions hosting a datacenter of this database.
    pub regions: Vec<String>,
}

impl DatabaseRef {
    /// Create a database reference.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            regions: Vec::new(),
        }
    }

    /// Add a region.
    #[must_use]
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.regions.push(region.into());
        self
    }

    /// Whether the database has a datacenter in `region`.
    #[must_use]
    pub fn has_region(&self, region: &str) -> bool {
        self.regions.iter().any(|r| r == region)
    }
}

/// Secure connect bundle: endpoints and certificates for one datacenter.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionBundle {
    /// Database the bundle belongs to.
    pub database_id: String,
    /// Region of the datacenter, `None` for the default datacenter.
    pub region: Option<String>,
    /// Raw bundle content.
    pub bytes: Vec<u8>,
}

impl fmt::Debug for ConnectionBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionBundle")
            .field("database_id", &self.database_id)
            .field("region", &self.region)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Everything needed to open a session for one URL.
#[derive(Debug, Clone)]
pub struct ResolvedTarget {
    /// The concrete database.
    pub database: DatabaseRef,
    /// Its connect bundle.
    pub bundle: ConnectionBundle,
}

/// Client of the service that knows which databases exist.
///
/// Every call carries the caller's token; the control plane only lists
/// databases visible to it.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// All non-terminated databases whose name equals `name`.
    async fn find_by_name(&self, token: &str, name: &str) -> AstraResult<Vec<DatabaseRef>>;

    /// The database with id `id`, `None` when there is no such database.
    async fn get_by_id(&self, token: &str, id: &str) -> AstraResult<Option<DatabaseRef>>;

    /// Download the connect bundle of `database`, for `region` when given.
    async fn download_bundle(
        &self,
        token: &str,
        database: &DatabaseRef,
        region: Option<&str>,
    ) -> AstraResult<ConnectionBundle>;
}

/// Resolves connection strings to concrete databases and bundles.
#[derive(Clone)]
pub struct TargetResolver {
    control_plane: Arc<dyn ControlPlane>,
}

impl TargetResolver {
    /// Create a resolver backed by `control_plane`.
    pub fn new(control_plane: Arc<dyn ControlPlane>) -> Self {
        Self { control_plane }
    }

    /// Identify the database behind `url` and download its bundle.
    pub async fn resolve(&self, url: &AstraUrl) -> AstraResult<ResolvedTarget> {
        let token = url.token().ok_or_else(|| {
            AstraError::Authentication("a token is required to query the control plane".into())
        })?;

        let database = self.find_database(token, url.database()).await?;

        if let Some(region) = url.region() {
            if !database.regions.is_empty() && !database.has_region(region) {
                return Err(AstraError::not_found(format!(
                    "database '{}' has no datacenter in region '{region}'",
                    database.name
                )));
            }
        }

        let bundle = self
            .control_plane
            .download_bundle(token, &database, url.region())
            .await
            .map_err(|e| match e {
                AstraError::BundleDownload(_) => e,
                other => AstraError::bundle(other.to_string()),
            })?;
        debug!(
            database_id = %database.id,
            region = ?bundle.region,
            bundle_len = bundle.bytes.len(),
            "Connect bundle downloaded"
        );

        Ok(ResolvedTarget { database, bundle })
    }

    async fn find_database(&self, token: &str, identifier: &str) -> AstraResult<DatabaseRef> {
        let mut by_name = self.control_plane.find_by_name(token, identifier).await?;
        match by_name.len() {
            1 => {
                debug!(database = identifier, "Found database by name");
                Ok(by_name.remove(0))
            }
            0 => {
                debug!(database = identifier, "No database with this name, trying id");
                self.control_plane
                    .get_by_id(token, identifier)
                    .await?
                    .ok_or_else(|| {
                        AstraError::not_found(format!("no database named or with id '{identifier}'"))
                    })
            }
            count => Err(AstraError::AmbiguousTarget {
                name: identifier.to_string(),
                count,
            }),
        }
    }
}

impl fmt::Debug for TargetResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetResolver").finish_non_exhaustive()
    }
}

/// An in-memory control plane with a fixed set of databases.
///
/// Bundles are registered per database id and region; a database without a
/// registered bundle fails the download.
#[derive(Debug, Clone, Default)]
pub struct StaticControlPlane {
    databases: Arc<RwLock<Vec<DatabaseRef>>>,
    bundles: Arc<RwLock<HashMap<(String, Option<String>), Vec<u8>>>>,
}

impl StaticControlPlane {
    /// Create an empty control plane.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a database.
    pub fn register(&self, database: DatabaseRef) -> &Self {
        self.databases.write().push(database);
        self
    }

    /// Register the bundle served for `database_id` in `region`.
    pub fn register_bundle(
        &self,
        database_id: impl Into<String>,
        region: Option<&str>,
        bytes: impl Into<Vec<u8>>,
    ) -> &Self {
        self.bundles.write().insert(
            (database_id.into(), region.map(str::to_string)),
            bytes.into(),
        );
        self
    }

    /// Number of registered databases.
    pub fn len(&self) -> usize {
        self.databases.read().len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ControlPlane for StaticControlPlane {
    async fn find_by_name(&self, _token: &str, name: &str) -> AstraResult<Vec<DatabaseRef>> {
        Ok(self
            .databases
            .read()
            .iter()
            .filter(|db| db.name == name)
            .cloned()
            .collect())
    }

    async fn get_by_id(&self, _token: &str, id: &str) -> AstraResult<Option<DatabaseRef>> {
        Ok(self.databases.read().iter().find(|db| db.id == id).cloned())
    }

    async fn download_bundle(
        &self,
        _token: &str,
        database: &DatabaseRef,
        region: Option<&str>,
    ) -> AstraResult<ConnectionBundle> {
        let key = (database.id.clone(), region.map(str::to_string));
        self.bundles
            .read()
            .get(&key)
            .cloned()
            .map(|bytes| ConnectionBundle {
                database_id: database.id.clone(),
                region: region.map(str::to_string),
                bytes,
            })
            .ok_or_else(|| {
                AstraError::bundle(format!("no bundle for database '{}'", database.id))
            })
    }
}
