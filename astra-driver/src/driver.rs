//! The Astra driver: parse, resolve, reuse or build a session, wrap it.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

use crate::cache::SessionCache;
use crate::config::{ConsistencyLevel, Properties, URL_PREFIX, UrlKey};
use crate::connection::AstraConnection;
use crate::error::{AstraError, AstraResult};
use crate::resolver::{ControlPlane, TargetResolver};
use crate::session::{SessionConnector, SessionRequest, SharedSession};
use crate::url::AstraUrl;
use crate::wrapper::Wrapper;

/// Description of one connection property, as reported by
/// [`Driver::property_info`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverPropertyInfo {
    /// Property key.
    pub name: String,
    /// Current value, if any.
    pub value: Option<String>,
    /// What the property does.
    pub description: String,
    /// Whether a connection needs this property.
    pub required: bool,
    /// Allowed values, empty when free-form.
    pub choices: Vec<String>,
}

/// A driver that can be registered in a [`DriverRegistry`](crate::DriverRegistry).
#[async_trait]
pub trait Driver: Send + Sync {
    /// Whether this driver handles `url`.
    fn accepts_url(&self, url: &str) -> bool;

    /// Open a connection.
    async fn connect(&self, url: &str, properties: &Properties) -> AstraResult<AstraConnection>;

    /// Describe the properties understood for `url`.
    fn property_info(&self, url: &str, properties: &Properties)
    -> AstraResult<Vec<DriverPropertyInfo>>;

    /// Major version of the driver.
    fn major_version(&self) -> u32;

    /// Minor version of the driver.
    fn minor_version(&self) -> u32;

    /// Whether the driver passes the host API's compliance suite.
    fn is_spec_compliant(&self) -> bool {
        false
    }

    /// The parent structured logger of the driver.
    fn parent_logger(&self) -> AstraResult<tracing::Dispatch>;
}

/// Connects to Astra databases, reusing one session per distinct URL.
pub struct AstraDriver {
    resolver: TargetResolver,
    connector: Arc<dyn SessionConnector>,
    cache: Arc<SessionCache>,
}

impl AstraDriver {
    /// Create a driver from its collaborators.
    pub fn new(control_plane: Arc<dyn ControlPlane>, connector: Arc<dyn SessionConnector>) -> Self {
        Self::with_cache(control_plane, connector, Arc::new(SessionCache::new()))
    }

    /// Create a driver that stores sessions in `cache`.
    pub fn with_cache(
        control_plane: Arc<dyn ControlPlane>,
        connector: Arc<dyn SessionConnector>,
        cache: Arc<SessionCache>,
    ) -> Self {
        Self {
            resolver: TargetResolver::new(control_plane),
            connector,
            cache,
        }
    }

    /// The session cache.
    #[must_use]
    pub fn cache(&self) -> &SessionCache {
        &self.cache
    }

    /// Whether `url` uses the Astra scheme.
    #[must_use]
    pub fn accepts_url(&self, url: &str) -> bool {
        url.starts_with(URL_PREFIX)
    }

    /// Parse `url` with `properties` as overrides and open a connection.
    pub async fn connect(&self, url: &str, properties: &Properties) -> AstraResult<AstraConnection> {
        let url = AstraUrl::parse_with(url, properties)?;
        self.connect_url(&url).await
    }

    /// Open a connection for an already parsed URL.
    pub async fn connect_url(&self, url: &AstraUrl) -> AstraResult<AstraConnection> {
        let session = self.session(url).await?;
        debug!(database = url.database(), keyspace = url.keyspace(), "Connection opened");
        Ok(AstraConnection::for_url(session, url))
    }

    async fn session(&self, url: &AstraUrl) -> AstraResult<SharedSession> {
        let resolver = self.resolver.clone();
        let connector = Arc::clone(&self.connector);
        let target_url = url.clone();

        self.cache
            .get_or_create(url, move || async move {
                let target = resolver.resolve(&target_url).await?;
                let request = SessionRequest::new(&target_url, target.bundle)?;
                let session = connector.open_session(request).await?;
                info!(
                    database_id = %target.database.id,
                    database = %target.database.name,
                    keyspace = target_url.keyspace(),
                    "Session established"
                );
                Ok(session)
            })
            .await
    }

    /// Describe every recognized property with its value for `url`.
    pub fn property_info(
        &self,
        url: &str,
        properties: &Properties,
    ) -> AstraResult<Vec<DriverPropertyInfo>> {
        let url = AstraUrl::parse_with(url, properties)?;
        Ok(UrlKey::ALL
            .into_iter()
            .map(|key| DriverPropertyInfo {
                name: key.as_str().to_string(),
                value: url.value_of(key),
                description: key.description().to_string(),
                required: key == UrlKey::Token,
                choices: match key {
                    UrlKey::ConsistencyLevel => ConsistencyLevel::ALL
                        .iter()
                        .map(ToString::to_string)
                        .collect(),
                    UrlKey::Debug => vec!["true".into(), "false".into()],
                    _ => Vec::new(),
                },
            })
            .collect())
    }

    /// Major version, from the crate version.
    #[must_use]
    pub fn major_version(&self) -> u32 {
        env!("CARGO_PKG_VERSION_MAJOR").parse().unwrap_or(0)
    }

    /// Minor version, from the crate version.
    #[must_use]
    pub fn minor_version(&self) -> u32 {
        env!("CARGO_PKG_VERSION_MINOR").parse().unwrap_or(0)
    }

    /// Not supported; the driver logs through `tracing` directly.
    pub fn parent_logger(&self) -> AstraResult<tracing::Dispatch> {
        Err(AstraError::unsupported("Driver::parent_logger()"))
    }
}

#[async_trait]
impl Driver for AstraDriver {
    fn accepts_url(&self, url: &str) -> bool {
        AstraDriver::accepts_url(self, url)
    }

    async fn connect(&self, url: &str, properties: &Properties) -> AstraResult<AstraConnection> {
        AstraDriver::connect(self, url, properties).await
    }

    fn property_info(
        &self,
        url: &str,
        properties: &Properties,
    ) -> AstraResult<Vec<DriverPropertyInfo>> {
        AstraDriver::property_info(self, url, properties)
    }

    fn major_version(&self) -> u32 {
        AstraDriver::major_version(self)
    }

    fn minor_version(&self) -> u32 {
        AstraDriver::minor_version(self)
    }

    fn parent_logger(&self) -> AstraResult<tracing::Dispatch> {
        AstraDriver::parent_logger(self)
    }
}

impl Wrapper for AstraDriver {}

impl std::fmt::Debug for AstraDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AstraDriver")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}
