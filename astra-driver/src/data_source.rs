//! Data source: connection factory configured with fixed credentials.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{ConsistencyLevel, Properties};
use crate::connection::{AstraConnection, PooledAstraConnection};
use crate::error::{AstraError, AstraResult};
use crate::registry::{DriverRegistry, LogWriter};
use crate::url::AstraUrlBuilder;
use crate::wrapper::Wrapper;

/// Opens connections to one database and keyspace.
///
/// Every call renders a connection string from the configured fields and
/// dispatches it through the [`DriverRegistry`], so connections opened here
/// share sessions with connections opened from the same URL elsewhere.
///
/// # Example
///
/// ```rust,ignore
/// let source = AstraDataSource::new(registry, "client-id", "secret", "orders", "sales");
/// let conn = source.connection().await?;
/// conn.execute("SELECT * FROM orders").await?;
/// ```
#[derive(Clone)]
pub struct AstraDataSource {
    registry: Arc<DriverRegistry>,
    user: String,
    password: String,
    database: String,
    keyspace: String,
    region: Option<String>,
    consistency_level: Option<ConsistencyLevel>,
    request_timeout_ms: Option<u64>,
}

impl AstraDataSource {
    /// Create a data source with required fields only.
    pub fn new(
        registry: Arc<DriverRegistry>,
        user: impl Into<String>,
        password: impl Into<String>,
        database: impl Into<String>,
        keyspace: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            user: user.into(),
            password: password.into(),
            database: database.into(),
            keyspace: keyspace.into(),
            region: None,
            consistency_level: None,
            request_timeout_ms: None,
        }
    }

    /// Create a data source with every optional field.
    #[allow(clippy::too_many_arguments)]
    pub fn with_options(
        registry: Arc<DriverRegistry>,
        user: impl Into<String>,
        password: impl Into<String>,
        database: impl Into<String>,
        keyspace: impl Into<String>,
        region: Option<String>,
        consistency_level: Option<ConsistencyLevel>,
        request_timeout_ms: Option<u64>,
    ) -> Self {
        Self {
            region,
            consistency_level,
            request_timeout_ms,
            ..Self::new(registry, user, password, database, keyspace)
        }
    }

    /// Configured user.
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Configured password.
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Configured database name or id.
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Configured keyspace.
    pub fn keyspace(&self) -> &str {
        &self.keyspace
    }

    /// Configured region.
    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    /// Configured consistency level.
    pub fn consistency_level(&self) -> Option<ConsistencyLevel> {
        self.consistency_level
    }

    /// Configured request timeout in milliseconds.
    pub fn request_timeout_ms(&self) -> Option<u64> {
        self.request_timeout_ms
    }

    /// Connection string for the given credentials.
    pub fn url_for(&self, user: &str, password: &str) -> String {
        let mut builder = AstraUrlBuilder::new(&self.database, &self.keyspace)
            .user(user)
            .password(password);
        if let Some(millis) = self.request_timeout_ms {
            builder = builder.request_timeout_ms(millis);
        }
        if let Some(region) = &self.region {
            builder = builder.region(region);
        }
        if let Some(level) = self.consistency_level {
            builder = builder.consistency_level(level);
        }
        builder.to_url()
    }

    /// Open a connection with the configured credentials.
    pub async fn connection(&self) -> AstraResult<AstraConnection> {
        self.connect(None, None).await
    }

    /// Open a connection, replacing the configured credentials.
    pub async fn connection_with(&self, user: &str, password: &str) -> AstraResult<AstraConnection> {
        self.connect(Some(user), Some(password)).await
    }

    /// Open a connection for an external pool.
    pub async fn pooled_connection(&self) -> AstraResult<PooledAstraConnection> {
        self.connection().await.map(PooledAstraConnection::new)
    }

    /// Open a connection for an external pool, replacing the credentials.
    pub async fn pooled_connection_with(
        &self,
        user: &str,
        password: &str,
    ) -> AstraResult<PooledAstraConnection> {
        self.connection_with(user, password)
            .await
            .map(PooledAstraConnection::new)
    }

    async fn connect(&self, user: Option<&str>, password: Option<&str>) -> AstraResult<AstraConnection> {
        let url = self.url_for(
            user.unwrap_or(&self.user),
            password.unwrap_or(&self.password),
        );
        self.registry.connect(&url, &Properties::new()).await
    }

    /// Login timeout of the registry.
    pub fn login_timeout(&self) -> Duration {
        self.registry.login_timeout()
    }

    /// Set the login timeout of the registry.
    pub fn set_login_timeout(&self, timeout: Duration) {
        self.registry.set_login_timeout(timeout);
    }

    /// Log writer of the registry.
    pub fn log_writer(&self) -> Option<LogWriter> {
        self.registry.log_writer()
    }

    /// Set the log writer of the registry.
    pub fn set_log_writer(&self, writer: Option<LogWriter>) {
        self.registry.set_log_writer(writer);
    }

    /// Not supported.
    pub fn parent_logger(&self) -> AstraResult<tracing::Dispatch> {
        Err(AstraError::unsupported("DataSource::parent_logger()"))
    }
}

impl Wrapper for AstraDataSource {}

impl fmt::Debug for AstraDataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AstraDataSource")
            .field("user", &self.user)
            .field("password", &"***")
            .field("database", &self.database)
            .field("keyspace", &self.keyspace)
            .field("region", &self.region)
            .field("consistency_level", &self.consistency_level)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{Driver, DriverPropertyInfo};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;

    /// Records the URLs it is asked to connect to.
    #[derive(Default)]
    struct RecordingDriver {
        urls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Driver for RecordingDriver {
        fn accepts_url(&self, url: &str) -> bool {
            url.starts_with("astra://")
        }

        async fn connect(&self, url: &str, _properties: &Properties) -> AstraResult<AstraConnection> {
            self.urls.lock().push(url.to_string());
            Err(AstraError::connection("recorded"))
        }

        fn property_info(
            &self,
            _url: &str,
            _properties: &Properties,
        ) -> AstraResult<Vec<DriverPropertyInfo>> {
            Ok(Vec::new())
        }

        fn major_version(&self) -> u32 {
            0
        }

        fn minor_version(&self) -> u32 {
            1
        }

        fn parent_logger(&self) -> AstraResult<tracing::Dispatch> {
            Err(AstraError::unsupported("parent_logger"))
        }
    }

    fn source_with(driver: Arc<RecordingDriver>) -> AstraDataSource {
        let registry = Arc::new(DriverRegistry::new());
        registry.register(driver);
        AstraDataSource::new(registry, "client", "secret", "orders", "sales")
    }

    #[test]
    fn test_url_required_fields_only() {
        let source = source_with(Arc::new(RecordingDriver::default()));
        assert_eq!(
            source.url_for("client", "secret"),
            "astra://orders/sales?user=client&password=secret"
        );
    }

    #[test]
    fn test_url_with_options() {
        let source = AstraDataSource::with_options(
            Arc::new(DriverRegistry::new()),
            "client",
            "secret",
            "orders",
            "sales",
            Some("eu-west-1".into()),
            Some(ConsistencyLevel::One),
            Some(5000),
        );
        assert_eq!(
            source.url_for("client", "secret"),
            "astra://orders/sales?user=client&password=secret&request-timeout=5000&region=eu-west-1&consistency-level=ONE"
        );
    }

    #[tokio::test]
    async fn test_connection_dispatches_through_registry() {
        let driver = Arc::new(RecordingDriver::default());
        let source = source_with(driver.clone());

        assert!(source.connection().await.is_err());
        assert!(source.connection_with("other", "pw").await.is_err());
        assert!(source.pooled_connection().await.is_err());

        let urls = driver.urls.lock();
        assert_eq!(urls.len(), 3);
        assert_eq!(urls[0], "astra://orders/sales?user=client&password=secret");
        assert_eq!(urls[1], "astra://orders/sales?user=other&password=pw");
    }

    #[test]
    fn test_login_timeout_delegates_to_registry() {
        let registry = Arc::new(DriverRegistry::new());
        let source = AstraDataSource::new(Arc::clone(&registry), "u", "p", "db", "ks");
        source.set_login_timeout(Duration::from_secs(12));
        assert_eq!(registry.login_timeout(), Duration::from_secs(12));
        assert_eq!(source.login_timeout(), Duration::from_secs(12));
    }

    #[test]
    fn test_wrapper_and_parent_logger() {
        let source = source_with(Arc::new(RecordingDriver::default()));
        assert!(source.is_wrapper_for::<AstraDataSource>());
        assert_eq!(source.unwrap_as::<AstraDataSource>().unwrap().keyspace(), "sales");
        assert!(matches!(
            source.unwrap_as::<DriverRegistry>(),
            Err(AstraError::NotAWrapper(name)) if name == "DriverRegistry"
        ));
        assert!(matches!(
            source.parent_logger(),
            Err(AstraError::Unsupported(_))
        ));
    }

    #[test]
    fn test_debug_redacts_password() {
        let source = source_with(Arc::new(RecordingDriver::default()));
        let rendered = format!("{source:?}");
        assert!(rendered.contains("client"));
        assert!(!rendered.contains("secret"));
    }
}
