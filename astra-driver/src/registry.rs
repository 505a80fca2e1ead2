//! Process-wide driver registry.
//!
//! Data sources do not talk to a driver directly; they hand a URL to the
//! registry, which picks the first registered driver that accepts it.

use parking_lot::{Mutex, RwLock};
use std::io::Write;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::Properties;
use crate::connection::AstraConnection;
use crate::driver::Driver;
use crate::error::{AstraError, AstraResult};

/// Shared sink for registry log lines.
pub type LogWriter = Arc<Mutex<dyn Write + Send>>;

static GLOBAL: LazyLock<Arc<DriverRegistry>> = LazyLock::new(|| Arc::new(DriverRegistry::new()));

/// Ordered set of drivers plus the registry-wide login timeout and log writer.
#[derive(Default)]
pub struct DriverRegistry {
    drivers: RwLock<Vec<Arc<dyn Driver>>>,
    login_timeout: RwLock<Duration>,
    log_writer: RwLock<Option<LogWriter>>,
}

impl DriverRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    pub fn global() -> Arc<Self> {
        Arc::clone(&GLOBAL)
    }

    /// Add a driver. Drivers are tried in registration order.
    pub fn register(&self, driver: Arc<dyn Driver>) {
        self.println(&format!(
            "registerDriver: version {}.{}",
            driver.major_version(),
            driver.minor_version()
        ));
        self.drivers.write().push(driver);
    }

    /// Remove every driver.
    pub fn deregister_all(&self) {
        self.drivers.write().clear();
    }

    /// The first driver accepting `url`.
    pub fn driver_for(&self, url: &str) -> AstraResult<Arc<dyn Driver>> {
        self.drivers
            .read()
            .iter()
            .find(|driver| driver.accepts_url(url))
            .cloned()
            .ok_or_else(|| AstraError::NoSuitableDriver(redact(url)))
    }

    /// Open a connection through the first driver accepting `url`.
    pub async fn connect(&self, url: &str, properties: &Properties) -> AstraResult<AstraConnection> {
        let driver = self.driver_for(url)?;
        self.println(&format!("getConnection(\"{}\")", redact(url)));
        debug!(properties = properties.len(), "Dispatching connection to driver");
        driver.connect(url, properties).await
    }

    /// Number of registered drivers.
    pub fn len(&self) -> usize {
        self.drivers.read().len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Login timeout shared by every data source. Zero means none.
    pub fn login_timeout(&self) -> Duration {
        *self.login_timeout.read()
    }

    /// Set the login timeout.
    pub fn set_login_timeout(&self, timeout: Duration) {
        *self.login_timeout.write() = timeout;
    }

    /// The current log writer.
    pub fn log_writer(&self) -> Option<LogWriter> {
        self.log_writer.read().clone()
    }

    /// Set or clear the log writer.
    pub fn set_log_writer(&self, writer: Option<LogWriter>) {
        *self.log_writer.write() = writer;
    }

    fn println(&self, line: &str) {
        let Some(writer) = self.log_writer() else {
            return;
        };
        if let Err(e) = writeln!(writer.lock(), "{line}") {
            warn!(error = %e, "Failed to write to registry log writer");
        }
    }
}

impl std::fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("drivers", &self.len())
            .field("login_timeout", &self.login_timeout())
            .field("log_writer", &self.log_writer.read().is_some())
            .finish()
    }
}

/// Strip the query string, which may carry secrets.
fn redact(url: &str) -> String {
    match url.split_once('?') {
        Some((path, _)) => format!("{path}?***"),
        None => url.to_string(),
    }
}
