//! # astra-driver
//!
//! URL-driven connection broker for Cassandra databases hosted on Astra.
//!
//! A single connection string names the database, the keyspace and the
//! credentials. The driver resolves the database through the control plane,
//! downloads its connect bundle and opens a session, keeping exactly one
//! session per distinct connection string for the life of the process.
//!
//! ## Features
//!
//! - **Connection strings**: `astra://<database>/<keyspace>?token=...&region=...`
//! - **Target resolution**: the database is looked up by name first, then by id
//! - **Session reuse**: concurrent connects for the same URL share one handshake
//! - **Driver registry and data source**: connect through a registry of drivers
//!   or a data source holding fixed credentials
//! - **Optional backends**: `devops` for the HTTP control plane, `scylla` for
//!   real sessions
//!
//! The two optional backends do not fit together yet: the DevOps API serves
//! zip secure connect bundles, while `ScyllaConnector` reads scylla
//! cloud-config YAML and rejects zip archives. Pair each backend with your
//! own [`ControlPlane`] or [`SessionConnector`].
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use astra_driver::{AstraDriver, Properties, ScyllaConnector, StaticControlPlane, DatabaseRef};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let control_plane = StaticControlPlane::new();
//!     control_plane
//!         .register(DatabaseRef::new("3ed83de7", "orders"))
//!         .register_bundle("3ed83de7", None, std::fs::read("cloud-config.yaml")?);
//!     let driver = AstraDriver::new(Arc::new(control_plane), Arc::new(ScyllaConnector::new()));
//!
//!     let conn = driver
//!         .connect("astra://orders/sales?token=AstraCS:...", &Properties::new())
//!         .await?;
//!     conn.execute("SELECT * FROM orders").await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Connection Strings
//!
//! ```rust
//! use astra_driver::{AstraUrl, ConsistencyLevel};
//!
//! let url = AstraUrl::parse("astra://orders/sales?token=t&consistency-level=ONE").unwrap();
//! assert_eq!(url.database(), "orders");
//! assert_eq!(url.consistency_level(), ConsistencyLevel::One);
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

mod cache;
#[cfg(feature = "scylla")]
mod cloud;
mod config;
mod connection;
mod data_source;
#[cfg(feature = "devops")]
mod devops;
mod driver;
mod error;
pub mod logging;
mod registry;
mod resolver;
mod session;
mod url;
mod wrapper;

pub use cache::{CacheStats, SessionCache};
#[cfg(feature = "scylla")]
pub use cloud::{ScyllaConnector, ScyllaSession};
pub use config::{
    ConsistencyLevel, DEFAULT_REQUEST_TIMEOUT_MS, Properties, TOKEN_USERNAME, URL_PREFIX, UrlKey,
};
pub use connection::{AstraConnection, PooledAstraConnection};
pub use data_source::AstraDataSource;
#[cfg(feature = "devops")]
pub use devops::{DEFAULT_DEVOPS_URL, DEVOPS_URL_ENV, DevOpsClient, DevOpsConfig};
pub use driver::{AstraDriver, Driver, DriverPropertyInfo};
pub use error::{AstraError, AstraResult};
pub use registry::{DriverRegistry, LogWriter};
pub use resolver::{
    ConnectionBundle, ControlPlane, DatabaseRef, ResolvedTarget, StaticControlPlane,
    TargetResolver,
};
pub use session::{AuthMode, CqlSession, SessionConnector, SessionRequest, SharedSession};
pub use url::{AstraUrl, AstraUrlBuilder, DEFAULT_URL_ENV};
pub use wrapper::Wrapper;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::{ConsistencyLevel, Properties, UrlKey};
    pub use crate::connection::{AstraConnection, PooledAstraConnection};
    pub use crate::data_source::AstraDataSource;
    pub use crate::driver::{AstraDriver, Driver};
    pub use crate::error::{AstraError, AstraResult};
    pub use crate::registry::DriverRegistry;
    pub use crate::resolver::{ControlPlane, DatabaseRef, StaticControlPlane};
    pub use crate::session::{CqlSession, SessionConnector, SharedSession};
    pub use crate::url::{AstraUrl, AstraUrlBuilder};
    pub use crate::wrapper::Wrapper;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_builder_round_trip() {
        let url = AstraUrl::builder("orders", "sales")
            .token("t")
            .region("us-east-1")
            .build()
            .unwrap();

        assert_eq!(url.region(), Some("us-east-1"));
        assert_eq!(AstraUrl::parse(&url.to_url()).unwrap(), url);
    }

    #[test]
    fn test_url_missing_credentials() {
        let err = AstraUrl::parse("astra://orders/sales").unwrap_err();
        assert!(matches!(err, AstraError::MalformedUrl(_)));
    }
}
