//! # Astra Connect
//!
//! Connect to Cassandra databases hosted on Astra with a single URL.
//!
//! Astra Connect provides:
//! - One connection string carrying database, keyspace, credentials and tuning
//! - Database lookup by name or id through the Astra control plane
//! - One shared session per distinct connection string, built once even under
//!   concurrent connects
//! - A driver registry and a data source for applications that hand out
//!   connections from fixed credentials
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use astra_connect::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let control_plane = StaticControlPlane::new();
//!     control_plane
//!         .register(DatabaseRef::new("3ed83de7", "orders"))
//!         .register_bundle("3ed83de7", None, std::fs::read("cloud-config.yaml")?);
//!     let driver = Arc::new(AstraDriver::new(
//!         Arc::new(control_plane),
//!         Arc::new(ScyllaConnector::new()),
//!     ));
//!
//!     let registry = DriverRegistry::global();
//!     registry.register(driver);
//!
//!     let source = AstraDataSource::new(registry, "client-id", "client-secret", "orders", "sales");
//!     let conn = source.connection().await?;
//!     conn.execute("SELECT * FROM orders").await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! `ScyllaConnector` (feature `scylla`) reads scylla cloud-config YAML
//! bundles. The DevOps API client (feature `devops`) downloads zip secure
//! connect bundles, which `ScyllaConnector` rejects, so the two are not used
//! together.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

/// Driver, resolver, cache and connection types.
pub mod driver {
    pub use astra_driver::*;
}

/// Logging setup.
pub mod logging {
    pub use astra_driver::logging::*;
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use astra_driver::prelude::*;
    #[cfg(feature = "scylla")]
    pub use astra_driver::ScyllaConnector;
    #[cfg(feature = "devops")]
    pub use astra_driver::{DevOpsClient, DevOpsConfig};
}

// Re-export key types at the crate root
pub use astra_driver::{
    AstraConnection, AstraDataSource, AstraDriver, AstraError, AstraResult, AstraUrl,
    ConsistencyLevel, DriverRegistry, Properties,
};
