//! Connection settings shared by the URL parser and the driver.
//!
//! Holds the recognized URL keys, the CQL consistency levels and the defaults
//! applied when a connection string leaves a setting out.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{AstraError, AstraResult};

/// Side-channel overrides supplied next to a connection string.
pub type Properties = HashMap<String, String>;

/// Scheme prefix every Astra connection string starts with.
pub const URL_PREFIX: &str = "astra://";

/// Request timeout applied when none is given, in milliseconds.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

/// Username paired with the token when no explicit user is configured.
pub const TOKEN_USERNAME: &str = "token";

/// Keys accepted in the query string and in [`Properties`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UrlKey {
    /// `consistency-level`
    ConsistencyLevel,
    /// `debug`
    Debug,
    /// `user`
    User,
    /// `token`
    Token,
    /// `password`
    Password,
    /// `region`
    Region,
    /// `request-timeout`
    RequestTimeout,
}

impl UrlKey {
    /// Every recognized key, in canonical URL order.
    pub const ALL: [UrlKey; 7] = [
        UrlKey::Token,
        UrlKey::Region,
        UrlKey::ConsistencyLevel,
        UrlKey::User,
        UrlKey::Password,
        UrlKey::Debug,
        UrlKey::RequestTimeout,
    ];

    /// The key as written in a URL.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ConsistencyLevel => "consistency-level",
            Self::Debug => "debug",
            Self::User => "user",
            Self::Token => "token",
            Self::Password => "password",
            Self::Region => "region",
            Self::RequestTimeout => "request-timeout",
        }
    }

    /// Human readable description used by driver property info.
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::ConsistencyLevel => "Default consistency level for statements",
            Self::Debug => "Log every statement executed on the connection",
            Self::User => "Username, or client id when authenticating with a role",
            Self::Token => "Application token; stands as password when no client id/secret is given",
            Self::Password => "Password, or client secret; used as the token when no token is set",
            Self::Region => "Region of the datacenter to connect to for multi-region databases",
            Self::RequestTimeout => "Request timeout in milliseconds passed to the session",
        }
    }
}

impl fmt::Display for UrlKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UrlKey {
    type Err = AstraError;

    fn from_str(s: &str) -> AstraResult<Self> {
        Self::ALL
            .into_iter()
            .find(|key| key.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| AstraError::malformed(format!("Unknown parameter '{s}'")))
    }
}

/// CQL consistency levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsistencyLevel {
    /// Any node.
    Any,
    /// Single node.
    One,
    /// Two nodes.
    Two,
    /// Three nodes.
    Three,
    /// Quorum of nodes.
    Quorum,
    /// All nodes.
    All,
    /// Local quorum.
    #[default]
    LocalQuorum,
    /// Each quorum.
    EachQuorum,
    /// Local one.
    LocalOne,
    /// Serial (lightweight transactions).
    Serial,
    /// Local serial (lightweight transactions).
    LocalSerial,
}

impl ConsistencyLevel {
    /// Every level, in protocol order.
    pub const ALL: [ConsistencyLevel; 11] = [
        ConsistencyLevel::Any,
        ConsistencyLevel::One,
        ConsistencyLevel::Two,
        ConsistencyLevel::Three,
        ConsistencyLevel::Quorum,
        ConsistencyLevel::All,
        ConsistencyLevel::LocalQuorum,
        ConsistencyLevel::EachQuorum,
        ConsistencyLevel::LocalOne,
        ConsistencyLevel::Serial,
        ConsistencyLevel::LocalSerial,
    ];

    /// The level as written in a URL.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Any => "ANY",
            Self::One => "ONE",
            Self::Two => "TWO",
            Self::Three => "THREE",
            Self::Quorum => "QUORUM",
            Self::All => "ALL",
            Self::LocalQuorum => "LOCAL_QUORUM",
            Self::EachQuorum => "EACH_QUORUM",
            Self::LocalOne => "LOCAL_ONE",
            Self::Serial => "SERIAL",
            Self::LocalSerial => "LOCAL_SERIAL",
        }
    }

    /// Whether this is a serial level, only valid for conditional updates.
    #[must_use]
    pub fn is_serial(self) -> bool {
        matches!(self, Self::Serial | Self::LocalSerial)
    }
}

impl fmt::Display for ConsistencyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConsistencyLevel {
    type Err = AstraError;

    fn from_str(s: &str) -> AstraResult<Self> {
        Self::ALL
            .into_iter()
            .find(|level| level.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                AstraError::malformed(format!(
                    "Invalid value '{s}' for '{}'",
                    UrlKey::ConsistencyLevel
                ))
            })
    }
}

#[cfg(feature = "scylla")]
impl From<ConsistencyLevel> for scylla::statement::Consistency {
    fn from(level: ConsistencyLevel) -> Self {
        use scylla::statement::Consistency;

        match level {
            ConsistencyLevel::Any => Consistency::Any,
            ConsistencyLevel::One => Consistency::One,
            ConsistencyLevel::Two => Consistency::Two,
            ConsistencyLevel::Three => Consistency::Three,
            ConsistencyLevel::Quorum => Consistency::Quorum,
            ConsistencyLevel::All => Consistency::All,
            ConsistencyLevel::LocalQuorum => Consistency::LocalQuorum,
            ConsistencyLevel::EachQuorum => Consistency::EachQuorum,
            ConsistencyLevel::LocalOne => Consistency::LocalOne,
            ConsistencyLevel::Serial => Consistency::Serial,
            ConsistencyLevel::LocalSerial => Consistency::LocalSerial,
        }
    }
}
