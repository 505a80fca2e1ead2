//! Astra connection string parser.
//!
//! URL format: `astra://<database>/<keyspace>[?key=value(&key=value)*]`
//!
//! `<database>` is either a database name or a database id; which one is only
//! known once the control plane has been asked. Values are taken verbatim, no
//! percent-decoding is applied.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::time::Duration;
use tracing::debug;

use crate::config::{
    ConsistencyLevel, DEFAULT_REQUEST_TIMEOUT_MS, Properties, URL_PREFIX, UrlKey,
};
use crate::error::{AstraError, AstraResult};

/// Environment variable read by [`AstraUrl::from_default_env`].
pub const DEFAULT_URL_ENV: &str = "ASTRA_URL";

/// A parsed Astra connection string.
///
/// Equality and hashing consider the database, region, consistency level,
/// keyspace, token, debug flag and request timeout. `user` and `password` are
/// left out, so two URLs that differ only there share a cached session.
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AstraUrl {
    database: String,
    keyspace: String,
    token: Option<String>,
    user: Option<String>,
    password: Option<String>,
    region: Option<String>,
    consistency_level: ConsistencyLevel,
    debug: bool,
    request_timeout_ms: u64,
}

impl AstraUrl {
    /// Create a new URL builder.
    #[must_use]
    pub fn builder(database: impl Into<String>, keyspace: impl Into<String>) -> AstraUrlBuilder {
        AstraUrlBuilder::new(database, keyspace)
    }

    /// Parse a connection string without overrides.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use astra_driver::{AstraUrl, ConsistencyLevel};
    ///
    /// let url = AstraUrl::parse("astra://mydb/myks?token=abc123&region=us-east-1").unwrap();
    /// assert_eq!(url.database(), "mydb");
    /// assert_eq!(url.keyspace(), "myks");
    /// assert_eq!(url.region(), Some("us-east-1"));
    /// assert_eq!(url.consistency_level(), ConsistencyLevel::LocalQuorum);
    /// ```
    pub fn parse(url: &str) -> AstraResult<Self> {
        Self::parse_with(url, &Properties::new())
    }

    /// Parse a connection string, then apply `overrides` on top of it.
    ///
    /// Any recognized key present in `overrides` replaces the value from the
    /// query string. Unrecognized override keys are ignored.
    pub fn parse_with(url: &str, overrides: &Properties) -> AstraResult<Self> {
        debug!(url_len = url.len(), overrides = overrides.len(), "AstraUrl::parse()");

        let rest = url
            .strip_prefix(URL_PREFIX)
            .ok_or_else(|| AstraError::malformed(format!("URL must start with {URL_PREFIX}")))?;

        let (path, query) = match rest.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (rest, None),
        };

        let (database, keyspace) = path.split_once('/').ok_or_else(|| {
            AstraError::malformed(format!(
                "URL must contain a keyspace {URL_PREFIX}<database>/<keyspace>"
            ))
        })?;
        if database.is_empty() {
            return Err(AstraError::malformed(format!(
                "URL must contain a database identifier {URL_PREFIX}<database>/<keyspace>"
            )));
        }
        if keyspace.is_empty() {
            return Err(AstraError::malformed(format!(
                "URL must contain a keyspace {URL_PREFIX}<database>/<keyspace>"
            )));
        }
        if keyspace.contains('/') {
            return Err(AstraError::malformed(format!(
                "Invalid keyspace '{keyspace}'"
            )));
        }

        let mut parsed = Self {
            database: database.to_string(),
            keyspace: keyspace.to_string(),
            token: None,
            user: None,
            password: None,
            region: None,
            consistency_level: ConsistencyLevel::default(),
            debug: false,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        };

        if let Some(query) = query {
            // Empty segments come from a bare `?` or a trailing `&`.
            for param in query.split('&').filter(|p| !p.is_empty()) {
                let (key, value) = param.split_once('=').ok_or_else(|| {
                    AstraError::malformed(format!("Missing value for parameter '{param}'"))
                })?;
                parsed.apply(key.parse()?, value)?;
            }
        }

        for key in UrlKey::ALL {
            if let Some(value) = overrides.get(key.as_str()) {
                parsed.apply(key, value)?;
            }
        }

        if parsed.token.is_none() {
            parsed.token.clone_from(&parsed.password);
        }
        if parsed.token.is_none() && parsed.user.is_none() {
            return Err(AstraError::malformed(
                "URL must contain a token or user/password",
            ));
        }

        debug!(
            database = %parsed.database,
            keyspace = %parsed.keyspace,
            region = ?parsed.region,
            consistency = %parsed.consistency_level,
            "Astra URL parsed"
        );
        Ok(parsed)
    }

    /// Parse from an environment variable.
    pub fn from_env(var: &str) -> AstraResult<Self> {
        let url = std::env::var(var).map_err(|_| {
            AstraError::Configuration(format!("Environment variable not found: {var}"))
        })?;
        Self::parse(&url)
    }

    /// Parse from the `ASTRA_URL` environment variable.
    pub fn from_default_env() -> AstraResult<Self> {
        Self::from_env(DEFAULT_URL_ENV)
    }

    fn apply(&mut self, key: UrlKey, value: &str) -> AstraResult<()> {
        if value.is_empty() {
            return Err(AstraError::malformed(format!(
                "Missing value for parameter '{key}'"
            )));
        }
        let invalid = || AstraError::malformed(format!("Invalid value '{value}' for '{key}'"));

        match key {
            UrlKey::Region => self.region = Some(value.to_string()),
            UrlKey::ConsistencyLevel => self.consistency_level = value.parse()?,
            UrlKey::Token => self.token = Some(value.to_string()),
            UrlKey::User => self.user = Some(value.to_string()),
            UrlKey::Password => self.password = Some(value.to_string()),
            UrlKey::Debug => {
                self.debug = match value.to_ascii_lowercase().as_str() {
                    "true" => true,
                    "false" => false,
                    _ => return Err(invalid()),
                }
            }
            UrlKey::RequestTimeout => {
                self.request_timeout_ms = value.parse().map_err(|_| invalid())?;
            }
        }
        Ok(())
    }

    /// Render the canonical connection string, including every set field.
    ///
    /// Secrets are written in clear text.
    #[must_use]
    pub fn to_url(&self) -> String {
        let mut params: Vec<(UrlKey, String)> = Vec::with_capacity(UrlKey::ALL.len());
        if let Some(ref token) = self.token {
            params.push((UrlKey::Token, token.clone()));
        }
        if let Some(ref region) = self.region {
            params.push((UrlKey::Region, region.clone()));
        }
        params.push((UrlKey::ConsistencyLevel, self.consistency_level.to_string()));
        if let Some(ref user) = self.user {
            params.push((UrlKey::User, user.clone()));
        }
        if let Some(ref password) = self.password {
            params.push((UrlKey::Password, password.clone()));
        }
        params.push((UrlKey::Debug, self.debug.to_string()));
        params.push((UrlKey::RequestTimeout, self.request_timeout_ms.to_string()));

        let query: Vec<String> = params
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect();
        format!(
            "{URL_PREFIX}{}/{}?{}",
            self.database,
            self.keyspace,
            query.join("&")
        )
    }

    /// Database name or id.
    #[must_use]
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Target keyspace.
    #[must_use]
    pub fn keyspace(&self) -> &str {
        &self.keyspace
    }

    /// Token, falling back to the password when no token was given.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Explicit username.
    #[must_use]
    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    /// Explicit password.
    #[must_use]
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    /// Datacenter region.
    #[must_use]
    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    /// Consistency level for statements.
    #[must_use]
    pub fn consistency_level(&self) -> ConsistencyLevel {
        self.consistency_level
    }

    /// Whether statement logging is enabled.
    #[must_use]
    pub fn is_debug(&self) -> bool {
        self.debug
    }

    /// Request timeout in milliseconds.
    #[must_use]
    pub fn request_timeout_ms(&self) -> u64 {
        self.request_timeout_ms
    }

    /// Request timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Value of a recognized key, as it would appear in the URL.
    #[must_use]
    pub fn value_of(&self, key: UrlKey) -> Option<String> {
        match key {
            UrlKey::ConsistencyLevel => Some(self.consistency_level.to_string()),
            UrlKey::Debug => Some(self.debug.to_string()),
            UrlKey::User => self.user.clone(),
            UrlKey::Token => self.token.clone(),
            UrlKey::Password => self.password.clone(),
            UrlKey::Region => self.region.clone(),
            UrlKey::RequestTimeout => Some(self.request_timeout_ms.to_string()),
        }
    }
}

impl PartialEq for AstraUrl {
    fn eq(&self, other: &Self) -> bool {
        self.database == other.database
            && self.region == other.region
            && self.consistency_level == other.consistency_level
            && self.keyspace == other.keyspace
            && self.token == other.token
            && self.debug == other.debug
            && self.request_timeout_ms == other.request_timeout_ms
    }
}

impl Eq for AstraUrl {}

impl Hash for AstraUrl {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.database.hash(state);
        self.region.hash(state);
        self.consistency_level.hash(state);
        self.keyspace.hash(state);
        self.token.hash(state);
        self.debug.hash(state);
        self.request_timeout_ms.hash(state);
    }
}

impl fmt::Debug for AstraUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AstraUrl")
            .field("database", &self.database)
            .field("keyspace", &self.keyspace)
            .field("token", &self.token.as_ref().map(|_| "***"))
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("region", &self.region)
            .field("consistency_level", &self.consistency_level)
            .field("debug", &self.debug)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .finish()
    }
}

impl std::str::FromStr for AstraUrl {
    type Err = AstraError;

    fn from_str(s: &str) -> AstraResult<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for AstraUrl {
    type Error = AstraError;

    fn try_from(url: String) -> AstraResult<Self> {
        Self::parse(&url)
    }
}

impl From<AstraUrl> for String {
    fn from(url: AstraUrl) -> Self {
        url.to_url()
    }
}

/// Builder that renders a connection string from individual fields.
#[derive(Debug, Clone, Default)]
pub struct AstraUrlBuilder {
    database: String,
    keyspace: String,
    token: Option<String>,
    user: Option<String>,
    password: Option<String>,
    region: Option<String>,
    consistency_level: Option<ConsistencyLevel>,
    debug: Option<bool>,
    request_timeout_ms: Option<u64>,
}

impl AstraUrlBuilder {
    /// Start a builder for the given database and keyspace.
    #[must_use]
    pub fn new(database: impl Into<String>, keyspace: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            keyspace: keyspace.into(),
            ..Default::default()
        }
    }

    /// Set the token.
    #[must_use]
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Set the username.
    #[must_use]
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Set the password.
    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set the region.
    #[must_use]
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Set the consistency level.
    #[must_use]
    pub fn consistency_level(mut self, level: ConsistencyLevel) -> Self {
        self.consistency_level = Some(level);
        self
    }

    /// Enable or disable statement logging.
    #[must_use]
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = Some(debug);
        self
    }

    /// Set the request timeout in milliseconds.
    #[must_use]
    pub fn request_timeout_ms(mut self, millis: u64) -> Self {
        self.request_timeout_ms = Some(millis);
        self
    }

    /// Render the connection string. Only fields that were set are written.
    #[must_use]
    pub fn to_url(&self) -> String {
        let mut params = Vec::new();
        let mut push = |key: UrlKey, value: Option<String>| {
            if let Some(value) = value {
                params.push(format!("{key}={value}"));
            }
        };
        push(UrlKey::Token, self.token.clone());
        push(UrlKey::User, self.user.clone());
        push(UrlKey::Password, self.password.clone());
        push(
            UrlKey::RequestTimeout,
            self.request_timeout_ms.map(|ms| ms.to_string()),
        );
        push(UrlKey::Region, self.region.clone());
        push(
            UrlKey::ConsistencyLevel,
            self.consistency_level.map(|level| level.to_string()),
        );
        push(UrlKey::Debug, self.debug.map(|debug| debug.to_string()));

        let mut url = format!("{URL_PREFIX}{}/{}", self.database, self.keyspace);
        if !params.is_empty() {
            url.push('?');
            url.push_str(&params.join("&"));
        }
        url
    }

    /// Render and parse the connection string.
    pub fn build(&self) -> AstraResult<AstraUrl> {
        AstraUrl::parse(&self.to_url())
    }
}
