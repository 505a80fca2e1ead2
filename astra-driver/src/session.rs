//! Session establishment.
//!
//! The wire protocol client is reached through two traits: a
//! [`SessionConnector`] opens sessions from a connect bundle and a
//! [`CqlSession`] is the live, shareable session it returns.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{ConsistencyLevel, TOKEN_USERNAME};
use crate::error::{AstraError, AstraResult};
use crate::resolver::ConnectionBundle;
use crate::url::AstraUrl;

/// A session shared between every connection opened for the same URL.
pub type SharedSession = Arc<dyn CqlSession>;

/// An established session.
#[async_trait]
pub trait CqlSession: Send + Sync + fmt::Debug {
    /// Keyspace the session was opened on.
    fn keyspace(&self) -> &str;

    /// Execute a CQL statement, discarding any rows.
    async fn execute(&self, cql: &str, consistency: ConsistencyLevel) -> AstraResult<()>;

    /// Release the session's resources.
    async fn close(&self);
}

/// How a session authenticates.
#[derive(Clone, PartialEq, Eq)]
pub enum AuthMode {
    /// Explicit username and password.
    Credentials {
        /// Username or client id.
        username: String,
        /// Password or client secret.
        password: String,
    },
    /// An application token, sent with the fixed `token` username.
    Token(String),
}

impl AuthMode {
    /// Pick the authentication for `url`.
    ///
    /// An explicit user wins; its password defaults to the token. Without a
    /// user the token is used.
    pub fn for_url(url: &AstraUrl) -> AstraResult<Self> {
        match (url.user(), url.password().or(url.token())) {
            (Some(user), Some(password)) => Ok(Self::Credentials {
                username: user.to_string(),
                password: password.to_string(),
            }),
            (Some(user), None) => Err(AstraError::Authentication(format!(
                "no password or token for user '{user}'"
            ))),
            (None, _) => url
                .token()
                .map(|token| Self::Token(token.to_string()))
                .ok_or_else(|| AstraError::Authentication("no token configured".into())),
        }
    }

    /// Username sent during the handshake.
    #[must_use]
    pub fn username(&self) -> &str {
        match self {
            Self::Credentials { username, .. } => username,
            Self::Token(_) => TOKEN_USERNAME,
        }
    }

    /// Secret sent during the handshake.
    #[must_use]
    pub fn secret(&self) -> &str {
        match self {
            Self::Credentials { password, .. } => password,
            Self::Token(token) => token,
        }
    }
}

impl fmt::Debug for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Credentials { username, .. } => f
                .debug_struct("Credentials")
                .field("username", username)
                .finish_non_exhaustive(),
            Self::Token(_) => f.write_str("Token(***)"),
        }
    }
}

/// Parameters for opening one session.
#[derive(Debug, Clone)]
pub struct SessionRequest {
    /// Connect bundle of the target datacenter.
    pub bundle: ConnectionBundle,
    /// Keyspace to select.
    pub keyspace: String,
    /// Authentication.
    pub auth: AuthMode,
    /// Default consistency for the session.
    pub consistency: ConsistencyLevel,
    /// Request timeout handed to the session; not enforced here.
    pub request_timeout: Duration,
}

impl SessionRequest {
    /// Build the request for `url` using a resolved `bundle`.
    pub fn new(url: &AstraUrl, bundle: ConnectionBundle) -> AstraResult<Self> {
        Ok(Self {
            bundle,
            keyspace: url.keyspace().to_string(),
            auth: AuthMode::for_url(url)?,
            consistency: url.consistency_level(),
            request_timeout: url.request_timeout(),
        })
    }
}

/// Opens sessions from connect bundles.
#[async_trait]
pub trait SessionConnector: Send + Sync {
    /// Perform the handshake and return a live session.
    async fn open_session(&self, request: SessionRequest) -> AstraResult<SharedSession>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn url(raw: &str) -> AstraUrl {
        AstraUrl::parse(raw).unwrap()
    }

    #[test]
    fn test_token_auth() {
        let auth = AuthMode::for_url(&url("astra://db/ks?token=AstraCS:t")).unwrap();
        assert_eq!(auth, AuthMode::Token("AstraCS:t".into()));
        assert_eq!(auth.username(), "token");
        assert_eq!(auth.secret(), "AstraCS:t");
    }

    #[test]
    fn test_password_only_uses_token_auth() {
        let auth = AuthMode::for_url(&url("astra://db/ks?password=p")).unwrap();
        assert_eq!(auth, AuthMode::Token("p".into()));
    }

    #[test]
    fn test_user_password_auth() {
        let auth = AuthMode::for_url(&url("astra://db/ks?user=client&password=secret")).unwrap();
        assert_eq!(auth.username(), "client");
        assert_eq!(auth.secret(), "secret");
    }

    #[test]
    fn test_user_with_token_only() {
        let auth = AuthMode::for_url(&url("astra://db/ks?user=client&token=t")).unwrap();
        assert_eq!(
            auth,
            AuthMode::Credentials {
                username: "client".into(),
                password: "t".into()
            }
        );
    }

    #[test]
    fn test_user_without_secret() {
        let err = AuthMode::for_url(&url("astra://db/ks?user=client")).unwrap_err();
        assert!(err.is_auth_error());
    }

    #[test]
    fn test_auth_debug_redacts() {
        let auth = AuthMode::Credentials {
            username: "client".into(),
            password: "secret".into(),
        };
        let rendered = format!("{auth:?}");
        assert!(rendered.contains("client"));
        assert!(!rendered.contains("secret"));
        assert_eq!(format!("{:?}", AuthMode::Token("t".into())), "Token(***)");
    }

    #[test]
    fn test_session_request() {
        let bundle = ConnectionBundle {
            database_id: "id".into(),
            region: None,
            bytes: vec![1, 2, 3],
        };
        let request =
            SessionRequest::new(&url("astra://db/ks?token=t&request-timeout=250"), bundle).unwrap();
        assert_eq!(request.keyspace, "ks");
        assert_eq!(request.request_timeout, Duration::from_millis(250));
        assert_eq!(request.consistency, ConsistencyLevel::LocalQuorum);
    }
}
