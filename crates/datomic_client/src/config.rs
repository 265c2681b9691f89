//! Client configuration and per-call options.

use std::fmt;
use std::time::Duration;

/// Wire sentinel for "most recent database version".
pub const LATEST: &str = "-";

/// Configuration for a [`Client`](crate::Client).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base address of the REST service (e.g., "http://localhost:8080").
    pub base_url: String,
    /// Storage alias the service was started with. `None` for
    /// single-tenant deployments.
    pub storage: Option<String>,
    /// Request timeout handed to the transport.
    pub timeout: Duration,
    /// Value of the `User-Agent` header sent by the bundled transport.
    pub user_agent: String,
}

impl ClientConfig {
    /// Creates a configuration for the given base address.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            storage: None,
            timeout: Duration::from_secs(30),
            user_agent: concat!("datomic_client/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }

    /// Sets the storage alias.
    pub fn with_storage(mut self, storage: impl Into<String>) -> Self {
        self.storage = Some(storage.into());
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// A point-in-time database version marker (`t`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Version {
    /// The most recent version, written as `-`.
    #[default]
    Latest,
    /// A basis-t or transaction id.
    T(i64),
    /// Any other marker the server understands, passed through verbatim.
    Raw(String),
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Version::Latest => f.write_str(LATEST),
            Version::T(t) => write!(f, "{t}"),
            Version::Raw(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Version {
    fn from(t: i64) -> Self {
        Version::T(t)
    }
}

impl From<&str> for Version {
    fn from(s: &str) -> Self {
        if s == LATEST {
            Version::Latest
        } else {
            Version::Raw(s.to_string())
        }
    }
}

/// Options recognised by the read operations.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DbOptions {
    /// Database version to read. Defaults to the latest.
    pub t: Version,
}

impl DbOptions {
    /// Options reading the latest version.
    pub fn latest() -> Self {
        Self::default()
    }

    /// Options reading the given version.
    pub fn at(t: impl Into<Version>) -> Self {
        Self { t: t.into() }
    }
}
