use std::borrow::Cow;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::constants::{
    DEFAULT_BACKOFF_INTERVAL, DEFAULT_CONNECT_TIMEOUT, DEFAULT_PUSH_INTERVAL,
    DEFAULT_READ_TIMEOUT, DEFAULT_STARTUP_DELAY, USER_AGENT,
};
use crate::management::ManagementStore;
use crate::server::ServerIdentity;
use crate::transport::TransportFactory;

/// Configuration settings for the probe.
///
/// Most fields are optional and filled in from the environment by
/// [`apply_defaults`](crate::apply_defaults).
///
/// # Examples
///
/// ```
/// let _options = monitor_probe::ProbeOptions {
///     endpoint: Some("https://collector.example.com/push".into()),
///     account: Some("3f6a9e".into()),
///     ..Default::default()
/// };
/// ```
#[derive(Clone)]
pub struct ProbeOptions {
    /// The collection endpoint. The probe refuses to start without one.
    pub endpoint: Option<Cow<'static, str>>,
    /// The account key sent with every push.
    pub account: Option<String>,
    /// File whose first line holds the account key, read when `account` is
    /// not set.
    pub account_file: Option<PathBuf>,
    /// Overrides the detected http port as this instance's identity.
    pub unique_id: Option<String>,
    /// An optional HTTP proxy to use.
    pub http_proxy: Option<Cow<'static, str>>,
    /// An optional HTTPS proxy to use.
    ///
    /// This will default to `HTTP_PROXY` if not set.
    pub https_proxy: Option<Cow<'static, str>>,
    /// Pause between two regular pushes. (defaults to 60 seconds)
    pub push_interval: Duration,
    /// Pause after a failed cycle. (defaults to 15 minutes)
    pub backoff_interval: Duration,
    /// Pause before the very first push. (defaults to 2 seconds)
    pub startup_delay: Duration,
    /// Bound on establishing a connection to the endpoint. (defaults to 2 minutes)
    pub connect_timeout: Duration,
    /// Bound on one whole request/response exchange. (defaults to 2 minutes)
    pub read_timeout: Duration,
    /// The user agent sent with every push.
    pub user_agent: Cow<'static, str>,
    /// The transport to use.
    ///
    /// This is typically either a boxed function taking the probe options by
    /// reference and returning a `Transport`, a boxed `Arc<Transport>` or
    /// alternatively the `DefaultTransportFactory`.
    pub transport: Option<Arc<dyn TransportFactory>>,
    /// A fixed server identity. When unset the identity is detected from
    /// the management stores.
    pub server_identity: Option<Arc<dyn ServerIdentity>>,
    /// Host supplied management stores, queried in order.
    pub stores: Vec<Arc<dyn ManagementStore>>,
    /// Also expose the probe's own process through a `ProcessStore`.
    pub default_stores: bool,
}

impl ProbeOptions {
    /// Creates new Options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a management store.
    #[must_use]
    pub fn add_store<S: ManagementStore>(mut self, store: S) -> Self {
        self.stores.push(Arc::new(store));
        self
    }

    /// Sets the collection endpoint.
    #[must_use]
    pub fn with_endpoint<E: Into<Cow<'static, str>>>(mut self, endpoint: E) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Sets the account key.
    #[must_use]
    pub fn with_account<A: Into<String>>(mut self, account: A) -> Self {
        self.account = Some(account.into());
        self
    }

    /// Sets a fixed server identity.
    #[must_use]
    pub fn with_server_identity<I: ServerIdentity + 'static>(mut self, identity: I) -> Self {
        self.server_identity = Some(Arc::new(identity));
        self
    }
}

impl fmt::Debug for ProbeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        #[derive(Debug)]
        struct TransportFactory;
        #[derive(Debug)]
        struct ServerIdentity;

        let stores: Vec<_> = self.stores.iter().map(|s| s.name()).collect();

        f.debug_struct("ProbeOptions")
            .field("endpoint", &self.endpoint)
            .field("account", &self.account.as_ref().map(|_| "[redacted]"))
            .field("account_file", &self.account_file)
            .field("unique_id", &self.unique_id)
            .field("http_proxy", &self.http_proxy)
            .field("https_proxy", &self.https_proxy)
            .field("push_interval", &self.push_interval)
            .field("backoff_interval", &self.backoff_interval)
            .field("startup_delay", &self.startup_delay)
            .field("connect_timeout", &self.connect_timeout)
            .field("read_timeout", &self.read_timeout)
            .field("user_agent", &self.user_agent)
            .field("transport", &self.transport.as_ref().map(|_| TransportFactory))
            .field(
                "server_identity",
                &self.server_identity.as_ref().map(|_| ServerIdentity),
            )
            .field("stores", &stores)
            .field("default_stores", &self.default_stores)
            .finish()
    }
}

impl Default for ProbeOptions {
    fn default() -> ProbeOptions {
        ProbeOptions {
            endpoint: None,
            account: None,
            account_file: None,
            unique_id: None,
            http_proxy: None,
            https_proxy: None,
            push_interval: DEFAULT_PUSH_INTERVAL,
            backoff_interval: DEFAULT_BACKOFF_INTERVAL,
            startup_delay: DEFAULT_STARTUP_DELAY,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            user_agent: Cow::Borrowed(&USER_AGENT),
            transport: None,
            server_identity: None,
            stores: Vec::new(),
            default_stores: true,
        }
    }
}
