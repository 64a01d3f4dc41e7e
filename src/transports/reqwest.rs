use ::reqwest::blocking::Client as ReqwestClient;
use ::reqwest::header::CONTENT_TYPE;
use ::reqwest::Proxy;
use url::Url;

use crate::error::{ConfigError, PushError};
use crate::options::ProbeOptions;
use crate::protocol::Record;
use crate::transport::Transport;

/// A [`Transport`] that posts records via the blocking [`reqwest`] client.
///
/// When the `transport` feature is enabled this is the default transport.
///
/// [`reqwest`]: https://crates.io/crates/reqwest
pub struct ReqwestHttpTransport {
    client: ReqwestClient,
    url: Url,
}

impl ReqwestHttpTransport {
    /// Creates a new transport posting to `endpoint`.
    ///
    /// Only the proxies named in the options are used; see
    /// [`apply_defaults`](crate::apply_defaults) for reading them from the
    /// environment.
    pub fn new(options: &ProbeOptions, endpoint: &Url) -> Result<Self, ConfigError> {
        let mut builder = ReqwestClient::builder()
            .connect_timeout(options.connect_timeout)
            .timeout(options.read_timeout)
            .user_agent(options.user_agent.to_string())
            .no_proxy();
        if let Some(url) = options.http_proxy.as_ref() {
            let proxy =
                Proxy::http(url.to_string()).map_err(|e| ConfigError::Transport(e.to_string()))?;
            builder = builder.proxy(proxy);
        }
        if let Some(url) = options.https_proxy.as_ref() {
            let proxy =
                Proxy::https(url.to_string()).map_err(|e| ConfigError::Transport(e.to_string()))?;
            builder = builder.proxy(proxy);
        }
        let client = builder
            .build()
            .map_err(|e| ConfigError::Transport(e.to_string()))?;
        Ok(Self::with_client(client, endpoint))
    }

    /// Creates a new transport that uses the specified [`ReqwestClient`].
    pub fn with_client(client: ReqwestClient, endpoint: &Url) -> Self {
        Self {
            client,
            url: endpoint.clone(),
        }
    }
}

impl Transport for ReqwestHttpTransport {
    fn send_record(&self, request: &Record) -> Result<Record, PushError> {
        let response = self
            .client
            .post(self.url.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(request.to_vec())
            .send()
            .map_err(|e| PushError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PushError::Protocol(format!(
                "collector answered with status {}",
                status
            )));
        }

        let body = response
            .bytes()
            .map_err(|e| PushError::Network(e.to_string()))?;
        log::debug!("got response of {} bytes", body.len());
        Ok(Record::from_slice(&body)?)
    }
}
