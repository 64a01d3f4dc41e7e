use std::sync::Arc;

use url::Url;

use crate::error::{ConfigError, PushError};
use crate::options::ProbeOptions;
use crate::protocol::Record;

/// The trait for transports.
///
/// A transport delivers one request record to the collector and returns the
/// collector's response record. It is called from the probe's worker thread
/// and may block for the whole round trip; implementations are expected to
/// bound that with their own timeouts.
pub trait Transport: Send + Sync + 'static {
    /// Sends a request record and waits for the response.
    fn send_record(&self, request: &Record) -> Result<Record, PushError>;
}

/// A factory creating transport instances.
///
/// Because options are potentially reused between different probes the
/// options do not actually contain a transport but a factory object that
/// can create transports instead.
///
/// The factory has a single method that creates a new arced transport.
/// Because transports can be wrapped in `Arc`s and those are clonable
/// any `Arc<Transport>` is also a valid transport factory. This for
/// instance lets you put an `Arc<TestTransport>` directly into the options.
pub trait TransportFactory: Send + Sync {
    /// Given the options and the parsed endpoint creates a transport.
    fn create_transport(
        &self,
        options: &ProbeOptions,
        endpoint: &Url,
    ) -> Result<Arc<dyn Transport>, ConfigError>;
}

impl<F> TransportFactory for F
where
    F: Fn(&ProbeOptions, &Url) -> Result<Arc<dyn Transport>, ConfigError> + Send + Sync,
{
    fn create_transport(
        &self,
        options: &ProbeOptions,
        endpoint: &Url,
    ) -> Result<Arc<dyn Transport>, ConfigError> {
        (*self)(options, endpoint)
    }
}

impl<T: Transport> TransportFactory for Arc<T> {
    fn create_transport(
        &self,
        _options: &ProbeOptions,
        _endpoint: &Url,
    ) -> Result<Arc<dyn Transport>, ConfigError> {
        Ok(self.clone())
    }
}
