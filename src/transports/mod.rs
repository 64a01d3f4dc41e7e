//! The provided transports.
//!
//! The `reqwest` feature (part of the default `transport` feature) turns on
//! the blocking HTTP transport.

use std::sync::Arc;

use url::Url;

use crate::error::ConfigError;
use crate::options::ProbeOptions;
use crate::transport::{Transport, TransportFactory};

#[cfg(feature = "reqwest")]
mod reqwest;
#[cfg(feature = "reqwest")]
pub use self::reqwest::ReqwestHttpTransport;

/// The default http transport.
#[cfg(feature = "reqwest")]
pub type HttpTransport = ReqwestHttpTransport;

/// Creates the default HTTP transport.
///
/// This is the default value for `transport` on the probe options. Without
/// a compiled-in http transport it reports a configuration error, so the
/// probe never starts.
#[derive(Clone, Debug)]
pub struct DefaultTransportFactory;

impl TransportFactory for DefaultTransportFactory {
    fn create_transport(
        &self,
        options: &ProbeOptions,
        endpoint: &Url,
    ) -> Result<Arc<dyn Transport>, ConfigError> {
        #[cfg(feature = "reqwest")]
        {
            Ok(Arc::new(HttpTransport::new(options, endpoint)?))
        }
        #[cfg(not(feature = "reqwest"))]
        {
            let _ = (options, endpoint);
            Err(ConfigError::Transport(
                "monitor-probe was compiled without transport".into(),
            ))
        }
    }
}
