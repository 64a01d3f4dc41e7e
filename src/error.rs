//! Error types raised by the probe.
//!
//! Each concern gets its own enum so callers can tell apart the fatal
//! startup failures ([`ConfigError`]), the recoverable cycle failures
//! ([`PushError`]) and the per-item sampling failures ([`QueryError`]).

use thiserror::Error;

/// Raised when the probe options cannot be turned into a running probe.
///
/// These are fatal: the worker is never started.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No endpoint was configured and none could be found in the environment.
    #[error("no collection endpoint configured")]
    MissingEndpoint,
    /// The endpoint is not a valid url.
    #[error("unable to parse '{url}' into a url")]
    InvalidEndpoint {
        /// The rejected input.
        url: String,
        /// The underlying parse failure.
        #[source]
        source: url::ParseError,
    },
    /// The endpoint uses a scheme other than http or https.
    #[error("unsupported endpoint scheme '{0}'")]
    UnsupportedScheme(String),
    /// The http client could not be built, most often because of a bad proxy.
    #[error("unable to build http transport: {0}")]
    Transport(String),
}

/// Raised when a single management attribute cannot be read.
#[derive(Debug, Error)]
pub enum QueryError {
    /// No store knows the bean.
    #[error("no such bean: {0}")]
    NoSuchBean(String),
    /// The bean exists but lacks the attribute.
    #[error("no such attribute: {bean}#{attribute}")]
    NoSuchAttribute {
        /// The bean that was queried.
        bean: String,
        /// The attribute path segment that was not found.
        attribute: String,
    },
    /// A dotted attribute path descended into a value without fields.
    #[error("{path} of {bean} is not a composite value")]
    NotComposite {
        /// The bean that was queried.
        bean: String,
        /// The path prefix that resolved to a scalar.
        path: String,
    },
    /// The name could not be parsed.
    #[error("malformed object name '{0}'")]
    MalformedName(String),
    /// The store failed for its own reasons.
    #[error("store failure: {0}")]
    Store(String),
}

/// Raised when a record body cannot be encoded or decoded.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The body is not a JSON object of strings.
    #[error("invalid record body")]
    InvalidJson(#[from] serde_json::Error),
}

/// Raised when one push/response cycle does not complete.
#[derive(Debug, Error)]
pub enum PushError {
    /// The request could not be delivered or the response not read.
    #[error("network failure: {0}")]
    Network(String),
    /// The collector answered with something we cannot interpret.
    #[error("protocol failure: {0}")]
    Protocol(String),
    /// The probe could not establish who it is.
    #[error("unable to establish identity: {0}")]
    Identity(String),
    /// The collector suspended this probe for good.
    #[error("put on hold by the collector: {0}")]
    OnHold(String),
}

impl PushError {
    /// Returns `true` for the permanent suspension signal.
    pub fn is_on_hold(&self) -> bool {
        matches!(self, PushError::OnHold(_))
    }
}

impl From<CodecError> for PushError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::InvalidJson(source) => {
                PushError::Protocol(format!("invalid record body: {}", source))
            }
        }
    }
}
