use std::borrow::Cow;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use crate::constants::{DEFAULT_ACCOUNT_FILE, DEFAULT_ENDPOINT};
use crate::transports::DefaultTransportFactory;
use crate::ProbeOptions;

/// Apply default probe options.
///
/// Extends the given `ProbeOptions` with default options such as the default
/// transport and the values of well-known environment variables:
///
/// - `PROBE_URL`: the endpoint, falling back to a collector on localhost
/// - `PROBE_ACCOUNT`: the account key
/// - `PROBE_ACCOUNT_FILE`: the account file, `uuid` in the working directory
///   by default
/// - `PROBE_UNIQUE_ID`: the instance identity override
/// - `HTTP_PROXY`/`http_proxy` and `HTTPS_PROXY`/`https_proxy`
///
/// Values already set on the options are kept.
///
/// # Examples
/// ```
/// std::env::set_var("PROBE_ACCOUNT", "3f6a9e");
/// let options = monitor_probe::ProbeOptions::default();
/// assert_eq!(options.account, None);
/// let options = monitor_probe::apply_defaults(options);
/// assert_eq!(options.account.as_deref(), Some("3f6a9e"));
/// ```
pub fn apply_defaults(mut opts: ProbeOptions) -> ProbeOptions {
    if opts.transport.is_none() {
        opts.transport = Some(Arc::new(DefaultTransportFactory));
    }
    if opts.endpoint.is_none() {
        opts.endpoint = env::var("PROBE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty())
            .map(Cow::Owned)
            .or(Some(Cow::Borrowed(DEFAULT_ENDPOINT)));
    }
    if opts.account.is_none() {
        opts.account = env::var("PROBE_ACCOUNT").ok();
    }
    if opts.account_file.is_none() {
        opts.account_file = Some(
            env::var_os("PROBE_ACCOUNT_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_ACCOUNT_FILE)),
        );
    }
    if opts.unique_id.is_none() {
        opts.unique_id = env::var("PROBE_UNIQUE_ID").ok();
    }
    if opts.http_proxy.is_none() {
        opts.http_proxy = env::var("HTTP_PROXY")
            .ok()
            .map(Cow::Owned)
            .or_else(|| env::var("http_proxy").ok().map(Cow::Owned));
    }
    if opts.https_proxy.is_none() {
        opts.https_proxy = env::var("HTTPS_PROXY")
            .ok()
            .map(Cow::Owned)
            .or_else(|| env::var("https_proxy").ok().map(Cow::Owned))
            .or_else(|| opts.http_proxy.clone());
    }
    opts
}
