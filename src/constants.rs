use std::time::Duration;

/// The version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

include!(concat!(env!("OUT_DIR"), "/constants.gen.rs"));

/// Endpoint used when neither the options nor `PROBE_URL` name one.
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8080/lemongrass/1.0/push";

/// Account file read when no account is configured explicitly.
pub const DEFAULT_ACCOUNT_FILE: &str = "uuid";

pub const DEFAULT_PUSH_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_BACKOFF_INTERVAL: Duration = Duration::from_secs(15 * 60);
pub const DEFAULT_STARTUP_DELAY: Duration = Duration::from_secs(2);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(120);

lazy_static::lazy_static! {
    /// The user agent sent with every push.
    pub static ref USER_AGENT: String = format!("monitor-probe/{} ({}; {})", VERSION, PLATFORM, ARCH);
}
