use std::ops::Deref;

use crate::defaults::apply_defaults;
use crate::error::ConfigError;
use crate::{Probe, ProbeOptions};

/// Helper struct that is returned from `init`.
///
/// When this is dropped the worker is stopped, waiting for a push in
/// flight to finish.
#[must_use = "when the init guard is dropped the probe is stopped and no further \
              samples are pushed. If you do want to ignore this use mem::forget on it."]
pub struct ProbeInitGuard(Probe);

impl ProbeInitGuard {
    /// The running probe.
    pub fn probe(&self) -> &Probe {
        &self.0
    }
}

impl Deref for ProbeInitGuard {
    type Target = Probe;

    fn deref(&self) -> &Probe {
        &self.0
    }
}

impl Drop for ProbeInitGuard {
    fn drop(&mut self) {
        log::debug!("dropping probe guard -> stopping probe");
        self.0.stop();
    }
}

/// Creates and starts the probe.
///
/// The options are completed with [`apply_defaults`] first, so the
/// endpoint and account may come from the environment.
///
/// # Examples
///
/// ```no_run
/// let _probe = monitor_probe::init(monitor_probe::ProbeOptions {
///     account: Some("3f6a9e".into()),
///     ..Default::default()
/// })
/// .unwrap();
/// ```
pub fn init<O: Into<ProbeOptions>>(options: O) -> Result<ProbeInitGuard, ConfigError> {
    let probe = Probe::new(apply_defaults(options.into()))?;
    probe.start();
    Ok(ProbeInitGuard(probe))
}
