use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use url::Url;

use crate::client::SessionClient;
use crate::error::{ConfigError, PushError};
use crate::management::{Bean, InMemoryStore, ManagementFacade, Value};
use crate::options::ProbeOptions;
use crate::server::ServerInfo;
use crate::transport::{Transport, TransportFactory};
use crate::transports::DefaultTransportFactory;
use crate::utils::panic_message;

/// The helper bean describing the probe and its host server.
pub const SERVER_BEAN: &str = "probe:type=Server";

type Shutdown = Arc<(Mutex<bool>, Condvar)>;

/// The running monitoring probe.
///
/// A probe owns one worker thread that pushes samples to the collector on
/// a fixed interval. Starting and stopping are idempotent and may be called
/// from any thread. Dropping the probe stops it.
///
/// The [`SessionClient`] outlives the worker: a restarted probe keeps its
/// identity, session and subscribed items.
///
/// # Examples
///
/// ```no_run
/// let probe = monitor_probe::Probe::new(monitor_probe::apply_defaults(
///     monitor_probe::ProbeOptions::new().with_account("3f6a9e"),
/// ))
/// .unwrap();
/// probe.start();
/// ```
pub struct Probe {
    options: ProbeOptions,
    endpoint: Url,
    transport: Arc<dyn Transport>,
    facade: Arc<ManagementFacade>,
    helper: Arc<InMemoryStore>,
    suspended: Arc<AtomicBool>,
    client: Mutex<Option<SessionClient>>,
    worker: Mutex<Option<Worker>>,
}

struct Worker {
    shutdown: Shutdown,
    handle: JoinHandle<SessionClient>,
}

impl fmt::Debug for Probe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Probe")
            .field("endpoint", &self.endpoint.as_str())
            .field("facade", &self.facade)
            .field("running", &self.is_running())
            .field("suspended", &self.is_suspended())
            .finish()
    }
}

impl Probe {
    /// Creates a probe from options.
    ///
    /// Fails if the endpoint is missing, unparsable or not http(s), or if
    /// the transport cannot be created. The probe is not started.
    pub fn new(options: ProbeOptions) -> Result<Probe, ConfigError> {
        let raw = options
            .endpoint
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or(ConfigError::MissingEndpoint)?;
        let endpoint = Url::parse(raw).map_err(|source| ConfigError::InvalidEndpoint {
            url: raw.to_owned(),
            source,
        })?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(ConfigError::UnsupportedScheme(endpoint.scheme().to_owned()));
        }

        let transport = match options.transport {
            Some(ref factory) => factory.create_transport(&options, &endpoint)?,
            None => DefaultTransportFactory.create_transport(&options, &endpoint)?,
        };

        let helper = Arc::new(InMemoryStore::new("probe"));
        let mut facade = ManagementFacade::new().with_store(helper.clone());
        for store in &options.stores {
            facade = facade.with_store(store.clone());
        }
        #[cfg(unix)]
        {
            if options.default_stores {
                facade = facade.with_store(Arc::new(crate::management::ProcessStore::new()));
            }
        }

        let facade = Arc::new(facade);
        let client =
            SessionClient::new(&options, endpoint.clone(), transport.clone(), facade.clone());
        Ok(Probe {
            options,
            endpoint,
            transport,
            facade,
            helper,
            suspended: Arc::new(AtomicBool::new(false)),
            client: Mutex::new(Some(client)),
            worker: Mutex::new(None),
        })
    }

    /// The parsed collection endpoint.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// The management facade the probe samples from.
    pub fn facade(&self) -> &ManagementFacade {
        &self.facade
    }

    /// Returns `true` while a worker is alive.
    pub fn is_running(&self) -> bool {
        match *self.worker.lock().unwrap_or_else(PoisonError::into_inner) {
            Some(ref worker) => !worker.handle.is_finished(),
            None => false,
        }
    }

    /// Returns `true` once the collector has put this probe on hold.
    pub fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::SeqCst)
    }

    /// Starts the worker.
    ///
    /// Does nothing if the worker is already running or the probe has been
    /// suspended.
    pub fn start(&self) {
        let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        if self.is_suspended() {
            log::info!("probe is on hold, not starting");
            return;
        }
        if worker.is_some() {
            return;
        }

        let bean = Bean::new()
            .with_null("Name")
            .with_null("Version")
            .with_null("HttpPort")
            .with_null("LastFailure");
        if let Err(err) = self.helper.register(SERVER_BEAN, bean) {
            log::warn!("unable to register {}: {}", SERVER_BEAN, err);
        }

        let client = self
            .client
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .unwrap_or_else(|| {
                log::warn!("probe client was lost, starting a new session");
                SessionClient::new(
                    &self.options,
                    self.endpoint.clone(),
                    self.transport.clone(),
                    self.facade.clone(),
                )
            });
        let shutdown: Shutdown = Arc::new((Mutex::new(false), Condvar::new()));
        let context = Context {
            client,
            shutdown: shutdown.clone(),
            suspended: self.suspended.clone(),
            helper: self.helper.clone(),
            push_interval: self.options.push_interval,
            backoff_interval: self.options.backoff_interval,
            startup_delay: self.options.startup_delay,
        };

        let spawned = thread::Builder::new()
            .name("monitor-probe".into())
            .spawn(move || context.run());
        match spawned {
            Ok(handle) => {
                log::info!("probe started, pushing to {}", self.endpoint);
                *worker = Some(Worker { shutdown, handle });
            }
            Err(err) => {
                log::error!("unable to spawn probe worker: {}", err);
                self.helper.unregister(SERVER_BEAN);
            }
        }
    }

    /// Stops the worker and waits for it to exit.
    ///
    /// A push in flight runs to completion first.
    pub fn stop(&self) {
        let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        let worker = match worker.take() {
            Some(worker) => worker,
            None => return,
        };
        {
            let (lock, cvar) = worker.shutdown.as_ref();
            *lock.lock().unwrap_or_else(PoisonError::into_inner) = true;
            cvar.notify_all();
        }
        match worker.handle.join() {
            Ok(client) => {
                *self.client.lock().unwrap_or_else(PoisonError::into_inner) = Some(client);
            }
            Err(_) => log::error!("probe worker panicked"),
        }
        self.helper.unregister(SERVER_BEAN);
        log::info!("probe stopped");
    }
}

impl Drop for Probe {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Everything the worker thread owns.
struct Context {
    client: SessionClient,
    shutdown: Shutdown,
    suspended: Arc<AtomicBool>,
    helper: Arc<InMemoryStore>,
    push_interval: Duration,
    backoff_interval: Duration,
    startup_delay: Duration,
}

impl Context {
    /// Runs until shut down or put on hold, then hands the client back.
    fn run(mut self) -> SessionClient {
        if self.wait(self.startup_delay) {
            return self.client;
        }

        let mut failures = 0usize;
        let mut published = false;
        loop {
            let client = &mut self.client;
            let outcome = match panic::catch_unwind(AssertUnwindSafe(|| cycle(client))) {
                Ok(outcome) => outcome,
                Err(payload) => {
                    self.client.reset_session();
                    Err(PushError::Protocol(panic_message(&*payload)))
                }
            };

            if !published {
                if let Some(identity) = self.client.identity() {
                    self.publish(&identity.server);
                    published = true;
                }
            }

            let pause = match outcome {
                Ok(()) => {
                    if failures > 0 {
                        log::info!("probe recovered after {} failed cycles", failures);
                    }
                    failures = 0;
                    self.set_last_failure(None);
                    self.push_interval
                }
                Err(PushError::OnHold(reason)) => {
                    log::error!("probe put on hold by the collector: {}", reason);
                    self.suspended.store(true, Ordering::SeqCst);
                    self.set_last_failure(Some(format!("on hold: {}", reason)));
                    return self.client;
                }
                Err(err) => {
                    if failures == 0 {
                        log::error!("probe cycle failed: {}", err);
                    } else {
                        log::warn!("probe cycle failed again: {}", err);
                    }
                    failures += 1;
                    self.set_last_failure(Some(err.to_string()));
                    self.backoff_interval
                }
            };

            if self.wait(pause) {
                return self.client;
            }
        }
    }

    /// Sleeps for `timeout` or until shut down. Returns `true` on shutdown.
    fn wait(&self, timeout: Duration) -> bool {
        let (lock, cvar) = self.shutdown.as_ref();
        let guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = cvar
            .wait_timeout_while(guard, timeout, |stop| !*stop)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }

    fn publish(&self, server: &ServerInfo) {
        self.set(SERVER_BEAN, "Name", Some(Value::from(server.name.as_str())));
        self.set(SERVER_BEAN, "Version", server.version.as_deref().map(Value::from));
        self.set(SERVER_BEAN, "HttpPort", server.http_port.map(Value::from));
    }

    fn set_last_failure(&self, failure: Option<String>) {
        self.set(SERVER_BEAN, "LastFailure", failure.map(Value::from));
    }

    fn set(&self, bean: &str, attribute: &str, value: Option<Value>) {
        if let Err(err) = self.helper.set_value(bean, attribute, value) {
            log::debug!("unable to update {}: {}", bean, err);
        }
    }
}

/// One supervised iteration: push, and push again if the collector changed
/// the subscription.
fn cycle(client: &mut SessionClient) -> Result<(), PushError> {
    if client.push()? {
        client.push()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_bad_endpoints() {
        let err = Probe::new(ProbeOptions::default()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEndpoint));

        let err = Probe::new(ProbeOptions::new().with_endpoint("not a url")).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEndpoint { .. }));

        let err = Probe::new(ProbeOptions::new().with_endpoint("ftp://collector/push")).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedScheme(ref s) if s == "ftp"));
    }
}
