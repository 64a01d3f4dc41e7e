use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::error::PushError;
use crate::identity::{self, Identity};
use crate::management::ManagementFacade;
use crate::options::ProbeOptions;
use crate::protocol::{ONHOLD, SESSION};
use crate::registry::ItemRegistry;
use crate::sampler;
use crate::server::{self, ServerIdentity};
use crate::transport::Transport;

/// Where a [`SessionClient`] is in its lifecycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientState {
    /// No push has succeeded yet.
    Uninitialized,
    /// The last exchange with the collector went through.
    Active,
    /// The collector suspended the probe. Terminal.
    OnHold(String),
}

/// Performs push/response cycles against the collector.
///
/// The client owns everything that survives between pushes: the lazily
/// established identity, the session token and the subscribed items. It is
/// driven from a single thread and does no locking of its own.
pub struct SessionClient {
    transport: Arc<dyn Transport>,
    facade: Arc<ManagementFacade>,
    endpoint: Url,
    route: Url,
    account: Option<String>,
    account_file: Option<PathBuf>,
    unique_id: Option<String>,
    connect_timeout: Duration,
    server_identity: Option<Arc<dyn ServerIdentity>>,
    identity: Option<Identity>,
    session: Option<String>,
    registry: ItemRegistry,
    state: ClientState,
}

impl fmt::Debug for SessionClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("identity", &self.identity)
            .field("session", &self.session)
            .field("items", &self.registry.len())
            .field("state", &self.state)
            .finish()
    }
}

impl SessionClient {
    /// Creates a client pushing to `endpoint` through `transport`.
    pub fn new(
        options: &ProbeOptions,
        endpoint: Url,
        transport: Arc<dyn Transport>,
        facade: Arc<ManagementFacade>,
    ) -> SessionClient {
        let route = identity::route_for(
            &endpoint,
            options.http_proxy.as_deref(),
            options.https_proxy.as_deref(),
        );
        SessionClient {
            transport,
            facade,
            endpoint,
            route,
            account: options.account.clone(),
            account_file: options.account_file.clone(),
            unique_id: options.unique_id.clone(),
            connect_timeout: options.connect_timeout,
            server_identity: options.server_identity.clone(),
            identity: None,
            session: None,
            registry: ItemRegistry::new(),
            state: ClientState::Uninitialized,
        }
    }

    /// Runs one push/response cycle.
    ///
    /// Returns `Ok(true)` when the collector subscribed new items, in which
    /// case the caller should push again right away so they get sampled.
    ///
    /// A network, protocol or identity failure drops the session token but
    /// keeps identity and items. Once the collector has put the probe on
    /// hold every call fails with [`PushError::OnHold`] without touching the
    /// network.
    pub fn push(&mut self) -> Result<bool, PushError> {
        if let ClientState::OnHold(ref reason) = self.state {
            return Err(PushError::OnHold(reason.clone()));
        }
        let rv = self.exchange();
        if let Err(ref err) = rv {
            if !err.is_on_hold() && self.session.take().is_some() {
                log::debug!("dropped session after failed push: {}", err);
            }
        }
        rv
    }

    fn exchange(&mut self) -> Result<bool, PushError> {
        if self.identity.is_none() {
            self.identity = Some(self.establish_identity()?);
        }

        let mut request = sampler::sample(&mut self.registry, &self.facade);
        if let Some(ref identity) = self.identity {
            identity.apply_to(&mut request);
        }
        if let Some(ref session) = self.session {
            request.insert(SESSION, session.clone());
        }

        log::debug!("pushing {} entries to {}", request.len(), self.endpoint);
        let mut response = self.transport.send_record(&request)?;

        if let Some(reason) = response.remove(ONHOLD) {
            self.state = ClientState::OnHold(reason.clone());
            self.session = None;
            return Err(PushError::OnHold(reason));
        }
        if let Some(session) = response.remove(SESSION) {
            self.session = Some(session);
        }
        let merged = self.registry.merge(response)?;
        if merged > 0 {
            log::debug!("collector subscribed {} items", merged);
        }
        self.state = ClientState::Active;
        Ok(merged > 0)
    }

    fn establish_identity(&self) -> Result<Identity, PushError> {
        let server = match self.server_identity {
            Some(ref identity) => identity.clone(),
            None => server::detect(&self.facade),
        };
        Identity::establish(
            self.account.as_deref(),
            self.account_file.as_deref(),
            self.unique_id.as_deref(),
            &self.route,
            self.connect_timeout,
            server.as_ref(),
            &self.facade,
        )
    }

    /// Drops the session token so the next push starts a new session.
    ///
    /// Identity and subscribed items are kept.
    pub fn reset_session(&mut self) {
        if self.session.take().is_some() {
            log::debug!("session reset");
        }
    }

    /// The current lifecycle state.
    pub fn state(&self) -> &ClientState {
        &self.state
    }

    /// Returns `true` once the collector has suspended the probe.
    pub fn is_on_hold(&self) -> bool {
        matches!(self.state, ClientState::OnHold(_))
    }

    /// The session token the next push carries, if any.
    pub fn session(&self) -> Option<&str> {
        self.session.as_deref()
    }

    /// The identity, once established.
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// The subscribed items.
    pub fn registry(&self) -> &ItemRegistry {
        &self.registry
    }
}
