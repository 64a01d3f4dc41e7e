//! Who the probe says it is.

use std::fs;
use std::io::{BufRead, BufReader};
use std::net::{IpAddr, SocketAddr, TcpStream};
use std::path::Path;
use std::time::Duration;

use url::Url;

use crate::error::PushError;
use crate::management::ManagementFacade;
use crate::protocol::{Record, ACCOUNT, APPSERVER, LOCAL_IP, LOWEST_PORT};
use crate::server::{ServerIdentity, ServerInfo};

/// The identity fields sent with every push.
///
/// Established once per process and never changed afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    /// The account key.
    pub account: String,
    /// The address the probe reaches the collector from.
    pub local_ip: IpAddr,
    /// The instance identity: the unique id override or the http port.
    pub lowest_port: Option<String>,
    /// `<name> <version>` of the host server.
    pub appserver: Option<String>,
    /// The facts the identity was derived from.
    pub server: ServerInfo,
}

impl Identity {
    /// Establishes the identity.
    ///
    /// `route` is where connections to the collector go: the endpoint
    /// itself, or the proxy in front of it (see [`route_for`]).
    ///
    /// Fails without caching anything when no account is configured or the
    /// route cannot be reached.
    pub fn establish(
        account: Option<&str>,
        account_file: Option<&Path>,
        unique_id: Option<&str>,
        route: &Url,
        connect_timeout: Duration,
        server: &dyn ServerIdentity,
        facade: &ManagementFacade,
    ) -> Result<Identity, PushError> {
        let account = resolve_account(account, account_file)?;
        let local_ip = local_address(route, connect_timeout)?;
        let server = ServerInfo::resolve(server, facade);
        let lowest_port = unique_id
            .map(str::to_owned)
            .or_else(|| server.http_port.map(|port| port.to_string()));
        let appserver = Some(server.appserver()).filter(|s| !s.is_empty());

        log::info!(
            "probe identity: local address {}, server {}",
            local_ip,
            appserver.as_deref().unwrap_or("unknown")
        );
        Ok(Identity {
            account,
            local_ip,
            lowest_port,
            appserver,
            server,
        })
    }

    /// Writes the identity fields into an outgoing record.
    pub fn apply_to(&self, record: &mut Record) {
        record.insert(ACCOUNT, self.account.clone());
        record.insert(LOCAL_IP, self.local_ip.to_string());
        if let Some(ref port) = self.lowest_port {
            record.insert(LOWEST_PORT, port.clone());
        }
        if let Some(ref appserver) = self.appserver {
            record.insert(APPSERVER, appserver.clone());
        }
    }
}

/// Returns the explicit account, or the first line of the account file.
pub fn resolve_account(
    account: Option<&str>,
    account_file: Option<&Path>,
) -> Result<String, PushError> {
    if let Some(account) = account.map(str::trim).filter(|a| !a.is_empty()) {
        return Ok(account.to_owned());
    }
    let path = account_file
        .ok_or_else(|| PushError::Identity("no account configured".into()))?;
    let file = fs::File::open(path).map_err(|e| {
        PushError::Identity(format!("unable to read {}: {}", path.display(), e))
    })?;
    let mut line = String::new();
    BufReader::new(file)
        .read_line(&mut line)
        .map_err(|e| PushError::Identity(format!("unable to read {}: {}", path.display(), e)))?;
    let account = line.trim();
    if account.is_empty() {
        return Err(PushError::Identity(format!(
            "{} does not contain an account",
            path.display()
        )));
    }
    Ok(account.to_owned())
}

/// Returns where connections to `endpoint` go.
///
/// That is the proxy configured for the endpoint's scheme, or the endpoint
/// itself. Proxies may omit the `http://` prefix. An unparsable proxy is
/// ignored with a warning.
pub fn route_for(endpoint: &Url, http_proxy: Option<&str>, https_proxy: Option<&str>) -> Url {
    let proxy = match endpoint.scheme() {
        "http" => http_proxy,
        "https" => https_proxy,
        _ => None,
    };
    let proxy = match proxy.map(str::trim).filter(|p| !p.is_empty()) {
        Some(proxy) => proxy,
        None => return endpoint.clone(),
    };
    match parse_proxy(proxy) {
        Some(url) => url,
        None => {
            log::warn!("ignoring unparsable proxy '{}'", proxy);
            endpoint.clone()
        }
    }
}

fn parse_proxy(proxy: &str) -> Option<Url> {
    match Url::parse(proxy) {
        Ok(url) if url.has_host() => Some(url),
        _ => Url::parse(&format!("http://{}", proxy))
            .ok()
            .filter(Url::has_host),
    }
}

/// Finds the local address used to reach `route`.
///
/// Opens a short-lived connection and reads the socket's local side.
pub fn local_address(route: &Url, timeout: Duration) -> Result<IpAddr, PushError> {
    let addrs = route
        .socket_addrs(|| None)
        .map_err(|e| PushError::Identity(format!("unable to resolve {}: {}", route, e)))?;
    let mut last_err = None;
    for addr in addrs {
        match connect(addr, timeout) {
            Ok(ip) => return Ok(ip),
            Err(err) => last_err = Some(err),
        }
    }
    Err(PushError::Identity(match last_err {
        Some(err) => format!("unable to connect to {}: {}", route, err),
        None => format!("{} did not resolve to any address", route),
    }))
}

fn connect(addr: SocketAddr, timeout: Duration) -> std::io::Result<IpAddr> {
    let stream = TcpStream::connect_timeout(&addr, timeout)?;
    Ok(stream.local_addr()?.ip())
}
