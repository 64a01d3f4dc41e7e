//! Detection of the server the probe is embedded in.
//!
//! Every supported server family registers a well known management bean.
//! Detection probes for these markers in priority order and falls back to a
//! standalone identity describing the platform.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use regex::Regex;

use crate::constants::{ARCH, PLATFORM};
use crate::error::QueryError;
use crate::management::{ManagementFacade, ObjectName};

lazy_static::lazy_static! {
    static ref FULL_VERSION: Regex = Regex::new(r"\d+\.\d+(\.\d+)*").unwrap();
    static ref TRIPLE_VERSION: Regex = Regex::new(r"\d+\.\d+\.\d+").unwrap();
}

/// What the probe reports about its host server.
///
/// Implementations read whatever they need from the management facade
/// each time they are asked; the client asks once per lifetime.
pub trait ServerIdentity: Send + Sync {
    /// The product name, such as `Apache Tomcat`.
    fn name(&self, facade: &ManagementFacade) -> String;

    /// The product version if it can be determined.
    fn version(&self, facade: &ManagementFacade) -> Option<String>;

    /// The lowest port the server accepts http on, if any.
    fn http_port(&self, facade: &ManagementFacade) -> Option<u16>;
}

/// A resolved snapshot of a [`ServerIdentity`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerInfo {
    /// The product name.
    pub name: String,
    /// The product version.
    pub version: Option<String>,
    /// The lowest http port.
    pub http_port: Option<u16>,
}

impl ServerInfo {
    /// Asks `identity` for all of its facts.
    pub fn resolve(identity: &dyn ServerIdentity, facade: &ManagementFacade) -> ServerInfo {
        ServerInfo {
            name: identity.name(facade),
            version: identity.version(facade),
            http_port: identity.http_port(facade),
        }
    }

    /// The `appserver` hint sent to the collector: `<name> <version>`.
    pub fn appserver(&self) -> String {
        match self.version {
            Some(ref version) => format!("{} {}", self.name, version),
            None => self.name.clone(),
        }
    }
}

/// An identity fixed by the embedding application.
#[derive(Clone, Debug)]
pub struct StaticIdentity {
    name: Cow<'static, str>,
    version: Option<Cow<'static, str>>,
    http_port: Option<u16>,
}

impl StaticIdentity {
    /// Creates an identity with only a name.
    pub fn new<N: Into<Cow<'static, str>>>(name: N) -> Self {
        StaticIdentity {
            name: name.into(),
            version: None,
            http_port: None,
        }
    }

    /// Sets the version.
    #[must_use]
    pub fn with_version<V: Into<Cow<'static, str>>>(mut self, version: V) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Sets the http port.
    #[must_use]
    pub fn with_http_port(mut self, port: u16) -> Self {
        self.http_port = Some(port);
        self
    }
}

impl ServerIdentity for StaticIdentity {
    fn name(&self, _facade: &ManagementFacade) -> String {
        self.name.to_string()
    }

    fn version(&self, _facade: &ManagementFacade) -> Option<String> {
        self.version.as_ref().map(|v| v.to_string())
    }

    fn http_port(&self, _facade: &ManagementFacade) -> Option<u16> {
        self.http_port
    }
}

/// The identity used when no known server is found.
#[derive(Clone, Copy, Debug, Default)]
pub struct Standalone;

impl ServerIdentity for Standalone {
    fn name(&self, _facade: &ManagementFacade) -> String {
        "Standalone".into()
    }

    fn version(&self, _facade: &ManagementFacade) -> Option<String> {
        Some(format!("{}-{}", PLATFORM, ARCH))
    }

    fn http_port(&self, _facade: &ManagementFacade) -> Option<u16> {
        None
    }
}

/// The server families the probe knows how to describe.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServerFamily {
    /// JBoss, which embeds Tomcat.
    JBoss,
    /// Glassfish 2.x and 3.x.
    Glassfish,
    /// Jetty 6.
    Jetty,
    /// Resin.
    Resin,
    /// Apache Tomcat.
    Tomcat,
}

const TOMCAT_SERVER: &str = "Catalina:type=Server";
const JBOSS_SERVER: &str = "jboss.system:type=Server";
const GLASSFISH_AMX: &str = "amx:pp=,type=domain-root";
const GLASSFISH_JMX: &str = "com.sun.appserv:j2eeType=J2EEServer,category=runtime,*";
const JETTY_SERVER: &str = "org.mortbay.jetty:type=server,id=0";
const RESIN_SERVER: &str = "resin:type=Resin";

impl ServerFamily {
    /// Families in detection order. Tomcat is last since others embed it.
    pub const PRIORITY: [ServerFamily; 5] = [
        ServerFamily::JBoss,
        ServerFamily::Glassfish,
        ServerFamily::Jetty,
        ServerFamily::Resin,
        ServerFamily::Tomcat,
    ];

    /// Checks whether the family's marker beans are registered.
    pub fn is_running(self, facade: &ManagementFacade) -> bool {
        match self {
            ServerFamily::JBoss => facade.exists(JBOSS_SERVER),
            ServerFamily::Glassfish => {
                facade.exists(GLASSFISH_AMX) || facade.exists(GLASSFISH_JMX)
            }
            ServerFamily::Jetty => facade.exists(JETTY_SERVER),
            ServerFamily::Resin => facade.exists(RESIN_SERVER),
            ServerFamily::Tomcat => facade.exists(TOMCAT_SERVER),
        }
    }
}

impl fmt::Display for ServerFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServerFamily::JBoss => "JBoss",
            ServerFamily::Glassfish => "Glassfish",
            ServerFamily::Jetty => "Jetty",
            ServerFamily::Resin => "Resin",
            ServerFamily::Tomcat => "Apache Tomcat",
        };
        f.write_str(name)
    }
}

impl ServerIdentity for ServerFamily {
    fn name(&self, facade: &ManagementFacade) -> String {
        match self {
            ServerFamily::Tomcat => tomcat_server_info(facade)
                .and_then(|info| info.split('/').next().map(str::to_owned))
                .unwrap_or_else(|| self.to_string()),
            _ => self.to_string(),
        }
    }

    fn version(&self, facade: &ManagementFacade) -> Option<String> {
        match self {
            ServerFamily::JBoss => lenient(facade.query_string(JBOSS_SERVER, "Version")),
            ServerFamily::Glassfish => {
                first_match(facade, GLASSFISH_AMX, "ApplicationServerFullVersion")
                    .or_else(|| first_match(facade, GLASSFISH_JMX, "serverVersion"))
                    .and_then(|raw| extract(&FULL_VERSION, &raw))
            }
            ServerFamily::Jetty => lenient(facade.query_string(JETTY_SERVER, "version")),
            ServerFamily::Resin => lenient(facade.query_string(RESIN_SERVER, "Version"))
                .and_then(|raw| extract(&TRIPLE_VERSION, &raw)),
            ServerFamily::Tomcat => Some(
                tomcat_server_info(facade)
                    .and_then(|info| info.split_once('/').map(|(_, v)| v.to_owned()))
                    .unwrap_or_else(|| "older than 5.5.16".into()),
            ),
        }
    }

    fn http_port(&self, facade: &ManagementFacade) -> Option<u16> {
        match self {
            ServerFamily::JBoss | ServerFamily::Tomcat => {
                let pools = facade.resolve_names("*:type=ThreadPool,*");
                lowest_port(&pools, |name| name_port(name, |v| v.rsplit('-').next()))
            }
            ServerFamily::Glassfish => {
                let selectors = facade.resolve_names("com.sun.appserv:type=Selector,*");
                lowest_port(&selectors, |name| name_port(name, Some))
            }
            ServerFamily::Jetty => facade
                .resolve_names("org.mortbay.jetty.nio:type=selectchannelconnector,*")
                .iter()
                .filter_map(|name| int_attribute(facade, name, "port"))
                .min(),
            ServerFamily::Resin => {
                let mut lowest_http = None;
                let mut lowest_other = None;
                for name in facade.resolve_names("resin:type=Port,*") {
                    let port = match int_attribute(facade, &name, "Port") {
                        Some(port) => port,
                        None => continue,
                    };
                    let protocol = lenient(facade.query_value(&name, "ProtocolName"));
                    let is_http = protocol
                        .and_then(|p| p.as_str().map(|p| p.trim().eq_ignore_ascii_case("http")))
                        .unwrap_or(false);
                    let slot = if is_http {
                        &mut lowest_http
                    } else {
                        &mut lowest_other
                    };
                    *slot = Some(slot.map_or(port, |lowest: u16| lowest.min(port)));
                }
                lowest_http.or(lowest_other)
            }
        }
    }
}

/// Picks the identity of the running server.
pub fn detect(facade: &ManagementFacade) -> Arc<dyn ServerIdentity> {
    for family in ServerFamily::PRIORITY {
        if family.is_running(facade) {
            log::debug!("detected {} server", family);
            return Arc::new(family);
        }
    }
    log::debug!("no known server detected, running standalone");
    Arc::new(Standalone)
}

fn tomcat_server_info(facade: &ManagementFacade) -> Option<String> {
    lenient(facade.query_string(TOMCAT_SERVER, "serverInfo"))
}

fn lenient<T>(result: Result<Option<T>, QueryError>) -> Option<T> {
    match result {
        Ok(value) => value,
        Err(err) => {
            log::debug!("server lookup failed: {}", err);
            None
        }
    }
}

fn first_match(facade: &ManagementFacade, pattern: &str, attribute: &str) -> Option<String> {
    let name = facade.resolve_names(pattern).into_iter().next()?;
    lenient(facade.query_value(&name, attribute)).map(|v| v.to_string())
}

fn extract(pattern: &Regex, raw: &str) -> Option<String> {
    pattern.find(raw).map(|m| m.as_str().to_owned())
}

fn int_attribute(facade: &ManagementFacade, name: &ObjectName, attribute: &str) -> Option<u16> {
    lenient(facade.query_value(name, attribute))
        .and_then(|v| v.as_i64())
        .and_then(|port| u16::try_from(port).ok())
}

/// Reads a port number out of a connector's `name` property.
fn name_port<'a, F>(name: &'a ObjectName, tail: F) -> Option<u16>
where
    F: FnOnce(&'a str) -> Option<&'a str>,
{
    let value = name.property("name")?.trim_matches('"');
    let digits: String = tail(value)?.chars().filter(char::is_ascii_digit).collect();
    digits.parse().ok()
}

/// The lowest port among the http connectors, or among all connectors if
/// none of them speaks http.
fn lowest_port<F>(connectors: &[ObjectName], port: F) -> Option<u16>
where
    F: Fn(&ObjectName) -> Option<u16>,
{
    let is_http = |name: &&ObjectName| name.to_string().contains("http");
    connectors
        .iter()
        .filter(is_http)
        .filter_map(&port)
        .min()
        .or_else(|| connectors.iter().filter_map(&port).min())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::management::{Bean, InMemoryStore};

    fn facade_with(beans: Vec<(&str, Bean)>) -> ManagementFacade {
        let store = InMemoryStore::new("server");
        for (name, bean) in beans {
            store.register(name, bean).unwrap();
        }
        ManagementFacade::new().with_store(Arc::new(store))
    }

    #[test]
    fn test_standalone_fallback() {
        let facade = facade_with(vec![]);
        let info = ServerInfo::resolve(detect(&facade).as_ref(), &facade);
        assert_eq!(info.name, "Standalone");
        assert_eq!(info.version, Some(format!("{}-{}", PLATFORM, ARCH)));
        assert_eq!(info.http_port, None);
    }

    #[test]
    fn test_tomcat() {
        let facade = facade_with(vec![
            (
                "Catalina:type=Server",
                Bean::new().with_value("serverInfo", "Apache Tomcat/9.0.41"),
            ),
            ("Catalina:type=ThreadPool,name=\"http-nio-8443\"", Bean::new()),
            ("Catalina:type=ThreadPool,name=\"http-nio-8080\"", Bean::new()),
            ("Catalina:type=ThreadPool,name=\"ajp-nio-8009\"", Bean::new()),
        ]);
        let info = ServerInfo::resolve(detect(&facade).as_ref(), &facade);
        assert_eq!(info.name, "Apache Tomcat");
        assert_eq!(info.version.as_deref(), Some("9.0.41"));
        assert_eq!(info.http_port, Some(8080));
        assert_eq!(info.appserver(), "Apache Tomcat 9.0.41");
    }

    #[test]
    fn test_old_tomcat_without_server_info() {
        let facade = facade_with(vec![
            ("Catalina:type=Server", Bean::new()),
            ("Catalina:type=ThreadPool,name=jk-8009", Bean::new()),
        ]);
        let info = ServerInfo::resolve(&ServerFamily::Tomcat, &facade);
        assert_eq!(info.name, "Apache Tomcat");
        assert_eq!(info.version.as_deref(), Some("older than 5.5.16"));
        assert_eq!(info.http_port, Some(8009));
    }

    #[test]
    fn test_jboss_wins_over_embedded_tomcat() {
        let facade = facade_with(vec![
            ("Catalina:type=Server", Bean::new()),
            (
                "jboss.system:type=Server",
                Bean::new().with_value("Version", "5.1.0.GA"),
            ),
        ]);
        let identity = detect(&facade);
        assert_eq!(identity.name(&facade), "JBoss");
        assert_eq!(identity.version(&facade).as_deref(), Some("5.1.0.GA"));
    }

    #[test]
    fn test_glassfish_version_and_port() {
        let facade = facade_with(vec![
            (
                "amx:pp=,type=domain-root",
                Bean::new().with_value("ApplicationServerFullVersion", "GlassFish v3.0.1 (22)"),
            ),
            ("com.sun.appserv:type=Selector,name=http4848", Bean::new()),
            ("com.sun.appserv:type=Selector,name=http8181", Bean::new()),
        ]);
        let info = ServerInfo::resolve(detect(&facade).as_ref(), &facade);
        assert_eq!(info.name, "Glassfish");
        assert_eq!(info.version.as_deref(), Some("3.0.1"));
        assert_eq!(info.http_port, Some(4848));
    }

    #[test]
    fn test_jetty_lowest_connector() {
        let facade = facade_with(vec![
            (
                "org.mortbay.jetty:type=server,id=0",
                Bean::new().with_value("version", "6.1.26"),
            ),
            (
                "org.mortbay.jetty.nio:type=selectchannelconnector,id=0",
                Bean::new().with_value("port", 9090),
            ),
            (
                "org.mortbay.jetty.nio:type=selectchannelconnector,id=1",
                Bean::new().with_value("port", 8080),
            ),
        ]);
        let info = ServerInfo::resolve(detect(&facade).as_ref(), &facade);
        assert_eq!(info.name, "Jetty");
        assert_eq!(info.version.as_deref(), Some("6.1.26"));
        assert_eq!(info.http_port, Some(8080));
    }

    #[test]
    fn test_resin_prefers_http_ports() {
        let facade = facade_with(vec![
            (
                "resin:type=Resin",
                Bean::new().with_value("Version", "Resin-3.1.9 (built Mon, 13 Apr 2009)"),
            ),
            (
                "resin:type=Port,name=a",
                Bean::new()
                    .with_value("Port", 6800)
                    .with_value("ProtocolName", "hmux"),
            ),
            (
                "resin:type=Port,name=b",
                Bean::new()
                    .with_value("Port", 8080)
                    .with_value("ProtocolName", " HTTP "),
            ),
        ]);
        let info = ServerInfo::resolve(detect(&facade).as_ref(), &facade);
        assert_eq!(info.name, "Resin");
        assert_eq!(info.version.as_deref(), Some("3.1.9"));
        assert_eq!(info.http_port, Some(8080));
    }

    #[test]
    fn test_static_identity() {
        let facade = facade_with(vec![]);
        let identity = StaticIdentity::new("Custom")
            .with_version("1.2")
            .with_http_port(8000);
        let info = ServerInfo::resolve(&identity, &facade);
        assert_eq!(info.appserver(), "Custom 1.2");
        assert_eq!(info.http_port, Some(8000));
    }
}
