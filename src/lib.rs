//! An in-process monitoring probe.
//!
//! The probe lives inside a server process, samples the management
//! attributes a remote collector subscribes to and pushes them to that
//! collector on a fixed interval. The collector drives everything: it hands
//! out a session token, tells the probe which attributes to sample and may
//! put the probe on hold for good.
//!
//! # Quickstart
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use monitor_probe::management::{Bean, InMemoryStore};
//!
//! let store = InMemoryStore::new("app");
//! store
//!     .register("app:type=Queue,name=orders", Bean::new().with_value("Depth", 17))
//!     .unwrap();
//!
//! let _probe = monitor_probe::init(
//!     monitor_probe::ProbeOptions::new()
//!         .with_endpoint("https://collector.example.com/lemongrass/1.0/push")
//!         .with_account("3f6a9e")
//!         .add_store(store),
//! )
//! .unwrap();
//! ```
//!
//! # Logging
//!
//! The probe logs through the [`log`](https://crates.io/crates/log) facade.
//! Failed cycles are reported at error level the first time and at warn
//! level while the failure streak lasts.
//!
//! # Features
//!
//! - `transport`: Enables the default http transport (on by default).
//! - `native-tls`/`rustls`: Selects the TLS backend of the transport.
//! - `test`: Enables the [`test`] module with a scripted transport.
#![warn(missing_docs)]

mod client;
mod constants;
mod defaults;
mod error;
mod identity;
mod init;
pub mod management;
mod options;
mod probe;
pub mod protocol;
mod registry;
mod sampler;
mod server;
#[cfg(feature = "test")]
pub mod test;
mod transport;
pub mod transports;
mod utils;

pub use crate::client::{ClientState, SessionClient};
pub use crate::constants::{ARCH, PLATFORM, USER_AGENT, VERSION};
pub use crate::defaults::apply_defaults;
pub use crate::error::{CodecError, ConfigError, PushError, QueryError};
pub use crate::identity::Identity;
pub use crate::init::{init, ProbeInitGuard};
pub use crate::management::{ManagementFacade, ManagementStore};
pub use crate::options::ProbeOptions;
pub use crate::probe::{Probe, SERVER_BEAN};
pub use crate::registry::{DescriptorError, Item, ItemRegistry};
pub use crate::sampler::{encode_failure, encode_value, sample};
pub use crate::server::{
    detect, ServerFamily, ServerIdentity, ServerInfo, Standalone, StaticIdentity,
};
pub use crate::transport::{Transport, TransportFactory};
