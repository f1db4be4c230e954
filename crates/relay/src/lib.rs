//! ipcall-relay – Relay-Server
//!
//! Vermittelt Pakete zwischen Clients anhand selbst gewaehlter Aliase.
//!
//! ## Module
//! - [`registry`] – Bijektive Alias <-> Adresse Registry
//! - [`router`] – Zustandsmaschine fuer register / unregister / proxy
//! - [`udp`] – UDP-Empfangs-Loop
//! - [`error`] – Fehlertypen und Fehlercodes

pub mod error;
pub mod registry;
pub mod router;
pub mod udp;

pub use error::{RelayError, RelayResult};
pub use registry::AliasRegistry;
pub use router::{ForwardDirective, Outcome, RelayRouter, RequestContext};
pub use udp::{RelayServer, RelayServerConfig};
