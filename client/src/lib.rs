//! ipcall-client – Bibliotheks-Root
//!
//! - `verbindung`: Empfangs-Task und Verteilung eingehender Pakete
//! - `control`: register / unregister beim Relay-Server
//! - `e2e` / `handshake`: Schluesselaustausch und sein Wiederholungsrahmen
//! - `session`: `CallClient` und `CallSession` mit beiden Audio-Pipelines
//! - `progress`: Durchsatz-Monitor pro Richtung

pub mod config;
pub mod control;
pub mod e2e;
pub mod error;
pub mod handshake;
pub mod progress;
pub mod session;
pub mod transport;
pub mod verbindung;

pub use control::ServerControl;
pub use e2e::{PeerCrypto, RelayE2e};
pub use error::{CallError, CallResult};
pub use handshake::{handshake_durchfuehren, HandshakeConfig};
pub use progress::{ProgressBericht, ProgressMonitor};
pub use session::{CallClient, CallConfig, CallSession, CallStatistik, HandshakeZustand};
pub use transport::{Transport, UdpTransport};
pub use verbindung::{Posteingang, Verbindung};
