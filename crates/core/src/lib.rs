//! ipcall-core – Gemeinsame Typen und Fehlertypen
//!
//! Dieses Crate stellt die fundamentalen Bausteine bereit, die von Server,
//! Client und Relay gemeinsam genutzt werden.

pub mod error;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use error::{IpcallError, Result};
pub use types::{Address, Alias, MAX_ALIAS_LAENGE};
