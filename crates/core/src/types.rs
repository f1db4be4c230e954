//! Identifikationstypen fuer ipcall
//!
//! `Alias` und `Address` verwenden das Newtype-Pattern, damit die beiden
//! Seiten der Alias-Registry zur Compilezeit nicht verwechselt werden.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

use crate::error::{IpcallError, Result};

/// Maximale Alias-Laenge in Bytes
pub const MAX_ALIAS_LAENGE: usize = 64;

/// Vom Benutzer gewaehlter Name, unter dem er Relay-Verkehr empfaengt
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Alias(String);

impl Alias {
    /// Validiert und erstellt einen Alias
    ///
    /// Erlaubt sind nicht-leere Namen bis `MAX_ALIAS_LAENGE` Bytes ohne
    /// Steuer- oder Leerzeichen.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(IpcallError::UngueltigerAlias("Alias ist leer".into()));
        }
        if name.len() > MAX_ALIAS_LAENGE {
            return Err(IpcallError::UngueltigerAlias(format!(
                "Alias zu lang: {} Bytes (Maximum {})",
                name.len(),
                MAX_ALIAS_LAENGE
            )));
        }
        if name.chars().any(|c| c.is_control() || c.is_whitespace()) {
            return Err(IpcallError::UngueltigerAlias(format!(
                "Alias enthaelt Steuer- oder Leerzeichen: {name:?}"
            )));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Alias {
    type Error = IpcallError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Alias> for String {
    fn from(alias: Alias) -> Self {
        alias.0
    }
}

// Lookup in HashMaps per &str; Hash/Eq sind identisch zu String
impl std::borrow::Borrow<str> for Alias {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for Alias {
    type Err = IpcallError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl std::fmt::Display for Alias {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaker Transport-Endpunkt (z.B. "127.0.0.1:4000")
///
/// Die Registry vergleicht Adressen nur auf Gleichheit; die Struktur des
/// Strings ist Sache der Transportschicht.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn new(endpunkt: impl Into<String>) -> Self {
        Self(endpunkt.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Interpretiert die Adresse als UDP-Endpunkt
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.0
            .parse()
            .map_err(|e| IpcallError::UngueltigeAdresse(format!("{}: {e}", self.0)))
    }
}

impl From<SocketAddr> for Address {
    fn from(addr: SocketAddr) -> Self {
        Self(addr.to_string())
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
