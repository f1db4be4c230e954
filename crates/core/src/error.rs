//! Fehlertypen fuer ipcall
//!
//! Gemeinsamer Fehler-Enum fuer Typ-Validierung und Konfiguration.
//! Die Subsysteme (Audio, Crypto, Relay, Client) definieren eigene Fehler.

use thiserror::Error;

/// Globaler Result-Alias fuer ipcall-core
pub type Result<T> = std::result::Result<T, IpcallError>;

/// Fehler beim Aufbau gemeinsamer Typen und Einstellungen
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IpcallError {
    #[error("Ungueltiger Alias: {0}")]
    UngueltigerAlias(String),

    #[error("Ungueltige Adresse: {0}")]
    UngueltigeAdresse(String),

    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),
}

impl IpcallError {
    /// Erstellt einen Konfigurationsfehler aus einer beliebigen Nachricht
    pub fn konfiguration(msg: impl Into<String>) -> Self {
        Self::Konfiguration(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fehler_anzeige() {
        let e = IpcallError::UngueltigerAlias("leer".into());
        assert_eq!(e.to_string(), "Ungueltiger Alias: leer");
    }

    #[test]
    fn konfiguration_hilfsfunktion() {
        let e = IpcallError::konfiguration("frame_ms = 0");
        assert!(e.to_string().contains("frame_ms = 0"));
    }
}
