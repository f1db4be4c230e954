//! Fehlertypen des Relay-Routers
//!
//! Jeder Fehler einer Anfrage wird dem Absender als Fehlercode gemeldet und
//! laesst die Registry unveraendert.

use ipcall_protocol::{ErrorCode, Target};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RelayError {
    #[error("Registrierungs-Alias fehlt")]
    AliasFehlt,

    #[error("Alias {0} ist bereits registriert")]
    BereitsRegistriert(String),

    #[error("Alias {0} ist nicht registriert")]
    NichtRegistriert(String),

    #[error("Nicht berechtigt: {0}")]
    NichtBerechtigt(String),

    #[error("Ziel-Alias fehlt")]
    ZielFehlt,

    #[error("Unbekannter Ziel-Alias {0}")]
    UnbekannterAlias(String),

    #[error("Ungueltiges Paket: {0}")]
    UngueltigesPaket(String),

    #[error("Kein Handler fuer Operation {0}")]
    HandlerFehlt(Target),

    #[error("Handler fuer Operation {0} doppelt registriert")]
    HandlerDoppelt(Target),
}

impl RelayError {
    /// Fehlercode fuer die Antwort an den Absender
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::AliasFehlt => ErrorCode::MissingAlias,
            Self::BereitsRegistriert(_) => ErrorCode::AlreadyRegistered,
            Self::NichtRegistriert(_) => ErrorCode::NotRegistered,
            Self::NichtBerechtigt(_) => ErrorCode::Unauthorized,
            Self::ZielFehlt => ErrorCode::MissingTarget,
            Self::UnbekannterAlias(_) => ErrorCode::UnknownAlias,
            Self::UngueltigesPaket(_) | Self::HandlerFehlt(_) | Self::HandlerDoppelt(_) => {
                ErrorCode::Malformed
            }
        }
    }
}

pub type RelayResult<T> = std::result::Result<T, RelayError>;
