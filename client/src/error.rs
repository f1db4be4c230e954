//! Fehlertypen des Clients

use ipcall_audio::AudioError;
use ipcall_crypto::CryptoError;
use ipcall_protocol::ErrorCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CallError {
    /// Key-Exchange nach allen Versuchen nicht zustande gekommen
    #[error("Handshake mit {peer} nach {versuche} Versuchen fehlgeschlagen")]
    HandshakeFailed { peer: String, versuche: u32 },

    /// Der Server hat eine Registrierungs-Anfrage abgelehnt
    #[error("Registry-Fehler ({code}): {message}")]
    Registry { code: ErrorCode, message: String },

    #[error("Zeitueberschreitung: {0}")]
    Timeout(String),

    #[error("Transportfehler: {0}")]
    Transport(#[from] std::io::Error),

    #[error("Audiofehler: {0}")]
    Audio(#[from] AudioError),

    #[error("Kryptofehler: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Ungueltige Antwort: {0}")]
    Protokoll(String),

    #[error("Verbindung geschlossen")]
    Geschlossen,
}

pub type CallResult<T> = Result<T, CallError>;
