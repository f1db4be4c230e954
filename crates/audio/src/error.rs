//! Fehlertypen fuer Audio-Frames, Codecs und Geraete

use thiserror::Error;

/// Alle moeglichen Fehler des Audio-Crates
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("Audio-Geraet nicht gefunden: {0}")]
    GeraetNichtGefunden(String),

    #[error("Kein Standard-Eingabegeraet verfuegbar")]
    KeinStandardEingabegeraet,

    #[error("Kein Standard-Ausgabegeraet verfuegbar")]
    KeinStandardAusgabegeraet,

    #[error("Stream-Fehler: {0}")]
    StreamFehler(String),

    #[error("Codec-Fehler: {0}")]
    CodecFehler(String),

    #[error("Falsche Frame-Laenge: erwartet {erwartet} Samples, erhalten {erhalten}")]
    FrameLaenge { erwartet: usize, erhalten: usize },

    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),

    #[error("Geraet geschlossen")]
    Geschlossen,

    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),
}

pub type AudioResult<T> = Result<T, AudioError>;
