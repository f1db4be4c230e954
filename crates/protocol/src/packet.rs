//! Relay-Paket (UDP)
//!
//! Jedes Datagramm besteht aus einem kurzen Binaer-Header, den JSON-kodierten
//! Metadaten und den opaken Nutzdaten. Der Server liest nur die Metadaten;
//! die Nutzdaten (komprimiert, ggf. E2E-verschluesselt) reicht er unveraendert weiter.
//!
//! ## Datagramm-Format
//!
//! ```text
//! Offset  Len  Beschreibung
//! ------  ---  -----------
//!  0       1   Version
//!  1       2   Metadaten-Laenge M (big-endian)
//!  3       M   Metadaten (JSON, siehe `PacketMeta`)
//!  3+M     N   Nutzdaten
//! ```

use bytes::Bytes;
use ipcall_core::Alias;
use serde::{Deserialize, Serialize};
use std::io;

/// Aktuelle Protokollversion
pub const PROTOKOLL_VERSION: u8 = 1;

/// Maximale Laenge der serialisierten Metadaten
pub const MAX_META_LAENGE: usize = 2048;

/// Groesstes UDP-Datagramm (IPv4)
pub const MAX_DATAGRAMM_GROESSE: usize = 65_507;

const HEADER_LAENGE: usize = 3;

// ---------------------------------------------------------------------------
// Tags
// ---------------------------------------------------------------------------

/// Server-Operation, die ein Paket ausloest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    Register,
    Unregister,
    Proxy,
}

impl Target {
    /// Alle Operationen – die Dispatch-Tabelle des Routers muss jede abdecken
    pub const ALLE: [Target; 3] = [Target::Register, Target::Unregister, Target::Proxy];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Register => "register",
            Self::Unregister => "unregister",
            Self::Proxy => "proxy",
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Art der weitergeleiteten Nutzdaten
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Content {
    /// Kodierter Audio-Frame
    Audio,
    /// Key-Exchange-Hello fuer E2E-Verschluesselung
    KeyExchange,
}

/// Ergebnis einer Server-Operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Ok,
    Error,
}

/// Fehlercodes, die der Server an den Anfragenden meldet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Register/Unregister ohne Alias
    MissingAlias,
    /// Alias ist bereits vergeben
    AlreadyRegistered,
    /// Alias ist nicht registriert
    NotRegistered,
    /// Absender ist nicht berechtigt
    Unauthorized,
    /// Proxy ohne Ziel-Alias
    MissingTarget,
    /// Ziel-Alias ist nicht registriert
    UnknownAlias,
    /// Paket ohne gueltige Operation
    Malformed,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingAlias => "missing_alias",
            Self::AlreadyRegistered => "already_registered",
            Self::NotRegistered => "not_registered",
            Self::Unauthorized => "unauthorized",
            Self::MissingTarget => "missing_target",
            Self::UnknownAlias => "unknown_alias",
            Self::Malformed => "malformed",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Metadaten
// ---------------------------------------------------------------------------

/// Metadaten eines Relay-Pakets
///
/// Alle Felder sind optional; welche gesetzt sind, haengt von der Richtung ab:
/// - Anfrage an den Server: `target` (+ `alias` bzw. `relay_to`, `content`)
/// - Antwort des Servers: `status` (+ `code`, `message`, `request_id`)
/// - Weitergeleitetes Paket: `relay_from`, `relay_from_addr`, `relay_to`, `content`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Target>,
    /// Alias fuer Register/Unregister
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// Ziel-Alias einer Weiterleitung
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relay_to: Option<String>,
    /// Vom Server aufgeloester Absender-Alias
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relay_from: Option<String>,
    /// Transport-Adresse des Absenders
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relay_from_addr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Content>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Korrelation von Anfrage und Antwort
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<u64>,
}

// ---------------------------------------------------------------------------
// RelayPacket
// ---------------------------------------------------------------------------

/// Vollstaendiges Relay-Datagramm (Metadaten + opake Nutzdaten)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayPacket {
    pub meta: PacketMeta,
    pub payload: Bytes,
}

impl RelayPacket {
    /// Anfrage: Alias unter der Absender-Adresse registrieren
    pub fn register(alias: &Alias, request_id: u64) -> Self {
        Self::anfrage(Target::Register, alias, request_id)
    }

    /// Anfrage: Registrierung des Alias aufheben
    pub fn unregister(alias: &Alias, request_id: u64) -> Self {
        Self::anfrage(Target::Unregister, alias, request_id)
    }

    fn anfrage(target: Target, alias: &Alias, request_id: u64) -> Self {
        Self {
            meta: PacketMeta {
                target: Some(target),
                alias: Some(alias.as_str().to_string()),
                request_id: Some(request_id),
                ..Default::default()
            },
            payload: Bytes::new(),
        }
    }

    /// Anfrage: Nutzdaten an den Besitzer von `relay_to` weiterleiten
    pub fn proxy(relay_to: &Alias, content: Content, payload: impl Into<Bytes>) -> Self {
        Self {
            meta: PacketMeta {
                target: Some(Target::Proxy),
                relay_to: Some(relay_to.as_str().to_string()),
                content: Some(content),
                ..Default::default()
            },
            payload: payload.into(),
        }
    }

    /// Erfolgs-Antwort des Servers
    pub fn antwort_ok(request_id: Option<u64>) -> Self {
        Self {
            meta: PacketMeta {
                status: Some(Status::Ok),
                request_id,
                ..Default::default()
            },
            payload: Bytes::new(),
        }
    }

    /// Fehler-Antwort des Servers
    pub fn antwort_fehler(
        request_id: Option<u64>,
        code: ErrorCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            meta: PacketMeta {
                status: Some(Status::Error),
                code: Some(code),
                message: Some(message.into()),
                request_id,
                ..Default::default()
            },
            payload: Bytes::new(),
        }
    }

    /// Status-Antwort des Servers?
    pub fn ist_antwort(&self) -> bool {
        self.meta.status.is_some()
    }

    /// Vom Server weitergeleitetes Paket?
    pub fn ist_weitergeleitet(&self) -> bool {
        self.meta.relay_from.is_some()
    }

    /// Serialisiert das Paket in ein Datagramm
    ///
    /// # Fehler
    /// - `InvalidInput` wenn die Metadaten `MAX_META_LAENGE` ueberschreiten
    pub fn encode(&self) -> io::Result<Vec<u8>> {
        let meta = serde_json::to_vec(&self.meta)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        if meta.len() > MAX_META_LAENGE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "Metadaten zu lang: {} Bytes (Maximum {})",
                    meta.len(),
                    MAX_META_LAENGE
                ),
            ));
        }

        let mut buf = Vec::with_capacity(HEADER_LAENGE + meta.len() + self.payload.len());
        buf.push(PROTOKOLL_VERSION);
        buf.extend_from_slice(&(meta.len() as u16).to_be_bytes());
        buf.extend_from_slice(&meta);
        buf.extend_from_slice(&self.payload);
        Ok(buf)
    }

    /// Deserialisiert ein Datagramm und validiert Header und Metadaten
    ///
    /// # Fehler
    /// - `InvalidData` bei zu kurzem Datagramm, falscher Version,
    ///   ueberlangen oder nicht parsebaren Metadaten
    pub fn decode(buf: &[u8]) -> io::Result<Self> {
        if buf.len() < HEADER_LAENGE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Datagramm zu kurz: {} Bytes (erwartet mindestens {})",
                    buf.len(),
                    HEADER_LAENGE
                ),
            ));
        }

        if buf[0] != PROTOKOLL_VERSION {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Ungueltige Protokollversion: {} (erwartet {})",
                    buf[0], PROTOKOLL_VERSION
                ),
            ));
        }

        let meta_laenge = u16::from_be_bytes([buf[1], buf[2]]) as usize;
        if meta_laenge > MAX_META_LAENGE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Metadaten zu lang: {meta_laenge} Bytes"),
            ));
        }

        let meta_ende = HEADER_LAENGE + meta_laenge;
        if buf.len() < meta_ende {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Metadaten abgeschnitten: {} von {} Bytes",
                    buf.len() - HEADER_LAENGE,
                    meta_laenge
                ),
            ));
        }

        let meta: PacketMeta = serde_json::from_slice(&buf[HEADER_LAENGE..meta_ende])
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        Ok(Self {
            meta,
            payload: Bytes::copy_from_slice(&buf[meta_ende..]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alias(name: &str) -> Alias {
        Alias::new(name).unwrap()
    }

    #[test]
    fn proxy_paket_round_trip() {
        let paket = RelayPacket::proxy(&alias("bob"), Content::Audio, vec![1u8, 2, 3, 4]);
        let bytes = paket.encode().unwrap();
        let decoded = RelayPacket::decode(&bytes).unwrap();

        assert_eq!(decoded, paket);
        assert_eq!(decoded.meta.target, Some(Target::Proxy));
        assert_eq!(decoded.meta.relay_to.as_deref(), Some("bob"));
        assert_eq!(decoded.payload.as_ref(), &[1, 2, 3, 4]);
    }

    #[test]
    fn metadaten_json_schluessel() {
        let paket = RelayPacket::register(&alias("alice"), 7);
        let bytes = paket.encode().unwrap();
        let meta_laenge = u16::from_be_bytes([bytes[1], bytes[2]]) as usize;
        let json = std::str::from_utf8(&bytes[3..3 + meta_laenge]).unwrap();

        assert!(json.contains("\"target\":\"register\""));
        assert!(json.contains("\"alias\":\"alice\""));
        assert!(json.contains("\"request_id\":7"));
        // Nicht gesetzte Felder werden nicht serialisiert
        assert!(!json.contains("relay_to"));
    }

    #[test]
    fn fehler_antwort_felder() {
        let paket = RelayPacket::antwort_fehler(Some(3), ErrorCode::AlreadyRegistered, "vergeben");
        let decoded = RelayPacket::decode(&paket.encode().unwrap()).unwrap();

        assert!(decoded.ist_antwort());
        assert!(!decoded.ist_weitergeleitet());
        assert_eq!(decoded.meta.status, Some(Status::Error));
        assert_eq!(decoded.meta.code, Some(ErrorCode::AlreadyRegistered));
        assert_eq!(decoded.meta.request_id, Some(3));
    }

    #[test]
    fn decode_zu_kurz() {
        assert!(RelayPacket::decode(&[PROTOKOLL_VERSION, 0]).is_err());
    }

    #[test]
    fn decode_falsche_version() {
        let mut bytes = RelayPacket::antwort_ok(None).encode().unwrap();
        bytes[0] = 99;
        let err = RelayPacket::decode(&bytes).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn decode_abgeschnittene_metadaten() {
        let bytes = RelayPacket::register(&alias("alice"), 1).encode().unwrap();
        assert!(RelayPacket::decode(&bytes[..bytes.len() - 2]).is_err());
    }

    #[test]
    fn decode_kaputtes_json() {
        let bytes = [PROTOKOLL_VERSION, 0, 3, b'{', b'x', b'}'];
        assert!(RelayPacket::decode(&bytes).is_err());
    }

    #[test]
    fn encode_zu_lange_metadaten() {
        let mut paket = RelayPacket::antwort_ok(None);
        paket.meta.message = Some("x".repeat(MAX_META_LAENGE));
        assert!(paket.encode().is_err());
    }

    #[test]
    fn target_alle_vollstaendig() {
        assert_eq!(Target::ALLE.len(), 3);
        assert_eq!(Target::Proxy.to_string(), "proxy");
    }
}
