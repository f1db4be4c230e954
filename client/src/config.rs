//! Client-Konfiguration
//!
//! Aufbau wie beim Server: TOML-Datei mit Sektionen, alle Felder mit
//! Standardwerten. Die Laufzeit-Objekte (`FrameSpec`, `CallConfig`,
//! `HandshakeConfig`) werden daraus abgeleitet und explizit weitergereicht.

use std::net::SocketAddr;
use std::time::Duration;

use ipcall_audio::{CodecKind, FrameSpec};
use ipcall_core::Alias;
use serde::{Deserialize, Serialize};

use crate::handshake::HandshakeConfig;
use crate::session::CallConfig;

/// Vollstaendige Client-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub verbindung: VerbindungsEinstellungen,
    pub audio: AudioEinstellungen,
    pub sicherheit: SicherheitsEinstellungen,
    pub fortschritt: FortschrittsEinstellungen,
    pub logging: LoggingEinstellungen,
}

/// Server, eigener Alias und Gegenstelle
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerbindungsEinstellungen {
    /// UDP-Adresse des Relay-Servers
    pub server_adresse: String,
    /// Lokale Bind-Adresse (Port 0 = OS waehlt)
    pub lokale_adresse: String,
    /// Eigener Alias
    pub alias: String,
    /// Alias der Gegenstelle
    pub peer: String,
    /// Timeout fuer register/unregister in Millisekunden
    pub anfrage_timeout_ms: u64,
}

impl Default for VerbindungsEinstellungen {
    fn default() -> Self {
        Self {
            server_adresse: "127.0.0.1:10000".into(),
            lokale_adresse: "0.0.0.0:0".into(),
            alias: "alice".into(),
            peer: "bob".into(),
            anfrage_timeout_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioEinstellungen {
    pub sample_rate: u32,
    /// Frame-Dauer in Millisekunden
    pub frame_dauer_ms: u64,
    /// Anzahl vorgewaermter Frames im Buffer-Pool
    pub pool_warm: usize,
    pub codec: CodecKind,
}

impl Default for AudioEinstellungen {
    fn default() -> Self {
        Self {
            sample_rate: 8000,
            frame_dauer_ms: 60,
            pool_warm: 10_000,
            codec: CodecKind::Deflate,
        }
    }
}

/// End-to-End-Verschluesselung und Handshake-Rahmen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SicherheitsEinstellungen {
    pub e2e: bool,
    pub handshake_versuche: u32,
    pub backoff_ms: u64,
    pub versuch_timeout_ms: u64,
}

impl Default for SicherheitsEinstellungen {
    fn default() -> Self {
        Self {
            e2e: true,
            handshake_versuche: 5,
            backoff_ms: 250,
            versuch_timeout_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FortschrittsEinstellungen {
    /// Intervall der Durchsatz-Meldungen in Sekunden
    pub intervall_s: u64,
}

impl Default for FortschrittsEinstellungen {
    fn default() -> Self {
        Self { intervall_s: 5 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    pub level: String,
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl ClientConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => toml::from_str(&inhalt)
                .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}")),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
            )),
        }
    }

    pub fn server_adresse(&self) -> anyhow::Result<SocketAddr> {
        let text = &self.verbindung.server_adresse;
        text.parse()
            .map_err(|e| anyhow::anyhow!("Ungueltige Server-Adresse '{text}': {e}"))
    }

    pub fn lokale_adresse(&self) -> anyhow::Result<SocketAddr> {
        let text = &self.verbindung.lokale_adresse;
        text.parse()
            .map_err(|e| anyhow::anyhow!("Ungueltige lokale Adresse '{text}': {e}"))
    }

    pub fn alias(&self) -> anyhow::Result<Alias> {
        Ok(Alias::new(self.verbindung.alias.as_str())?)
    }

    pub fn peer(&self) -> anyhow::Result<Alias> {
        Ok(Alias::new(self.verbindung.peer.as_str())?)
    }

    pub fn anfrage_timeout(&self) -> Duration {
        Duration::from_millis(self.verbindung.anfrage_timeout_ms)
    }

    pub fn frame_spec(&self) -> anyhow::Result<FrameSpec> {
        Ok(FrameSpec::new(
            self.audio.sample_rate,
            Duration::from_millis(self.audio.frame_dauer_ms),
        )?)
    }

    pub fn handshake_config(&self) -> HandshakeConfig {
        HandshakeConfig {
            versuche: self.sicherheit.handshake_versuche,
            backoff: Duration::from_millis(self.sicherheit.backoff_ms),
            versuch_timeout: Duration::from_millis(self.sicherheit.versuch_timeout_ms),
        }
    }

    /// Baut die Laufzeit-Konfiguration einer Call-Session
    pub fn call_config(&self) -> anyhow::Result<CallConfig> {
        Ok(CallConfig {
            spec: self.frame_spec()?,
            pool_warm: self.audio.pool_warm,
            codec: self.audio.codec,
            handshake: self.handshake_config(),
            fortschritt_intervall: Duration::from_secs(self.fortschritt.intervall_s),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standardwerte() {
        let cfg = ClientConfig::default();
        let call = cfg.call_config().unwrap();
        assert_eq!(call.spec.samples_pro_frame(), 480);
        assert_eq!(call.pool_warm, 10_000);
        assert_eq!(call.handshake.versuche, 5);
        assert_eq!(call.handshake.backoff, Duration::from_millis(250));
        assert_eq!(call.fortschritt_intervall, Duration::from_secs(5));
        assert!(cfg.sicherheit.e2e);
    }

    #[test]
    fn teilweise_toml() {
        let toml = r#"
            [verbindung]
            alias = "bob"
            peer = "alice"

            [audio]
            codec = "opus"
            frame_dauer_ms = 20

            [sicherheit]
            e2e = false
        "#;
        let cfg: ClientConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.alias().unwrap().as_str(), "bob");
        assert_eq!(cfg.audio.codec, CodecKind::Opus);
        assert_eq!(cfg.frame_spec().unwrap().samples_pro_frame(), 160);
        assert!(!cfg.sicherheit.e2e);
        assert_eq!(cfg.sicherheit.handshake_versuche, 5);
    }

    #[test]
    fn ungueltiger_alias() {
        let mut cfg = ClientConfig::default();
        cfg.verbindung.peer = "".into();
        assert!(cfg.peer().is_err());
    }

    #[test]
    fn fehlende_datei_liefert_standardwerte() {
        let cfg = ClientConfig::laden("/nicht/vorhanden/client.toml").unwrap();
        assert_eq!(cfg.verbindung.server_adresse, "127.0.0.1:10000");
        assert!(cfg.server_adresse().is_ok());
    }
}
