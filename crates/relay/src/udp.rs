//! UDP Relay Server – Empfangs-Loop
//!
//! Bindet einen UDP-Socket, empfaengt Relay-Pakete, dekodiert sie und
//! verarbeitet sie ueber den `RelayRouter`.
//!
//! ## Architektur
//!
//! ```text
//! UDP Socket (recv_from)
//!     |
//!     v
//! RelayPacket::decode()          <- Validierung
//!     |
//!     v
//! RelayRouter::handle()          <- register / unregister / proxy
//!     |
//!     +--> Antwort        --> send_to(absender)
//!     +--> Weiterleitung  --> send_to(ziel)
//! ```
//!
//! Der Empfangspuffer wird wiederverwendet. Sendefehler werden protokolliert
//! und uebersprungen.

use crate::router::{Outcome, RelayRouter, RequestContext};
use ipcall_protocol::{RelayPacket, MAX_DATAGRAMM_GROESSE};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;

// ---------------------------------------------------------------------------
// RelayServer-Konfiguration
// ---------------------------------------------------------------------------

/// Konfiguration fuer den UDP Relay Server
#[derive(Debug, Clone)]
pub struct RelayServerConfig {
    /// Bind-Adresse (z.B. "0.0.0.0:10000")
    pub bind_addr: SocketAddr,
    /// Groesse des Empfangspuffers (groesstes annehmbares Datagramm)
    pub max_datagramm: usize,
}

impl RelayServerConfig {
    /// Erstellt eine Konfiguration mit Standard-Werten
    pub fn neu(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            max_datagramm: MAX_DATAGRAMM_GROESSE,
        }
    }
}

// ---------------------------------------------------------------------------
// RelayServer
// ---------------------------------------------------------------------------

/// UDP Relay Server
pub struct RelayServer {
    config: RelayServerConfig,
    socket: Arc<UdpSocket>,
    router: RelayRouter,
}

impl RelayServer {
    /// Bindet den UDP-Socket und erstellt einen neuen RelayServer
    pub async fn binden(config: RelayServerConfig, router: RelayRouter) -> std::io::Result<Self> {
        let socket = UdpSocket::bind(config.bind_addr).await?;
        tracing::info!(addr = %socket.local_addr()?, "UDP Relay Server gebunden");

        Ok(Self {
            config,
            socket: Arc::new(socket),
            router,
        })
    }

    /// Gibt die lokale Bind-Adresse zurueck
    pub fn lokale_adresse(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn router(&self) -> &RelayRouter {
        &self.router
    }

    /// Startet die Empfangs-Loop (laeuft bis `shutdown_rx` ein Signal sendet)
    pub async fn empfangs_loop_starten(&self, mut shutdown_rx: tokio::sync::oneshot::Receiver<()>) {
        let mut buf = vec![0u8; self.config.max_datagramm];

        tracing::info!("Relay-Empfangs-Loop gestartet");

        loop {
            tokio::select! {
                // Eingehendes UDP-Paket
                result = self.socket.recv_from(&mut buf) => {
                    match result {
                        Ok((len, absender_addr)) => {
                            self.paket_verarbeiten(&buf[..len], absender_addr).await;
                        }
                        Err(e) => {
                            tracing::error!(fehler = %e, "UDP-Empfangsfehler");
                            // Kurze Pause um Busy-Loop bei persistentem Fehler zu vermeiden
                            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
                        }
                    }
                }

                // Shutdown-Signal
                _ = &mut shutdown_rx => {
                    tracing::info!("Relay-Server: Shutdown-Signal empfangen");
                    break;
                }
            }
        }

        tracing::info!("Relay-Empfangs-Loop beendet");
    }

    // -----------------------------------------------------------------------
    // Internes Paket-Processing
    // -----------------------------------------------------------------------

    async fn paket_verarbeiten(&self, daten: &[u8], absender_addr: SocketAddr) {
        let paket = match RelayPacket::decode(daten) {
            Ok(p) => p,
            Err(e) => {
                tracing::debug!(
                    fehler = %e,
                    absender = %absender_addr,
                    "Ungueltiges Relay-Paket"
                );
                return;
            }
        };

        let ctx = RequestContext::neu(absender_addr);
        match self.router.handle(&ctx, &paket) {
            Outcome::Antwort(antwort) => self.senden(&antwort, absender_addr).await,
            Outcome::Weiterleiten(directive) => {
                let ziel = match directive.ziel.socket_addr() {
                    Ok(ziel) => ziel,
                    Err(e) => {
                        tracing::warn!(fehler = %e, "Zieladresse nicht zustellbar");
                        return;
                    }
                };
                self.senden(&directive.paket, ziel).await;
            }
        }
    }

    async fn senden(&self, paket: &RelayPacket, ziel: SocketAddr) {
        let bytes = match paket.encode() {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(fehler = %e, ziel = %ziel, "Paket nicht kodierbar");
                return;
            }
        };
        match self.socket.send_to(&bytes, ziel).await {
            Ok(_) => {
                tracing::trace!(bytes = bytes.len(), ziel = %ziel, "UDP-Paket gesendet");
            }
            Err(e) => {
                tracing::warn!(fehler = %e, ziel = %ziel, "UDP-Sendefehler");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
