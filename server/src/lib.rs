//! ipcall-server – Bibliotheks-Root
//!
//! Baut Registry, Router und UDP-Relay aus der Konfiguration zusammen und
//! stellt den oeffentlichen Einstiegspunkt fuer Integrationstests bereit.

pub mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use config::ServerConfig;
use ipcall_observability::{observability_server_starten, RelayMetrics};
use ipcall_relay::{AliasRegistry, RelayRouter, RelayServer, RelayServerConfig};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Haelt den Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

/// Laufender Server: UDP-Loop und optionaler Observability-Server
pub struct LaufenderServer {
    udp_adresse: SocketAddr,
    metriken: RelayMetrics,
    shutdown_tx: oneshot::Sender<()>,
    relay_task: JoinHandle<()>,
    observability_task: Option<JoinHandle<()>>,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Bindet alle Sockets und startet die Tasks
    pub async fn binden(self) -> Result<LaufenderServer> {
        let registry = Arc::new(AliasRegistry::mit_kapazitaet(
            self.config.registry.kapazitaet,
        ));
        let metriken = RelayMetrics::neu()?;
        let router = RelayRouter::mit_metriken(registry, metriken.clone())?;

        let mut relay_config = RelayServerConfig::neu(self.config.udp_bind_adresse()?);
        relay_config.max_datagramm = self.config.netzwerk.max_datagramm;

        let relay = RelayServer::binden(relay_config, router).await?;
        let udp_adresse = relay.lokale_adresse()?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let relay_task = tokio::spawn(async move {
            relay.empfangs_loop_starten(shutdown_rx).await;
        });

        let observability_task = if self.config.observability.aktiviert {
            let adresse = self.config.observability_bind_adresse()?;
            let m = metriken.clone();
            Some(tokio::spawn(async move {
                if let Err(e) = observability_server_starten(adresse, m).await {
                    tracing::error!(fehler = %e, "Observability-Server beendet");
                }
            }))
        } else {
            None
        };

        tracing::info!(udp = %udp_adresse, "Relay-Server bereit");

        Ok(LaufenderServer {
            udp_adresse,
            metriken,
            shutdown_tx,
            relay_task,
            observability_task,
        })
    }

    /// Startet alle Subsysteme und laeuft bis zum Shutdown-Signal
    pub async fn starten(self) -> Result<()> {
        let laufend = self.binden().await?;

        tracing::info!("Server laeuft. Warte auf Shutdown-Signal (Ctrl-C)...");
        tokio::signal::ctrl_c().await?;
        tracing::info!("Shutdown-Signal empfangen, Server wird beendet");

        laufend.beenden().await
    }
}

impl LaufenderServer {
    pub fn udp_adresse(&self) -> SocketAddr {
        self.udp_adresse
    }

    pub fn metriken(&self) -> &RelayMetrics {
        &self.metriken
    }

    /// Stoppt die Empfangs-Loop und wartet auf ihr Ende
    pub async fn beenden(self) -> Result<()> {
        let _ = self.shutdown_tx.send(());
        self.relay_task.await?;
        if let Some(task) = self.observability_task {
            task.abort();
        }
        Ok(())
    }
}
