//! Registrierung beim Relay-Server
//!
//! Jede Anfrage traegt eine fortlaufende `request_id`; die Antwort wird ueber
//! den Posteingang zugeordnet. Bleibt sie aus, meldet der Aufrufer einen
//! Timeout (Registry nicht erreichbar).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ipcall_core::Alias;
use ipcall_protocol::{ErrorCode, RelayPacket, Status};
use tracing::info;

use crate::error::{CallError, CallResult};
use crate::transport::Transport;
use crate::verbindung::Posteingang;

pub struct ServerControl {
    transport: Arc<dyn Transport>,
    posteingang: Arc<Posteingang>,
    naechste_id: AtomicU64,
    timeout: Duration,
}

impl ServerControl {
    pub fn neu(
        transport: Arc<dyn Transport>,
        posteingang: Arc<Posteingang>,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            posteingang,
            naechste_id: AtomicU64::new(1),
            timeout,
        }
    }

    /// Registriert `alias` unter der eigenen Transport-Adresse
    pub async fn register(&self, alias: &Alias) -> CallResult<()> {
        let id = self.naechste_id.fetch_add(1, Ordering::Relaxed);
        self.anfragen(RelayPacket::register(alias, id), id).await?;
        info!(alias = %alias, "Alias beim Server registriert");
        Ok(())
    }

    pub async fn unregister(&self, alias: &Alias) -> CallResult<()> {
        let id = self.naechste_id.fetch_add(1, Ordering::Relaxed);
        self.anfragen(RelayPacket::unregister(alias, id), id).await?;
        info!(alias = %alias, "Alias beim Server abgemeldet");
        Ok(())
    }

    async fn anfragen(&self, anfrage: RelayPacket, id: u64) -> CallResult<()> {
        let antwort_rx = self.posteingang.antwort_erwarten(id);

        if let Err(e) = self.transport.senden(&anfrage).await {
            self.posteingang.antwort_verwerfen(id);
            return Err(e);
        }

        let antwort = match tokio::time::timeout(self.timeout, antwort_rx).await {
            Ok(Ok(antwort)) => antwort,
            Ok(Err(_)) => return Err(CallError::Geschlossen),
            Err(_) => {
                self.posteingang.antwort_verwerfen(id);
                return Err(CallError::Timeout(format!(
                    "keine Antwort des Servers auf Anfrage {id}"
                )));
            }
        };

        match antwort.meta.status {
            Some(Status::Ok) => Ok(()),
            Some(Status::Error) => Err(CallError::Registry {
                code: antwort.meta.code.unwrap_or(ErrorCode::Malformed),
                message: antwort.meta.message.unwrap_or_default(),
            }),
            None => Err(CallError::Protokoll("Antwort ohne Status".to_string())),
        }
    }
}
