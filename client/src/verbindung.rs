//! Verbindung zum Relay-Server
//!
//! Ein einzelner Empfangs-Task liest alle Pakete vom Transport und verteilt
//! sie nach Art:
//!
//! ```text
//! Transport::empfangen()
//!     |
//!     +--> Status-Antwort   --> wartende Anfrage (request_id)
//!     +--> key_exchange     --> E2E-Responder
//!     +--> audio            --> Audio-Queue der aktiven Call-Session
//! ```
//!
//! Ist keine Session angemeldet oder ihre Queue voll, wird Audio verworfen.

use std::collections::HashMap;
use std::sync::Arc;

use ipcall_protocol::{Content, RelayPacket, Status};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::e2e::RelayE2e;
use crate::transport::Transport;

// ---------------------------------------------------------------------------
// Posteingang
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct Posteingang {
    antworten: Mutex<HashMap<u64, oneshot::Sender<RelayPacket>>>,
    audio: Mutex<Option<mpsc::Sender<RelayPacket>>>,
}

impl Posteingang {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Meldet Interesse an der Antwort mit `request_id` an
    pub fn antwort_erwarten(&self, request_id: u64) -> oneshot::Receiver<RelayPacket> {
        let (tx, rx) = oneshot::channel();
        self.antworten.lock().insert(request_id, tx);
        rx
    }

    /// Gibt eine nicht mehr erwartete Antwort frei (z.B. nach Timeout)
    pub fn antwort_verwerfen(&self, request_id: u64) {
        self.antworten.lock().remove(&request_id);
    }

    /// Richtet die Audio-Queue fuer eine Call-Session ein
    ///
    /// Eine vorher angemeldete Queue wird dabei geschlossen.
    pub fn audio_anmelden(&self, kapazitaet: usize) -> mpsc::Receiver<RelayPacket> {
        let (tx, rx) = mpsc::channel(kapazitaet);
        *self.audio.lock() = Some(tx);
        rx
    }

    /// Nimmt keine Audio-Pakete mehr an; die Queue der Session laeuft leer und schliesst
    pub fn audio_abmelden(&self) {
        self.audio.lock().take();
    }

    pub(crate) fn antwort_zustellen(&self, paket: RelayPacket) {
        let wartend = paket
            .meta
            .request_id
            .and_then(|id| self.antworten.lock().remove(&id));

        match wartend {
            Some(tx) => {
                let _ = tx.send(paket);
            }
            None if paket.meta.status == Some(Status::Error) => {
                debug!(
                    code = ?paket.meta.code,
                    message = paket.meta.message.as_deref().unwrap_or(""),
                    "Fehler-Antwort vom Server"
                );
            }
            None => trace!(request_id = ?paket.meta.request_id, "Unerwartete Antwort verworfen"),
        }
    }

    pub(crate) fn audio_zustellen(&self, paket: RelayPacket) {
        let audio = self.audio.lock();
        match audio.as_ref() {
            Some(tx) => {
                if let Err(e) = tx.try_send(paket) {
                    trace!(fehler = %e, "Audio-Paket verworfen");
                }
            }
            None => trace!("Keine aktive Session, Audio-Paket verworfen"),
        }
    }
}

// ---------------------------------------------------------------------------
// Verbindung
// ---------------------------------------------------------------------------

pub struct Verbindung {
    transport: Arc<dyn Transport>,
    posteingang: Arc<Posteingang>,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl Verbindung {
    /// Startet den Empfangs-Task; `e2e` beantwortet eingehende Key-Exchanges
    pub fn starten(transport: Arc<dyn Transport>, e2e: Option<Arc<RelayE2e>>) -> Self {
        let posteingang = Arc::new(Posteingang::neu());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(empfangs_loop(
            Arc::clone(&transport),
            Arc::clone(&posteingang),
            e2e,
            shutdown_rx,
        ));

        Self {
            transport,
            posteingang,
            shutdown_tx,
            task,
        }
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn posteingang(&self) -> &Arc<Posteingang> {
        &self.posteingang
    }

    /// Stoppt den Empfangs-Task und wartet auf sein Ende
    pub async fn beenden(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.task.await {
            warn!(fehler = %e, "Empfangs-Task abgebrochen");
        }
    }
}

async fn empfangs_loop(
    transport: Arc<dyn Transport>,
    posteingang: Arc<Posteingang>,
    e2e: Option<Arc<RelayE2e>>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    debug!("Client-Empfangs-Loop gestartet");

    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => break,

            ergebnis = transport.empfangen() => {
                let paket = match ergebnis {
                    Ok(p) => p,
                    Err(e) => {
                        warn!(fehler = %e, "Empfangsfehler");
                        // Kurze Pause um Busy-Loop bei persistentem Fehler zu vermeiden
                        tokio::time::sleep(std::time::Duration::from_millis(1)).await;
                        continue;
                    }
                };

                if paket.ist_antwort() {
                    posteingang.antwort_zustellen(paket);
                } else if paket.ist_weitergeleitet() {
                    match (paket.meta.content, &e2e) {
                        (Some(Content::KeyExchange), Some(e2e)) => e2e.hello_empfangen(&paket).await,
                        (Some(Content::KeyExchange), None) => {
                            debug!("Key-Exchange ohne E2E verworfen");
                        }
                        _ => posteingang.audio_zustellen(paket),
                    }
                } else {
                    debug!("Paket ohne Status und Absender verworfen");
                }
            }
        }
    }

    debug!("Client-Empfangs-Loop beendet");
}

#[cfg(test)]
mod tests {
    use super::*;
    use ipcall_protocol::ErrorCode;

    #[tokio::test]
    async fn antwort_per_request_id() {
        let eingang = Posteingang::neu();
        let rx = eingang.antwort_erwarten(7);
        eingang.antwort_zustellen(RelayPacket::antwort_ok(Some(8)));
        eingang.antwort_zustellen(RelayPacket::antwort_fehler(
            Some(7),
            ErrorCode::AlreadyRegistered,
            "vergeben",
        ));
        let antwort = rx.await.unwrap();
        assert_eq!(antwort.meta.code, Some(ErrorCode::AlreadyRegistered));
    }

    #[tokio::test]
    async fn audio_nur_mit_angemeldeter_session() {
        let eingang = Posteingang::neu();
        let mut paket = RelayPacket::antwort_ok(None);
        paket.meta.status = None;
        paket.meta.relay_from = Some("bob".into());

        // Ohne Anmeldung: verworfen
        eingang.audio_zustellen(paket.clone());

        let mut rx = eingang.audio_anmelden(4);
        eingang.audio_zustellen(paket.clone());
        assert_eq!(rx.recv().await.unwrap(), paket);

        eingang.audio_abmelden();
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn volle_queue_verwirft() {
        let eingang = Posteingang::neu();
        let mut rx = eingang.audio_anmelden(1);
        let paket = RelayPacket::antwort_ok(None);
        eingang.audio_zustellen(paket.clone());
        eingang.audio_zustellen(paket.clone());
        eingang.audio_abmelden();

        assert!(rx.recv().await.is_some());
        assert!(rx.recv().await.is_none());
    }
}
