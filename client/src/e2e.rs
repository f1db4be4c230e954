//! End-to-End-Verschluesselung zwischen zwei Clients
//!
//! Der Schluesselaustausch laeuft ueber den Relay-Server: ein `KexHello` wird
//! per `proxy` mit `content = key_exchange` an den Peer-Alias geschickt. Wer
//! ein Hello ohne gesetztes `kennt_dich` empfaengt, leitet den Schluessel ab
//! und antwortet mit dem eigenen Hello. Die Antwort traegt `kennt_dich`, damit
//! das Pingpong nach einer Runde endet.

use std::sync::Arc;

use async_trait::async_trait;
use ipcall_core::Alias;
use ipcall_crypto::{Identity, KexHello, PeerKeyStore};
use ipcall_protocol::{Content, RelayPacket};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::{CallError, CallResult};
use crate::transport::Transport;

/// Krypto-Collaborator der Call-Session
#[async_trait]
pub trait PeerCrypto: Send + Sync {
    /// Ein Versuch des Schluesselaustauschs; kehrt zurueck sobald ein Schluessel fuer `peer` vorliegt
    async fn client_key_exchange(&self, peer: &Alias) -> CallResult<()>;

    fn encrypt_for_peer(&self, peer: &Alias, daten: &[u8]) -> CallResult<Vec<u8>>;

    fn decrypt_from_peer(&self, peer: &Alias, daten: &[u8]) -> CallResult<Vec<u8>>;
}

// ---------------------------------------------------------------------------
// RelayE2e
// ---------------------------------------------------------------------------

pub struct RelayE2e {
    identity: Identity,
    schluessel: PeerKeyStore,
    transport: Arc<dyn Transport>,
    /// Zaehlt installierte Schluessel; Wartende pruefen danach den Store
    installiert_tx: watch::Sender<u64>,
}

impl RelayE2e {
    pub fn neu(identity: Identity, transport: Arc<dyn Transport>) -> Self {
        let (installiert_tx, _) = watch::channel(0);
        Self {
            identity,
            schluessel: PeerKeyStore::new(),
            transport,
            installiert_tx,
        }
    }

    pub fn hat_schluessel(&self, peer: &Alias) -> bool {
        self.schluessel.hat(peer.as_str())
    }

    async fn hello_senden(&self, peer: &Alias, kennt_dich: bool) -> CallResult<()> {
        let hello = KexHello {
            public_key: *self.identity.public_key(),
            kennt_dich,
        };
        let paket = RelayPacket::proxy(peer, Content::KeyExchange, hello.encode().to_vec());
        self.transport.senden(&paket).await
    }

    /// Verarbeitet ein weitergeleitetes Key-Exchange-Paket
    ///
    /// Fehler werden protokolliert; ein kaputtes Hello beendet nichts.
    pub async fn hello_empfangen(&self, paket: &RelayPacket) {
        let Some(peer) = paket
            .meta
            .relay_from
            .as_deref()
            .and_then(|p| Alias::new(p).ok())
        else {
            debug!("Key-Exchange ohne gueltigen Absender verworfen");
            return;
        };

        let hello = match KexHello::decode(&paket.payload) {
            Ok(h) => h,
            Err(e) => {
                debug!(peer = %peer, fehler = %e, "Ungueltiges Hello verworfen");
                return;
            }
        };

        match self.identity.session_key_ableiten(&hello.public_key) {
            Ok(key) => {
                self.schluessel.installieren(peer.as_str(), key);
                self.installiert_tx.send_modify(|n| *n += 1);
                info!(peer = %peer, "E2E-Schluessel mit Peer vereinbart");
            }
            Err(e) => {
                warn!(peer = %peer, fehler = %e, "Schluesselableitung fehlgeschlagen");
                return;
            }
        }

        if !hello.kennt_dich {
            if let Err(e) = self.hello_senden(&peer, true).await {
                warn!(peer = %peer, fehler = %e, "Hello-Antwort nicht gesendet");
            }
        }
    }
}

#[async_trait]
impl PeerCrypto for RelayE2e {
    async fn client_key_exchange(&self, peer: &Alias) -> CallResult<()> {
        // Ein alter Schluessel kann von einer frueheren Identitaet des Peers stammen
        self.schluessel.entfernen(peer.as_str());

        let mut installiert_rx = self.installiert_tx.subscribe();
        self.hello_senden(peer, false).await?;
        debug!(peer = %peer, "Hello gesendet, warte auf Antwort");

        while !self.schluessel.hat(peer.as_str()) {
            if installiert_rx.changed().await.is_err() {
                return Err(CallError::Geschlossen);
            }
        }
        Ok(())
    }

    fn encrypt_for_peer(&self, peer: &Alias, daten: &[u8]) -> CallResult<Vec<u8>> {
        Ok(self.schluessel.encrypt_for(peer.as_str(), daten)?)
    }

    fn decrypt_from_peer(&self, peer: &Alias, daten: &[u8]) -> CallResult<Vec<u8>> {
        Ok(self.schluessel.decrypt_from(peer.as_str(), daten)?)
    }
}
