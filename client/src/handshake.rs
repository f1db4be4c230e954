//! Wiederholungsrahmen fuer den E2E-Handshake
//!
//! Feste Anzahl Versuche mit festem Backoff. Jeder Versuch ist zeitlich
//! begrenzt; was ein Versuch inhaltlich tut, bestimmt der `PeerCrypto`.

use std::time::Duration;

use ipcall_core::Alias;
use tracing::{info, warn};

use crate::e2e::PeerCrypto;
use crate::error::{CallError, CallResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeConfig {
    pub versuche: u32,
    pub backoff: Duration,
    pub versuch_timeout: Duration,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            versuche: 5,
            backoff: Duration::from_millis(250),
            versuch_timeout: Duration::from_secs(1),
        }
    }
}

/// Fuehrt den Key-Exchange mit `peer` durch
///
/// # Fehler
/// - `HandshakeFailed` wenn kein Versuch innerhalb seines Timeouts gelingt
pub async fn handshake_durchfuehren(
    crypto: &dyn PeerCrypto,
    peer: &Alias,
    config: &HandshakeConfig,
) -> CallResult<()> {
    for versuch in 1..=config.versuche {
        match tokio::time::timeout(config.versuch_timeout, crypto.client_key_exchange(peer)).await {
            Ok(Ok(())) => {
                info!(peer = %peer, versuch, "Handshake erfolgreich");
                return Ok(());
            }
            Ok(Err(e)) => warn!(peer = %peer, versuch, fehler = %e, "Handshake-Versuch fehlgeschlagen"),
            Err(_) => warn!(peer = %peer, versuch, "Handshake-Versuch ohne Antwort"),
        }

        if versuch < config.versuche {
            tokio::time::sleep(config.backoff).await;
        }
    }

    Err(CallError::HandshakeFailed {
        peer: peer.to_string(),
        versuche: config.versuche,
    })
}
