//! Sitzungsschluessel pro Peer
//!
//! Gemeinsam genutzt vom Key-Exchange-Responder (schreibt) und den
//! Audio-Pipelines (lesen bei jedem Paket).

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::debug;

use crate::cipher::{entschluesseln, verschluesseln};
use crate::error::{CryptoError, CryptoResult};
use crate::types::SecretBytes;

#[derive(Debug, Default)]
pub struct PeerKeyStore {
    keys: RwLock<HashMap<String, SecretBytes>>,
}

impl PeerKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installiert (oder ersetzt) den Sitzungsschluessel fuer `peer`
    pub fn installieren(&self, peer: &str, key: SecretBytes) {
        let ersetzt = self.keys.write().insert(peer.to_string(), key).is_some();
        debug!(peer, ersetzt, "Sitzungsschluessel installiert");
    }

    pub fn hat(&self, peer: &str) -> bool {
        self.keys.read().contains_key(peer)
    }

    pub fn entfernen(&self, peer: &str) {
        self.keys.write().remove(peer);
    }

    pub fn encrypt_for(&self, peer: &str, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
        let keys = self.keys.read();
        let key = keys
            .get(peer)
            .ok_or_else(|| CryptoError::KeinSchluessel(peer.to_string()))?;
        verschluesseln(key.as_bytes(), plaintext)
    }

    pub fn decrypt_from(&self, peer: &str, daten: &[u8]) -> CryptoResult<Vec<u8>> {
        let keys = self.keys.read();
        let key = keys
            .get(peer)
            .ok_or_else(|| CryptoError::KeinSchluessel(peer.to_string()))?;
        entschluesseln(key.as_bytes(), daten)
    }
}
