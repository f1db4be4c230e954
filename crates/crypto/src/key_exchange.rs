//! X25519 Diffie-Hellman zwischen zwei Call-Teilnehmern
//!
//! Jeder Client besitzt eine langlebige X25519-Identitaet. Aus dem DH-Output
//! wird per HKDF-SHA256 ein 32-Byte Sitzungsschluessel abgeleitet. Als Salt
//! dienen beide oeffentlichen Schluessel in sortierter Reihenfolge, sodass
//! beide Seiten unabhaengig von ihrer Rolle denselben Schluessel erhalten.

use hkdf::Hkdf;
use rand::rngs::OsRng;
use sha2::Sha256;
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};

use crate::error::{CryptoError, CryptoResult};
use crate::types::SecretBytes;

/// Laenge eines X25519 Public Keys
pub const PUBLIC_KEY_LAENGE: usize = 32;

/// Laenge des abgeleiteten Sitzungsschluessels
pub const SESSION_KEY_LAENGE: usize = 32;

const HKDF_INFO: &[u8] = b"ipcall-session-key-v1";

/// Langlebige X25519-Identitaet eines Clients
pub struct Identity {
    secret: StaticSecret,
    public_key: [u8; PUBLIC_KEY_LAENGE],
}

impl Identity {
    /// Erzeugt eine neue Identitaet aus dem OS-Zufallsgenerator
    pub fn generieren() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public_key = X25519PublicKey::from(&secret).to_bytes();
        Self { secret, public_key }
    }

    pub fn public_key(&self) -> &[u8; PUBLIC_KEY_LAENGE] {
        &self.public_key
    }

    /// Leitet den gemeinsamen Sitzungsschluessel mit einem Peer ab
    pub fn session_key_ableiten(
        &self,
        peer_public_key: &[u8; PUBLIC_KEY_LAENGE],
    ) -> CryptoResult<SecretBytes> {
        let dh_output = self
            .secret
            .diffie_hellman(&X25519PublicKey::from(*peer_public_key));

        if !dh_output.was_contributory() {
            return Err(CryptoError::KeyExchange(
                "Peer-Schluessel liefert kein gueltiges Shared Secret".to_string(),
            ));
        }

        // Salt = kleinerer Public Key || groesserer Public Key
        let (a, b) = if self.public_key <= *peer_public_key {
            (&self.public_key, peer_public_key)
        } else {
            (peer_public_key, &self.public_key)
        };
        let mut salt = [0u8; 2 * PUBLIC_KEY_LAENGE];
        salt[..PUBLIC_KEY_LAENGE].copy_from_slice(a);
        salt[PUBLIC_KEY_LAENGE..].copy_from_slice(b);

        hkdf_derive(dh_output.as_bytes(), &salt, HKDF_INFO, SESSION_KEY_LAENGE)
            .map(SecretBytes::new)
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

/// HKDF-basierte Key Derivation (allgemein verwendbar)
pub fn hkdf_derive(ikm: &[u8], salt: &[u8], info: &[u8], len: usize) -> CryptoResult<Vec<u8>> {
    let hk = Hkdf::<Sha256>::new(Some(salt), ikm);
    let mut okm = vec![0u8; len];
    hk.expand(info, &mut okm)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    Ok(okm)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
