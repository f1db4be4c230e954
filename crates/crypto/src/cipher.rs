//! Payload-Verschluesselung (AES-256-GCM)
//!
//! ## Format
//! ```text
//! [nonce(12)] [ciphertext + auth_tag(16)]
//! ```
//!
//! Die Nonce ist vollstaendig zufaellig.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce as AesNonce,
};
use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::{CryptoError, CryptoResult};

pub const NONCE_LAENGE: usize = 12;
pub const TAG_LAENGE: usize = 16;

fn cipher(key_bytes: &[u8]) -> CryptoResult<Aes256Gcm> {
    if key_bytes.len() != 32 {
        return Err(CryptoError::UngueltigeSchluesselLaenge {
            erwartet: 32,
            erhalten: key_bytes.len(),
        });
    }
    Ok(Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key_bytes)))
}

/// Verschluesselt `plaintext` mit einem 32-Byte Schluessel
pub fn verschluesseln(key_bytes: &[u8], plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
    let cipher = cipher(key_bytes)?;

    let mut nonce = [0u8; NONCE_LAENGE];
    OsRng.fill_bytes(&mut nonce);

    let ciphertext = cipher
        .encrypt(AesNonce::from_slice(&nonce), plaintext)
        .map_err(|e| CryptoError::Verschluesselung(e.to_string()))?;

    let mut out = Vec::with_capacity(NONCE_LAENGE + ciphertext.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Entschluesselt `[nonce][ciphertext+tag]` und prueft den Auth-Tag
pub fn entschluesseln(key_bytes: &[u8], daten: &[u8]) -> CryptoResult<Vec<u8>> {
    if daten.len() < NONCE_LAENGE + TAG_LAENGE {
        return Err(CryptoError::UngueltigeDaten(format!(
            "Payload zu kurz: {} Bytes",
            daten.len()
        )));
    }
    let cipher = cipher(key_bytes)?;
    let (nonce, ciphertext) = daten.split_at(NONCE_LAENGE);

    cipher
        .decrypt(AesNonce::from_slice(nonce), ciphertext)
        .map_err(|e| CryptoError::Entschluesselung(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: [u8; 32] = [7u8; 32];

    #[test]
    fn verschluesseln_entschluesseln() {
        let klartext = b"komprimierter Audio-Frame";
        let daten = verschluesseln(&KEY, klartext).unwrap();
        assert_eq!(daten.len(), NONCE_LAENGE + klartext.len() + TAG_LAENGE);
        assert_eq!(entschluesseln(&KEY, &daten).unwrap(), klartext);
    }

    #[test]
    fn manipulation_wird_erkannt() {
        let mut daten = verschluesseln(&KEY, b"hallo").unwrap();
        let letzte = daten.len() - 1;
        daten[letzte] ^= 0x01;
        assert!(matches!(
            entschluesseln(&KEY, &daten),
            Err(CryptoError::Entschluesselung(_))
        ));
    }

    #[test]
    fn falscher_schluessel() {
        let daten = verschluesseln(&KEY, b"hallo").unwrap();
        assert!(entschluesseln(&[8u8; 32], &daten).is_err());
    }

    #[test]
    fn zu_kurze_daten() {
        assert!(matches!(
            entschluesseln(&KEY, &[0u8; 10]),
            Err(CryptoError::UngueltigeDaten(_))
        ));
    }

    #[test]
    fn ungueltige_schluessellaenge() {
        assert!(matches!(
            verschluesseln(&[0u8; 16], b"x"),
            Err(CryptoError::UngueltigeSchluesselLaenge { .. })
        ));
    }

    #[test]
    fn nonces_sind_verschieden() {
        let a = verschluesseln(&KEY, b"gleich").unwrap();
        let b = verschluesseln(&KEY, b"gleich").unwrap();
        assert_ne!(a[..NONCE_LAENGE], b[..NONCE_LAENGE]);
    }
}
