//! Key-Exchange-Hello
//!
//! ```text
//! [public_key(32)] [flags(1)]
//! ```
//! Flag-Bit 0: der Absender besitzt bereits den Schluessel des Empfaengers,
//! eine Antwort ist nicht noetig.

use crate::error::{CryptoError, CryptoResult};
use crate::key_exchange::PUBLIC_KEY_LAENGE;

const FLAG_KENNT_DICH: u8 = 0x01;

/// Laenge eines serialisierten Hellos
pub const HELLO_LAENGE: usize = PUBLIC_KEY_LAENGE + 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KexHello {
    pub public_key: [u8; PUBLIC_KEY_LAENGE],
    /// Absender hat den Schluessel des Empfaengers bereits
    pub kennt_dich: bool,
}

impl KexHello {
    pub fn encode(&self) -> [u8; HELLO_LAENGE] {
        let mut buf = [0u8; HELLO_LAENGE];
        buf[..PUBLIC_KEY_LAENGE].copy_from_slice(&self.public_key);
        if self.kennt_dich {
            buf[PUBLIC_KEY_LAENGE] = FLAG_KENNT_DICH;
        }
        buf
    }

    pub fn decode(buf: &[u8]) -> CryptoResult<Self> {
        if buf.len() != HELLO_LAENGE {
            return Err(CryptoError::UngueltigeDaten(format!(
                "Hello hat {} Bytes, erwartet {}",
                buf.len(),
                HELLO_LAENGE
            )));
        }
        let mut public_key = [0u8; PUBLIC_KEY_LAENGE];
        public_key.copy_from_slice(&buf[..PUBLIC_KEY_LAENGE]);
        Ok(Self {
            public_key,
            kennt_dich: buf[PUBLIC_KEY_LAENGE] & FLAG_KENNT_DICH != 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hello_layout() {
        let hello = KexHello {
            public_key: [3u8; 32],
            kennt_dich: true,
        };
        let bytes = hello.encode();
        assert_eq!(bytes[32], 0x01);
        assert_eq!(KexHello::decode(&bytes).unwrap(), hello);
    }

    #[test]
    fn falsche_laenge() {
        assert!(KexHello::decode(&[0u8; 32]).is_err());
        assert!(KexHello::decode(&[0u8; 34]).is_err());
    }
}
