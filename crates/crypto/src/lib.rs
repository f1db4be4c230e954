//! # ipcall-crypto
//!
//! Ende-zu-Ende Verschluesselung zwischen zwei Call-Teilnehmern.
//!
//! ## Module
//! - `key_exchange` - X25519 Identitaet und HKDF-Ableitung des Sitzungsschluessels
//! - `hello` - Key-Exchange-Hello (Public Key + Flags)
//! - `cipher` - AES-256-GCM Payload-Verschluesselung
//! - `peer_keys` - Sitzungsschluessel pro Peer
//! - `error` - Fehlertypen

pub mod cipher;
pub mod error;
pub mod hello;
pub mod key_exchange;
pub mod peer_keys;
pub mod types;

// Bequeme Re-Exports
pub use cipher::{entschluesseln, verschluesseln};
pub use error::{CryptoError, CryptoResult};
pub use hello::KexHello;
pub use key_exchange::{hkdf_derive, Identity, PUBLIC_KEY_LAENGE};
pub use peer_keys::PeerKeyStore;
pub use types::SecretBytes;
