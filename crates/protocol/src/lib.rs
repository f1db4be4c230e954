//! ipcall-protocol – Relay-Paketformat
//!
//! Dieses Crate definiert das Datagramm-Format, die Metadaten-Schluessel und
//! die Operations-Tags, die zwischen Client und Relay-Server ausgetauscht werden.

pub mod packet;

pub use packet::{
    Content, ErrorCode, PacketMeta, RelayPacket, Status, Target, MAX_DATAGRAMM_GROESSE,
    MAX_META_LAENGE, PROTOKOLL_VERSION,
};
