//! Datagramm-Transport zum Relay-Server
//!
//! Der Client spricht ausschliesslich mit dem Relay-Server; jede Zustellung an
//! einen Peer laeuft ueber eine `proxy`-Anfrage mit Ziel-Alias.

use std::net::SocketAddr;

use async_trait::async_trait;
use ipcall_protocol::{RelayPacket, MAX_DATAGRAMM_GROESSE};
use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tracing::{debug, trace};

use crate::error::CallResult;

#[async_trait]
pub trait Transport: Send + Sync {
    /// Sendet ein Paket an den Relay-Server
    async fn senden(&self, paket: &RelayPacket) -> CallResult<()>;

    /// Wartet auf das naechste gueltige Paket vom Relay-Server
    async fn empfangen(&self) -> CallResult<RelayPacket>;
}

// ---------------------------------------------------------------------------
// UdpTransport
// ---------------------------------------------------------------------------

pub struct UdpTransport {
    socket: UdpSocket,
    server: SocketAddr,
    /// Empfangspuffer, einmal alloziert und pro Datagramm wiederverwendet
    puffer: Mutex<Box<[u8]>>,
}

impl UdpTransport {
    /// Bindet den lokalen Socket; `lokal` mit Port 0 laesst das OS waehlen
    pub async fn binden(lokal: SocketAddr, server: SocketAddr) -> CallResult<Self> {
        let socket = UdpSocket::bind(lokal).await?;
        tracing::info!(
            lokal = %socket.local_addr()?,
            server = %server,
            "UDP-Transport gebunden"
        );
        Ok(Self {
            socket,
            server,
            puffer: Mutex::new(vec![0u8; MAX_DATAGRAMM_GROESSE].into_boxed_slice()),
        })
    }

    pub fn lokale_adresse(&self) -> CallResult<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn senden(&self, paket: &RelayPacket) -> CallResult<()> {
        let bytes = paket.encode()?;
        self.socket.send_to(&bytes, self.server).await?;
        trace!(bytes = bytes.len(), "Paket an Server gesendet");
        Ok(())
    }

    async fn empfangen(&self) -> CallResult<RelayPacket> {
        let mut puffer = self.puffer.lock().await;
        let buf = &mut puffer[..];
        loop {
            let (len, von) = self.socket.recv_from(buf).await?;
            if von != self.server {
                debug!(von = %von, "Datagramm von fremder Adresse verworfen");
                continue;
            }
            match RelayPacket::decode(&buf[..len]) {
                Ok(paket) => return Ok(paket),
                Err(e) => debug!(fehler = %e, "Ungueltiges Paket vom Server verworfen"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ipcall_core::Alias;

    #[tokio::test]
    async fn nur_pakete_vom_server() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let fremd = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let transport = UdpTransport::binden(
            "127.0.0.1:0".parse().unwrap(),
            server.local_addr().unwrap(),
        )
        .await
        .unwrap();
        let ziel = transport.lokale_adresse().unwrap();

        let fremdes = RelayPacket::antwort_ok(Some(1)).encode().unwrap();
        fremd.send_to(&fremdes, ziel).await.unwrap();
        server.send_to(b"kaputt", ziel).await.unwrap();
        let echtes = RelayPacket::antwort_ok(Some(2)).encode().unwrap();
        server.send_to(&echtes, ziel).await.unwrap();

        let paket = transport.empfangen().await.unwrap();
        assert_eq!(paket.meta.request_id, Some(2));
    }

    #[tokio::test]
    async fn puffer_wird_wiederverwendet() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let transport = UdpTransport::binden(
            "127.0.0.1:0".parse().unwrap(),
            server.local_addr().unwrap(),
        )
        .await
        .unwrap();
        let ziel = transport.lokale_adresse().unwrap();
        let peer = Alias::new("bob").unwrap();

        // Grosses Paket zuerst, danach ein kleineres im selben Puffer
        let gross = RelayPacket::proxy(&peer, ipcall_protocol::Content::Audio, vec![7u8; 4000]);
        let klein = RelayPacket::antwort_ok(Some(3));
        server.send_to(&gross.encode().unwrap(), ziel).await.unwrap();
        server.send_to(&klein.encode().unwrap(), ziel).await.unwrap();

        assert_eq!(transport.empfangen().await.unwrap(), gross);
        assert_eq!(transport.empfangen().await.unwrap(), klein);
        assert_eq!(transport.puffer.lock().await.len(), MAX_DATAGRAMM_GROESSE);
    }

    #[tokio::test]
    async fn senden_erreicht_server() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let transport = UdpTransport::binden(
            "127.0.0.1:0".parse().unwrap(),
            server.local_addr().unwrap(),
        )
        .await
        .unwrap();

        let paket = RelayPacket::register(&Alias::new("alice").unwrap(), 9);
        transport.senden(&paket).await.unwrap();

        let mut buf = vec![0u8; 4096];
        let (len, _) = server.recv_from(&mut buf).await.unwrap();
        assert_eq!(RelayPacket::decode(&buf[..len]).unwrap(), paket);
    }
}
