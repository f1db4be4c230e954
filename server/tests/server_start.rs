//! Server aus Konfiguration starten, registrieren, beenden

use std::time::Duration;

use ipcall_core::Alias;
use ipcall_protocol::{RelayPacket, Status};
use ipcall_server::{config::ServerConfig, Server};
use tokio::net::UdpSocket;

#[tokio::test]
async fn server_nimmt_registrierung_an() {
    let mut config = ServerConfig::default();
    config.netzwerk.bind_adresse = "127.0.0.1".into();
    config.netzwerk.udp_port = 0;
    config.observability.aktiviert = false;

    let laufend = Server::neu(config).binden().await.unwrap();
    let server_addr = laufend.udp_adresse();

    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let paket = RelayPacket::register(&Alias::new("alice").unwrap(), 5);
    client
        .send_to(&paket.encode().unwrap(), server_addr)
        .await
        .unwrap();

    let mut buf = vec![0u8; 4096];
    let (len, _) = tokio::time::timeout(Duration::from_secs(2), client.recv_from(&mut buf))
        .await
        .unwrap()
        .unwrap();
    let antwort = RelayPacket::decode(&buf[..len]).unwrap();
    assert_eq!(antwort.meta.status, Some(Status::Ok));
    assert_eq!(laufend.metriken().registered_aliases.get(), 1);

    laufend.beenden().await.unwrap();
}
