//! ipcall Client – Einstiegspunkt
//!
//! Registriert den eigenen Alias, wartet auf Enter, ruft den konfigurierten
//! Peer an und beendet den Call mit Ctrl-C.

use std::sync::Arc;

use anyhow::Result;
use ipcall_audio::AudioDevice;
use ipcall_client::config::ClientConfig;
use ipcall_client::{CallClient, RelayE2e, ServerControl, Transport, UdpTransport, Verbindung};
use ipcall_crypto::Identity;
use ipcall_observability::logging_initialisieren;
use tokio::io::{AsyncBufReadExt, BufReader};

#[cfg(feature = "hardware")]
fn audio_geraet() -> Arc<dyn AudioDevice> {
    Arc::new(ipcall_audio::CpalDevice::default())
}

#[cfg(not(feature = "hardware"))]
fn audio_geraet() -> Arc<dyn AudioDevice> {
    Arc::new(ipcall_audio::SilentDevice)
}

#[tokio::main]
async fn main() -> Result<()> {
    let config_pfad =
        std::env::var("IPCALL_CLIENT_CONFIG").unwrap_or_else(|_| "client.toml".into());
    let config = ClientConfig::laden(&config_pfad)?;

    logging_initialisieren(&config.logging.level, &config.logging.format);

    let alias = config.alias()?;
    let peer = config.peer()?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_pfad,
        alias = %alias,
        "ipcall Client wird initialisiert"
    );

    let transport: Arc<dyn Transport> = Arc::new(
        UdpTransport::binden(config.lokale_adresse()?, config.server_adresse()?).await?,
    );
    let e2e = config
        .sicherheit
        .e2e
        .then(|| Arc::new(RelayE2e::neu(Identity::generieren(), Arc::clone(&transport))));

    let verbindung = Verbindung::starten(Arc::clone(&transport), e2e.clone());
    let control = ServerControl::neu(
        Arc::clone(&transport),
        Arc::clone(verbindung.posteingang()),
        config.anfrage_timeout(),
    );
    control.register(&alias).await?;

    let mut client = CallClient::neu(&verbindung, audio_geraet(), config.call_config()?);
    if let Some(e2e) = e2e {
        client = client.mit_crypto(e2e);
    }

    tracing::info!(peer = %peer, "Enter startet den Call, Ctrl-C beendet ihn");
    let mut zeilen = BufReader::new(tokio::io::stdin()).lines();
    zeilen.next_line().await?;

    let ergebnis = client
        .call(&peer, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(fehler = %e, "Ctrl-C-Handler nicht verfuegbar");
            }
        })
        .await;

    match &ergebnis {
        Ok(statistik) => tracing::info!(
            gesendet_bytes = statistik.gesendet.bytes,
            empfangen_bytes = statistik.empfangen.bytes,
            "Call beendet"
        ),
        Err(e) => tracing::error!(fehler = %e, "Call fehlgeschlagen"),
    }

    if let Err(e) = control.unregister(&alias).await {
        tracing::warn!(fehler = %e, "Abmelden fehlgeschlagen");
    }
    verbindung.beenden().await;

    ergebnis.map(|_| ()).map_err(Into::into)
}
