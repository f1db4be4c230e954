//! In-Prozess-Relay und Test-Geraete fuer Client-Integrationstests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ipcall_audio::{AudioDevice, AudioError, AudioResult, FrameSink, FrameSource, FrameSpec};
use ipcall_client::{
    CallClient, CallConfig, CallError, CallResult, PeerCrypto, RelayE2e, ServerControl,
    Transport, Verbindung,
};
use ipcall_core::{Address, Alias};
use ipcall_crypto::Identity;
use ipcall_protocol::RelayPacket;
use ipcall_relay::{AliasRegistry, Outcome, RelayRouter, RequestContext};
use parking_lot::Mutex;
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// Hub: RelayRouter ohne Sockets
// ---------------------------------------------------------------------------

pub struct Hub {
    router: RelayRouter,
    postfaecher: Mutex<HashMap<Address, mpsc::UnboundedSender<RelayPacket>>>,
}

impl Hub {
    pub fn neu() -> Arc<Self> {
        Arc::new(Self {
            router: RelayRouter::neu(Arc::new(AliasRegistry::neu())).unwrap(),
            postfaecher: Mutex::new(HashMap::new()),
        })
    }

    pub fn anschliessen(self: &Arc<Self>, adresse: &str) -> Arc<HubTransport> {
        let adresse = Address::new(adresse);
        let (tx, rx) = mpsc::unbounded_channel();
        self.postfaecher.lock().insert(adresse.clone(), tx);
        Arc::new(HubTransport {
            hub: Arc::clone(self),
            adresse,
            eingang: tokio::sync::Mutex::new(rx),
            fehler_alle: AtomicUsize::new(0),
            sendungen: AtomicUsize::new(0),
            fehlgeschlagen: AtomicUsize::new(0),
        })
    }

    fn zustellen(&self, ziel: &Address, paket: RelayPacket) {
        if let Some(tx) = self.postfaecher.lock().get(ziel) {
            let _ = tx.send(paket);
        }
    }
}

pub struct HubTransport {
    hub: Arc<Hub>,
    adresse: Address,
    eingang: tokio::sync::Mutex<mpsc::UnboundedReceiver<RelayPacket>>,
    fehler_alle: AtomicUsize,
    sendungen: AtomicUsize,
    fehlgeschlagen: AtomicUsize,
}

impl HubTransport {
    /// Ab jetzt schlaegt jede `n`-te Sendung fehl; 0 schaltet das ab
    pub fn senden_fehlschlagen_alle(&self, n: usize) {
        self.sendungen.store(0, Ordering::SeqCst);
        self.fehler_alle.store(n, Ordering::SeqCst);
    }

    pub fn fehlgeschlagen(&self) -> usize {
        self.fehlgeschlagen.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for HubTransport {
    async fn senden(&self, paket: &RelayPacket) -> CallResult<()> {
        let n = self.fehler_alle.load(Ordering::SeqCst);
        if n > 0 && (self.sendungen.fetch_add(1, Ordering::SeqCst) + 1) % n == 0 {
            self.fehlgeschlagen.fetch_add(1, Ordering::SeqCst);
            return Err(CallError::Transport(std::io::Error::other("Netz weg")));
        }
        // Ueber das Wire-Format, wie bei UDP
        let paket = RelayPacket::decode(&paket.encode()?)?;
        let ctx = RequestContext::neu(self.adresse.clone());
        match self.hub.router.handle(&ctx, &paket) {
            Outcome::Antwort(antwort) => self.hub.zustellen(&self.adresse, antwort),
            Outcome::Weiterleiten(d) => self.hub.zustellen(&d.ziel, d.paket),
        }
        Ok(())
    }

    async fn empfangen(&self) -> CallResult<RelayPacket> {
        self.eingang
            .lock()
            .await
            .recv()
            .await
            .ok_or(CallError::Geschlossen)
    }
}

// ---------------------------------------------------------------------------
// Test-Geraet
// ---------------------------------------------------------------------------

/// Liefert Frames mit konstantem Wert im Takt, zeichnet Playback auf
pub struct TestGeraet {
    wert: i32,
    takt: Duration,
    /// Lesung (ab 1), die einmalig mit einem Stream-Fehler endet
    capture_fehler_bei: Option<usize>,
    pub quellen_geoeffnet: AtomicUsize,
    pub abgespielt: Arc<Mutex<Vec<Vec<i32>>>>,
}

impl TestGeraet {
    pub fn neu(wert: i32) -> Arc<Self> {
        Self::mit_capture_fehler(wert, None)
    }

    pub fn mit_capture_fehler(wert: i32, capture_fehler_bei: Option<usize>) -> Arc<Self> {
        Arc::new(Self {
            wert,
            takt: Duration::from_millis(2),
            capture_fehler_bei,
            quellen_geoeffnet: AtomicUsize::new(0),
            abgespielt: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub fn geoeffnet(&self) -> usize {
        self.quellen_geoeffnet.load(Ordering::SeqCst)
    }

    pub fn anzahl_abgespielt(&self) -> usize {
        self.abgespielt.lock().len()
    }
}

impl AudioDevice for TestGeraet {
    fn name(&self) -> &str {
        "test"
    }

    fn open_source(&self, _spec: FrameSpec) -> AudioResult<Box<dyn FrameSource>> {
        self.quellen_geoeffnet.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(KonstanteQuelle {
            wert: self.wert,
            takt: self.takt,
            fehler_bei: self.capture_fehler_bei,
            gelesen: 0,
        }))
    }

    fn open_sink(&self, _spec: FrameSpec) -> AudioResult<Box<dyn FrameSink>> {
        Ok(Box::new(Aufnahme {
            frames: Arc::clone(&self.abgespielt),
        }))
    }
}

struct KonstanteQuelle {
    wert: i32,
    takt: Duration,
    fehler_bei: Option<usize>,
    gelesen: usize,
}

impl FrameSource for KonstanteQuelle {
    fn read_frame(&mut self, frame: &mut [i32]) -> AudioResult<()> {
        std::thread::sleep(self.takt);
        self.gelesen += 1;
        if self.fehler_bei == Some(self.gelesen) {
            return Err(AudioError::StreamFehler("xrun".to_string()));
        }
        frame.fill(self.wert);
        Ok(())
    }
}

struct Aufnahme {
    frames: Arc<Mutex<Vec<Vec<i32>>>>,
}

impl FrameSink for Aufnahme {
    fn write_frame(&mut self, frame: &[i32]) -> AudioResult<()> {
        self.frames.lock().push(frame.to_vec());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Teilnehmer
// ---------------------------------------------------------------------------

pub fn test_config() -> CallConfig {
    CallConfig {
        spec: FrameSpec::new(8000, Duration::from_millis(10)).unwrap(),
        pool_warm: 64,
        fortschritt_intervall: Duration::from_millis(100),
        ..Default::default()
    }
}

pub struct Teilnehmer {
    pub alias: Alias,
    pub transport: Arc<HubTransport>,
    pub verbindung: Verbindung,
    pub control: ServerControl,
    pub geraet: Arc<TestGeraet>,
    pub e2e: Option<Arc<RelayE2e>>,
    pub client: Arc<CallClient>,
}

/// Verbindet, registriert und baut den CallClient
pub async fn teilnehmer(
    hub: &Arc<Hub>,
    adresse: &str,
    alias: &str,
    wert: i32,
    e2e: bool,
    config: CallConfig,
) -> Teilnehmer {
    teilnehmer_mit_geraet(hub, adresse, alias, TestGeraet::neu(wert), e2e, config).await
}

/// Wie `teilnehmer`, mit vorgegebenem Test-Geraet
pub async fn teilnehmer_mit_geraet(
    hub: &Arc<Hub>,
    adresse: &str,
    alias: &str,
    geraet: Arc<TestGeraet>,
    e2e: bool,
    config: CallConfig,
) -> Teilnehmer {
    let alias = Alias::new(alias).unwrap();
    let transport = hub.anschliessen(adresse);
    let dyn_transport: Arc<dyn Transport> = transport.clone();

    let e2e = e2e.then(|| Arc::new(RelayE2e::neu(Identity::generieren(), Arc::clone(&dyn_transport))));
    let verbindung = Verbindung::starten(Arc::clone(&dyn_transport), e2e.clone());
    let control = ServerControl::neu(
        dyn_transport,
        Arc::clone(verbindung.posteingang()),
        Duration::from_secs(2),
    );
    control.register(&alias).await.unwrap();

    let mut client = CallClient::neu(&verbindung, geraet.clone(), config);
    if let Some(e2e) = &e2e {
        client = client.mit_crypto(Arc::clone(e2e) as Arc<dyn PeerCrypto>);
    }

    Teilnehmer {
        alias,
        transport,
        verbindung,
        control,
        geraet,
        e2e,
        client: Arc::new(client),
    }
}

/// Wartet bis `bedingung` gilt, hoechstens `max`
pub async fn warten_bis(max: Duration, mut bedingung: impl FnMut() -> bool) -> bool {
    let ende = tokio::time::Instant::now() + max;
    while tokio::time::Instant::now() < ende {
        if bedingung() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    bedingung()
}
