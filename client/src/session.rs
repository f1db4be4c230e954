//! Call-Session – zwei Pipelines unter einem Lebenszyklus
//!
//! ## Ausgehend
//! ```text
//! FrameSource (spawn_blocking)
//!     -> BufferPool::acquire, read_frame
//!     -> mpsc(1)                          <- Backpressure auf Capture
//!     -> Relay-Task: encode, release, encrypt, proxy an Peer-Alias
//! ```
//!
//! ## Eingehend
//! ```text
//! Posteingang (Audio-Queue)
//!     -> Empfangs-Task: Absender pruefen, decrypt, decode in Pool-Frame
//!     -> mpsc(1)
//!     -> FrameSink (spawn_blocking): write_frame, release
//! ```
//!
//! Pro Richtung zaehlt ein `ProgressMonitor` die Bytes. Beim Beenden werden
//! alle sechs Tasks gejoint; danach ist jeder Frame wieder im Pool.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ipcall_audio::{
    codec_protokollieren, AudioDevice, AudioError, AudioFrame, BufferPool, CodecKind, FrameCodec,
    FrameSpec,
};
use ipcall_core::Alias;
use ipcall_protocol::{Content, RelayPacket};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::e2e::PeerCrypto;
use crate::error::CallResult;
use crate::handshake::{handshake_durchfuehren, HandshakeConfig};
use crate::progress::{ProgressBericht, ProgressMonitor};
use crate::transport::Transport;
use crate::verbindung::{Posteingang, Verbindung};

/// Puffer zwischen Posteingang und Empfangs-Task
const AUDIO_QUEUE_KAPAZITAET: usize = 64;

/// Laufzeit-Konfiguration einer Call-Session
#[derive(Debug, Clone)]
pub struct CallConfig {
    pub spec: FrameSpec,
    /// Vorgewaermte Frames im Buffer-Pool
    pub pool_warm: usize,
    pub codec: CodecKind,
    pub handshake: HandshakeConfig,
    pub fortschritt_intervall: Duration,
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            spec: FrameSpec::default(),
            pool_warm: 10_000,
            codec: CodecKind::Deflate,
            handshake: HandshakeConfig::default(),
            fortschritt_intervall: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeZustand {
    /// Kein E2E konfiguriert oder noch kein Call
    Keiner,
    Laeuft,
    Hergestellt,
    Fehlgeschlagen,
}

/// Durchsatz beider Richtungen eines beendeten Calls
#[derive(Debug, Clone, Copy, Default)]
pub struct CallStatistik {
    pub gesendet: ProgressBericht,
    pub empfangen: ProgressBericht,
}

// ---------------------------------------------------------------------------
// CallClient
// ---------------------------------------------------------------------------

/// Fuehrt Calls aus; hoechstens einer gleichzeitig
pub struct CallClient {
    transport: Arc<dyn Transport>,
    posteingang: Arc<Posteingang>,
    crypto: Option<Arc<dyn PeerCrypto>>,
    geraet: Arc<dyn AudioDevice>,
    pool: Arc<BufferPool>,
    config: CallConfig,
    slot: tokio::sync::Mutex<()>,
    zustand: parking_lot::Mutex<HandshakeZustand>,
}

impl CallClient {
    /// Erstellt den Client ohne E2E-Verschluesselung
    pub fn neu(verbindung: &Verbindung, geraet: Arc<dyn AudioDevice>, config: CallConfig) -> Self {
        let pool = Arc::new(BufferPool::new(
            config.spec.samples_pro_frame(),
            config.pool_warm,
        ));
        Self {
            transport: Arc::clone(verbindung.transport()),
            posteingang: Arc::clone(verbindung.posteingang()),
            crypto: None,
            geraet,
            pool,
            config,
            slot: tokio::sync::Mutex::new(()),
            zustand: parking_lot::Mutex::new(HandshakeZustand::Keiner),
        }
    }

    /// Aktiviert E2E: jeder Call beginnt mit einem Handshake
    pub fn mit_crypto(mut self, crypto: Arc<dyn PeerCrypto>) -> Self {
        self.crypto = Some(crypto);
        self
    }

    pub fn pool(&self) -> &Arc<BufferPool> {
        &self.pool
    }

    pub fn handshake_zustand(&self) -> HandshakeZustand {
        *self.zustand.lock()
    }

    /// Fuehrt einen Call mit `peer` bis `fertig` abgeschlossen ist
    ///
    /// Ein zweiter Aufruf wartet, bis der laufende Call beendet ist.
    ///
    /// # Fehler
    /// - `HandshakeFailed` wenn E2E aktiv ist und kein Schluessel zustande kommt;
    ///   es wird dann keine Pipeline gestartet
    /// - `Audio` wenn der konfigurierte Codec nicht erstellt werden kann
    pub async fn call<F>(&self, peer: &Alias, fertig: F) -> CallResult<CallStatistik>
    where
        F: Future<Output = ()>,
    {
        let _slot = self.slot.lock().await;
        info!(peer = %peer, "Call wird aufgebaut");

        match &self.crypto {
            Some(crypto) => {
                *self.zustand.lock() = HandshakeZustand::Laeuft;
                if let Err(e) =
                    handshake_durchfuehren(crypto.as_ref(), peer, &self.config.handshake).await
                {
                    *self.zustand.lock() = HandshakeZustand::Fehlgeschlagen;
                    error!(peer = %peer, fehler = %e, "Call abgebrochen");
                    return Err(e);
                }
                *self.zustand.lock() = HandshakeZustand::Hergestellt;
            }
            None => *self.zustand.lock() = HandshakeZustand::Keiner,
        }

        let session = CallSession::starten(self, peer.clone())?;
        fertig.await;
        Ok(session.beenden().await)
    }
}

// ---------------------------------------------------------------------------
// CallSession
// ---------------------------------------------------------------------------

/// Laufende Pipelines eines Calls; wird nie wiederverwendet
pub struct CallSession {
    peer: Alias,
    stop: StopSignal,
    fertig_tx: watch::Sender<bool>,
    capture: JoinHandle<()>,
    relay: JoinHandle<()>,
    empfang: JoinHandle<()>,
    playback: JoinHandle<()>,
    monitor_aus: JoinHandle<ProgressBericht>,
    monitor_ein: JoinHandle<ProgressBericht>,
}

impl CallSession {
    fn starten(client: &CallClient, peer: Alias) -> CallResult<Self> {
        let spec = client.config.spec;
        let encoder = client.config.codec.erstellen(spec)?;
        let decoder = client.config.codec.erstellen(spec)?;
        codec_protokollieren(encoder.as_ref(), &spec);

        let stop = StopSignal {
            capture_stop: Arc::new(AtomicBool::new(false)),
            posteingang: Arc::clone(&client.posteingang),
        };
        let (fertig_tx, fertig_rx) = watch::channel(false);
        let bytes_aus = Arc::new(AtomicU64::new(0));
        let bytes_ein = Arc::new(AtomicU64::new(0));

        // Audio annehmen bevor ein Geraet geoeffnet wird
        let audio_rx = client.posteingang.audio_anmelden(AUDIO_QUEUE_KAPAZITAET);

        // Ausgehend: Capture -> Relay
        let (aus_tx, aus_rx) = mpsc::channel::<AudioFrame>(1);
        let capture = {
            let geraet = Arc::clone(&client.geraet);
            let pool = Arc::clone(&client.pool);
            let halt = Arc::clone(&stop.capture_stop);
            tokio::task::spawn_blocking(move || capture_loop(geraet, spec, pool, aus_tx, halt))
        };
        let relay = tokio::spawn(relay_loop(
            aus_rx,
            encoder,
            Arc::clone(&client.pool),
            client.crypto.clone(),
            Arc::clone(&client.transport),
            peer.clone(),
            Arc::clone(&bytes_aus),
        ));

        // Eingehend: Posteingang -> Empfang -> Playback
        let (ein_tx, ein_rx) = mpsc::channel::<AudioFrame>(1);
        let empfang = tokio::spawn(empfangs_loop(
            audio_rx,
            ein_tx,
            decoder,
            Arc::clone(&client.pool),
            client.crypto.clone(),
            peer.clone(),
            Arc::clone(&bytes_ein),
        ));
        let playback = {
            let geraet = Arc::clone(&client.geraet);
            let pool = Arc::clone(&client.pool);
            tokio::task::spawn_blocking(move || playback_loop(geraet, spec, pool, ein_rx))
        };

        let intervall = client.config.fortschritt_intervall;
        let monitor_aus =
            ProgressMonitor::neu("ausgehend", bytes_aus, intervall).starten(fertig_rx.clone());
        let monitor_ein = ProgressMonitor::neu("eingehend", bytes_ein, intervall).starten(fertig_rx);

        info!(peer = %peer, geraet = client.geraet.name(), "Call-Session gestartet");

        Ok(Self {
            peer,
            stop,
            fertig_tx,
            capture,
            relay,
            empfang,
            playback,
            monitor_aus,
            monitor_ein,
        })
    }

    pub fn peer(&self) -> &Alias {
        &self.peer
    }

    /// Stoppt beide Pipelines und wartet auf alle Tasks
    pub async fn beenden(self) -> CallStatistik {
        info!(peer = %self.peer, "Call-Session wird beendet");

        // Keine neuen Pakete mehr; Empfang und Playback laufen leer.
        // Capture stoppt, dadurch schliesst die Queue und der Relay-Task laeuft leer.
        self.stop.ausloesen();

        for (name, task) in [
            ("capture", self.capture),
            ("relay", self.relay),
            ("empfang", self.empfang),
            ("playback", self.playback),
        ] {
            if let Err(e) = task.await {
                warn!(task = name, fehler = %e, "Pipeline-Task abgebrochen");
            }
        }

        let _ = self.fertig_tx.send(true);
        let gesendet = self.monitor_aus.await.unwrap_or_default();
        let empfangen = self.monitor_ein.await.unwrap_or_default();

        info!(peer = %self.peer, "Call-Session beendet");
        CallStatistik {
            gesendet,
            empfangen,
        }
    }
}

/// Haelt die Pipelines an; greift auch wenn die Session ohne `beenden` verworfen wird
struct StopSignal {
    capture_stop: Arc<AtomicBool>,
    posteingang: Arc<Posteingang>,
}

impl StopSignal {
    fn ausloesen(&self) {
        self.posteingang.audio_abmelden();
        self.capture_stop.store(true, Ordering::Relaxed);
    }
}

impl Drop for StopSignal {
    fn drop(&mut self) {
        self.ausloesen();
    }
}

// ---------------------------------------------------------------------------
// Pipeline-Stufen
// ---------------------------------------------------------------------------

fn capture_loop(
    geraet: Arc<dyn AudioDevice>,
    spec: FrameSpec,
    pool: Arc<BufferPool>,
    tx: mpsc::Sender<AudioFrame>,
    halt: Arc<AtomicBool>,
) {
    let mut quelle = match geraet.open_source(spec) {
        Ok(q) => q,
        Err(e) => {
            error!(fehler = %e, "Capture-Quelle konnte nicht geoeffnet werden");
            return;
        }
    };

    debug!("Capture gestartet");
    while !halt.load(Ordering::Relaxed) {
        let mut frame = pool.acquire();
        match quelle.read_frame(&mut frame) {
            Ok(()) => {}
            Err(AudioError::Geschlossen) => {
                pool.release(frame);
                break;
            }
            Err(e) => {
                // Frame faellt aus, die Pipeline laeuft weiter
                warn!(fehler = %e, "Capture-Fehler, Frame verworfen");
                pool.release(frame);
                std::thread::sleep(spec.frame_dauer);
                continue;
            }
        }
        if let Err(mpsc::error::SendError(frame)) = tx.blocking_send(frame) {
            pool.release(frame);
            break;
        }
    }
    debug!("Capture beendet");
}

async fn relay_loop(
    mut rx: mpsc::Receiver<AudioFrame>,
    mut codec: Box<dyn FrameCodec>,
    pool: Arc<BufferPool>,
    crypto: Option<Arc<dyn PeerCrypto>>,
    transport: Arc<dyn Transport>,
    peer: Alias,
    bytes: Arc<AtomicU64>,
) {
    while let Some(frame) = rx.recv().await {
        let kodiert = codec.encode(&frame);
        pool.release(frame);

        let nutzdaten = match kodiert {
            Ok(d) => d,
            Err(e) => {
                debug!(fehler = %e, "Frame nicht kodierbar, verworfen");
                continue;
            }
        };
        let nutzdaten = match &crypto {
            Some(c) => match c.encrypt_for_peer(&peer, &nutzdaten) {
                Ok(d) => d,
                Err(e) => {
                    debug!(fehler = %e, "Frame nicht verschluesselbar, verworfen");
                    continue;
                }
            },
            None => nutzdaten,
        };

        let laenge = nutzdaten.len() as u64;
        let paket = RelayPacket::proxy(&peer, Content::Audio, nutzdaten);
        match transport.senden(&paket).await {
            Ok(()) => {
                bytes.fetch_add(laenge, Ordering::Relaxed);
            }
            Err(e) => warn!(fehler = %e, "Senden fehlgeschlagen, Frame uebersprungen"),
        }
    }
    debug!("Relay-Task beendet");
}

async fn empfangs_loop(
    mut rx: mpsc::Receiver<RelayPacket>,
    play_tx: mpsc::Sender<AudioFrame>,
    mut codec: Box<dyn FrameCodec>,
    pool: Arc<BufferPool>,
    crypto: Option<Arc<dyn PeerCrypto>>,
    peer: Alias,
    bytes: Arc<AtomicU64>,
) {
    while let Some(paket) = rx.recv().await {
        if paket.meta.relay_from.as_deref() != Some(peer.as_str()) {
            debug!(
                von = paket.meta.relay_from.as_deref().unwrap_or("?"),
                erwartet = %peer,
                "Paket von fremdem Peer verworfen"
            );
            continue;
        }

        let entschluesselt;
        let nutzdaten: &[u8] = match &crypto {
            Some(c) => match c.decrypt_from_peer(&peer, &paket.payload) {
                Ok(d) => {
                    entschluesselt = d;
                    entschluesselt.as_slice()
                }
                Err(e) => {
                    debug!(fehler = %e, "Paket nicht entschluesselbar, verworfen");
                    continue;
                }
            },
            None => &paket.payload[..],
        };
        bytes.fetch_add(paket.payload.len() as u64, Ordering::Relaxed);

        let mut frame = pool.acquire();
        if let Err(e) = codec.decode(nutzdaten, &mut frame) {
            debug!(fehler = %e, "Paket nicht dekodierbar, verworfen");
            pool.release(frame);
            continue;
        }
        if let Err(mpsc::error::SendError(frame)) = play_tx.send(frame).await {
            pool.release(frame);
            break;
        }
    }
    debug!("Empfangs-Task beendet");
}

fn playback_loop(
    geraet: Arc<dyn AudioDevice>,
    spec: FrameSpec,
    pool: Arc<BufferPool>,
    mut rx: mpsc::Receiver<AudioFrame>,
) {
    let mut senke = match geraet.open_sink(spec) {
        Ok(s) => Some(s),
        Err(e) => {
            error!(fehler = %e, "Playback-Senke nicht verfuegbar, Frames werden verworfen");
            None
        }
    };

    while let Some(frame) = rx.blocking_recv() {
        if let Some(senke) = senke.as_mut() {
            if let Err(e) = senke.write_frame(&frame) {
                debug!(fehler = %e, "Playback-Fehler");
            }
        }
        pool.release(frame);
    }
    debug!("Playback beendet");
}
