//! Durchsatz-Ueberwachung einer Pipeline-Richtung
//!
//! Die Pipeline zaehlt uebertragene Bytes in einem geteilten Zaehler. Der
//! Monitor liest ihn im festen Intervall und meldet die Rate seit der letzten
//! Messung; beim Ende meldet er die Durchschnittsrate ueber die ganze Laufzeit.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::info;

/// Abschlussbericht eines Monitors
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProgressBericht {
    pub bytes: u64,
    pub dauer: Duration,
}

impl ProgressBericht {
    /// Durchschnittliche Rate in Bytes pro Sekunde
    pub fn rate(&self) -> f64 {
        let sekunden = self.dauer.as_secs_f64();
        if sekunden > 0.0 {
            self.bytes as f64 / sekunden
        } else {
            0.0
        }
    }
}

pub struct ProgressMonitor {
    richtung: &'static str,
    zaehler: Arc<AtomicU64>,
    intervall: Duration,
}

impl ProgressMonitor {
    pub fn neu(richtung: &'static str, zaehler: Arc<AtomicU64>, intervall: Duration) -> Self {
        Self {
            richtung,
            zaehler,
            intervall,
        }
    }

    /// Startet den Monitor; er endet sobald `fertig` auf `true` wechselt
    pub fn starten(self, mut fertig: watch::Receiver<bool>) -> JoinHandle<ProgressBericht> {
        tokio::spawn(async move {
            let start = Instant::now();
            let mut takt = tokio::time::interval_at(start + self.intervall, self.intervall);
            takt.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut letzte_bytes = 0u64;
            let mut letzte_zeit = start;

            loop {
                tokio::select! {
                    _ = takt.tick() => {
                        let bytes = self.zaehler.load(Ordering::Relaxed);
                        let jetzt = Instant::now();
                        let sekunden = (jetzt - letzte_zeit).as_secs_f64();
                        let rate = if sekunden > 0.0 {
                            (bytes - letzte_bytes) as f64 / sekunden
                        } else {
                            0.0
                        };
                        info!(
                            richtung = self.richtung,
                            bytes_gesamt = bytes,
                            bytes_pro_s = rate as u64,
                            "Durchsatz"
                        );
                        letzte_bytes = bytes;
                        letzte_zeit = jetzt;
                    }
                    // Sender weg zaehlt ebenfalls als Ende
                    _ = fertig.wait_for(|f| *f) => break,
                }
            }

            let bericht = ProgressBericht {
                bytes: self.zaehler.load(Ordering::Relaxed),
                dauer: start.elapsed(),
            };
            info!(
                richtung = self.richtung,
                bytes_gesamt = bericht.bytes,
                dauer_s = bericht.dauer.as_secs_f64(),
                bytes_pro_s = bericht.rate() as u64,
                "Durchsatz (Durchschnitt)"
            );
            bericht
        })
    }
}
