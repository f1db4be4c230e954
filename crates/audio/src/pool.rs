//! Buffer-Pool fuer Audio-Frames
//!
//! Freie Liste mit fester Kapazitaet hinter einem Lock. Beim Erzeugen wird der
//! Pool vollstaendig vorgewaermt, sodass `acquire` im eingeschwungenen Zustand
//! nie alloziert. Ist der Pool leer, wird ein frischer Frame erzeugt statt zu
//! blockieren.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::frame::AudioFrame;

pub struct BufferPool {
    frame_laenge: usize,
    kapazitaet: usize,
    frei: Mutex<Vec<AudioFrame>>,
    frische_allokationen: AtomicU64,
}

impl BufferPool {
    /// Erstellt einen Pool mit `warm_anzahl` vorallozierten Frames der Laenge `frame_laenge`
    pub fn new(frame_laenge: usize, warm_anzahl: usize) -> Self {
        let mut frei = Vec::with_capacity(warm_anzahl);
        frei.extend((0..warm_anzahl).map(|_| AudioFrame::stille(frame_laenge)));

        debug!(frame_laenge, warm_anzahl, "Buffer-Pool vorgewaermt");

        Self {
            frame_laenge,
            kapazitaet: warm_anzahl,
            frei: Mutex::new(frei),
            frische_allokationen: AtomicU64::new(0),
        }
    }

    /// Entnimmt einen Frame; blockiert nie
    pub fn acquire(&self) -> AudioFrame {
        if let Some(frame) = self.frei.lock().pop() {
            return frame;
        }
        self.frische_allokationen.fetch_add(1, Ordering::Relaxed);
        trace!("Buffer-Pool leer, alloziere frischen Frame");
        AudioFrame::stille(self.frame_laenge)
    }

    /// Gibt einen Frame zurueck
    ///
    /// Frames mit falscher Laenge und Frames ueber der Kapazitaet werden verworfen.
    pub fn release(&self, frame: AudioFrame) {
        if frame.len() != self.frame_laenge {
            debug!(
                erwartet = self.frame_laenge,
                erhalten = frame.len(),
                "Frame mit falscher Laenge verworfen"
            );
            return;
        }
        let mut frei = self.frei.lock();
        if frei.len() < self.kapazitaet {
            frei.push(frame);
        }
    }

    /// Anzahl aktuell freier Frames
    pub fn available(&self) -> usize {
        self.frei.lock().len()
    }

    pub fn frame_len(&self) -> usize {
        self.frame_laenge
    }

    pub fn kapazitaet(&self) -> usize {
        self.kapazitaet
    }

    /// Wie oft `acquire` mangels freier Frames allozieren musste
    pub fn frische_allokationen(&self) -> u64 {
        self.frische_allokationen.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPool")
            .field("frame_laenge", &self.frame_laenge)
            .field("kapazitaet", &self.kapazitaet)
            .field("frei", &self.available())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn pool_ist_vorgewaermt() {
        let pool = BufferPool::new(480, 10);
        assert_eq!(pool.available(), 10);
        assert_eq!(pool.frame_len(), 480);

        let frame = pool.acquire();
        assert_eq!(frame.len(), 480);
        assert_eq!(pool.available(), 9);
        assert_eq!(pool.frische_allokationen(), 0);

        pool.release(frame);
        assert_eq!(pool.available(), 10);
    }

    #[test]
    fn leerer_pool_alloziert_frisch() {
        let pool = BufferPool::new(8, 1);
        let a = pool.acquire();
        let b = pool.acquire();
        assert_eq!(b.len(), 8);
        assert!(b.iter().all(|&s| s == 0));
        assert_eq!(pool.frische_allokationen(), 1);

        pool.release(a);
        pool.release(b);
        // Ueberzaehliger Frame wird verworfen
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn falsche_laenge_wird_verworfen() {
        let pool = BufferPool::new(8, 2);
        let _a = pool.acquire();
        pool.release(AudioFrame::stille(4));
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn paralleler_zugriff_liefert_immer_richtige_laenge() {
        let pool = Arc::new(BufferPool::new(32, 4));
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let pool = Arc::clone(&pool);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        let mut frame = pool.acquire();
                        assert_eq!(frame.len(), 32);
                        frame[0] = 1;
                        pool.release(frame);
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(pool.available(), 4);
    }
}
