//! Prometheus-kompatible Metriken des Relay-Servers
//!
//! Registrierte Metriken:
//! - `ipcall_registered_aliases` – Gauge: Aktuell registrierte Aliase
//! - `ipcall_requests_total` – Counter: Anfragen pro Operation (target)
//! - `ipcall_rejections_total` – Counter: Abgelehnte Anfragen pro Fehlercode (code)
//! - `ipcall_forwarded_packets_total` – Counter: Weitergeleitete Pakete
//! - `ipcall_forwarded_bytes_total` – Counter: Weitergeleitete Nutzdaten in Bytes

use anyhow::Result;
use axum::{extract::State, response::IntoResponse, routing::get, Router};
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Alle Metriken des Relay-Servers
#[derive(Clone)]
pub struct RelayMetrics {
    pub registry: Arc<Registry>,

    pub registered_aliases: IntGauge,
    pub requests_total: IntCounterVec,
    pub rejections_total: IntCounterVec,
    pub forwarded_packets_total: IntCounter,
    pub forwarded_bytes_total: IntCounter,
}

impl RelayMetrics {
    /// Erstellt und registriert alle Metriken in einer neuen Registry
    pub fn neu() -> Result<Self> {
        let registry = Registry::new();

        let registered_aliases = IntGauge::with_opts(Opts::new(
            "ipcall_registered_aliases",
            "Anzahl aktuell registrierter Aliase",
        ))?;
        registry.register(Box::new(registered_aliases.clone()))?;

        let requests_total = IntCounterVec::new(
            Opts::new("ipcall_requests_total", "Anfragen pro Relay-Operation"),
            &["target"],
        )?;
        registry.register(Box::new(requests_total.clone()))?;

        let rejections_total = IntCounterVec::new(
            Opts::new(
                "ipcall_rejections_total",
                "Abgelehnte Anfragen pro Fehlercode",
            ),
            &["code"],
        )?;
        registry.register(Box::new(rejections_total.clone()))?;

        let forwarded_packets_total = IntCounter::with_opts(Opts::new(
            "ipcall_forwarded_packets_total",
            "Gesamtanzahl weitergeleiteter Pakete",
        ))?;
        registry.register(Box::new(forwarded_packets_total.clone()))?;

        let forwarded_bytes_total = IntCounter::with_opts(Opts::new(
            "ipcall_forwarded_bytes_total",
            "Weitergeleitete Nutzdaten in Bytes",
        ))?;
        registry.register(Box::new(forwarded_bytes_total.clone()))?;

        #[cfg(target_os = "linux")]
        registry.register(Box::new(
            prometheus::process_collector::ProcessCollector::for_self(),
        ))?;

        Ok(Self {
            registry: Arc::new(registry),
            registered_aliases,
            requests_total,
            rejections_total,
            forwarded_packets_total,
            forwarded_bytes_total,
        })
    }

    pub fn anfrage(&self, target: &str) {
        self.requests_total.with_label_values(&[target]).inc();
    }

    pub fn abgelehnt(&self, code: &str) {
        self.rejections_total.with_label_values(&[code]).inc();
    }

    pub fn weitergeleitet(&self, bytes: usize) {
        self.forwarded_packets_total.inc();
        self.forwarded_bytes_total.inc_by(bytes as u64);
    }

    pub fn aliase_setzen(&self, anzahl: usize) {
        self.registered_aliases.set(anzahl as i64);
    }

    /// Exportiert alle Metriken im Prometheus-Textformat
    pub fn exportieren(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Axum-Router fuer den `/metrics`-Endpunkt
pub fn metrics_router(metriken: RelayMetrics) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metriken)
}

async fn metrics_handler(State(metriken): State<RelayMetrics>) -> impl IntoResponse {
    match metriken.exportieren() {
        Ok(text) => (
            axum::http::StatusCode::OK,
            [(
                axum::http::header::CONTENT_TYPE,
                "text/plain; version=0.0.4",
            )],
            text,
        )
            .into_response(),
        Err(err) => {
            tracing::error!("Metriken-Export fehlgeschlagen: {err}");
            axum::http::StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metriken_erstellen_erfolgreich() {
        let metriken = RelayMetrics::neu().unwrap();
        assert!(!metriken.registry.gather().is_empty());
    }

    #[test]
    fn zaehler_erscheinen_im_export() {
        let metriken = RelayMetrics::neu().unwrap();
        metriken.anfrage("proxy");
        metriken.abgelehnt("unknown_alias");
        metriken.weitergeleitet(120);
        metriken.aliase_setzen(2);

        let text = metriken.exportieren().unwrap();
        assert!(text.contains("ipcall_requests_total{target=\"proxy\"} 1"));
        assert!(text.contains("ipcall_rejections_total{code=\"unknown_alias\"} 1"));
        assert!(text.contains("ipcall_forwarded_bytes_total 120"));
        assert!(text.contains("ipcall_registered_aliases 2"));
    }

    #[test]
    fn zwei_instanzen_unabhaengig() {
        let a = RelayMetrics::neu().unwrap();
        let b = RelayMetrics::neu().unwrap();
        a.weitergeleitet(10);
        assert_eq!(a.forwarded_packets_total.get(), 1);
        assert_eq!(b.forwarded_packets_total.get(), 0);
    }
}
