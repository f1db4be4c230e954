//! Relay Router – Registrierung, Abmeldung und Weiterleitung per Alias
//!
//! Der `RelayRouter` ist die Zustandsmaschine des Servers. Jede Anfrage traegt
//! eine Operation (`Target`); die Zuordnung Operation -> Handler steht in einer
//! Dispatch-Tabelle, die beim Erzeugen auf Vollstaendigkeit geprueft wird.
//!
//! ## Autorisierung
//! - `register`: Alias darf noch nicht vergeben sein
//! - `unregister`: nur die Adresse, unter der der Alias registriert ist
//! - `proxy`: nur registrierte Absender, nur an registrierte Aliase
//!
//! Die Nutzdaten werden nie angefasst; der Router loest nur Adressen auf.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use ipcall_core::{Address, Alias};
use ipcall_observability::RelayMetrics;
use ipcall_protocol::{Content, PacketMeta, RelayPacket, Target};
use tracing::{debug, info, trace};

use crate::error::{RelayError, RelayResult};
use crate::registry::AliasRegistry;

// ---------------------------------------------------------------------------
// Anfrage und Ergebnis
// ---------------------------------------------------------------------------

/// Kontext einer Anfrage, vom Transport befuellt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    /// Transport-Adresse des Absenders
    pub absender: Address,
}

impl RequestContext {
    pub fn neu(absender: impl Into<Address>) -> Self {
        Self {
            absender: absender.into(),
        }
    }
}

/// Anweisung an die Transportschicht, ein Paket zuzustellen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardDirective {
    pub ziel: Address,
    pub paket: RelayPacket,
}

/// Ergebnis einer verarbeiteten Anfrage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Status-Antwort an den Absender
    Antwort(RelayPacket),
    /// Paket an einen anderen Client weiterleiten
    Weiterleiten(ForwardDirective),
}

// ---------------------------------------------------------------------------
// Dispatch-Tabelle
// ---------------------------------------------------------------------------

type Handler = fn(&RelayRouter, &RequestContext, &RelayPacket) -> RelayResult<Outcome>;

/// Zuordnung Operation -> Handler, deckt jede Operation genau einmal ab
struct DispatchTable {
    handler: HashMap<Target, Handler>,
}

impl DispatchTable {
    fn bauen(eintraege: &[(Target, Handler)]) -> RelayResult<Self> {
        let mut handler = HashMap::with_capacity(eintraege.len());
        for &(target, h) in eintraege {
            if handler.insert(target, h).is_some() {
                return Err(RelayError::HandlerDoppelt(target));
            }
        }
        if let Some(fehlend) = Target::ALLE.iter().find(|t| !handler.contains_key(*t)) {
            return Err(RelayError::HandlerFehlt(*fehlend));
        }
        Ok(Self { handler })
    }

    fn handler(&self, target: Target) -> Option<Handler> {
        self.handler.get(&target).copied()
    }
}

/// Registrierte Handler; `DispatchTable::bauen` prueft die Liste gegen `Target::ALLE`
fn standard_eintraege() -> [(Target, Handler); 3] {
    [
        (Target::Register, register_handler as Handler),
        (Target::Unregister, unregister_handler as Handler),
        (Target::Proxy, proxy_handler as Handler),
    ]
}

fn alias_aus_meta(paket: &RelayPacket) -> RelayResult<Alias> {
    match paket.meta.alias.as_deref() {
        None | Some("") => Err(RelayError::AliasFehlt),
        Some(name) => Alias::new(name).map_err(|e| RelayError::UngueltigesPaket(e.to_string())),
    }
}

fn register_handler(
    router: &RelayRouter,
    ctx: &RequestContext,
    paket: &RelayPacket,
) -> RelayResult<Outcome> {
    let alias = alias_aus_meta(paket)?;
    router.register(&alias, &ctx.absender)?;
    Ok(Outcome::Antwort(RelayPacket::antwort_ok(paket.meta.request_id)))
}

fn unregister_handler(
    router: &RelayRouter,
    ctx: &RequestContext,
    paket: &RelayPacket,
) -> RelayResult<Outcome> {
    let alias = alias_aus_meta(paket)?;
    router.unregister(&alias, &ctx.absender)?;
    Ok(Outcome::Antwort(RelayPacket::antwort_ok(paket.meta.request_id)))
}

fn proxy_handler(
    router: &RelayRouter,
    ctx: &RequestContext,
    paket: &RelayPacket,
) -> RelayResult<Outcome> {
    let directive = router.proxy(
        &ctx.absender,
        paket.meta.relay_to.as_deref().unwrap_or_default(),
        paket.meta.content.unwrap_or(Content::Audio),
        paket.payload.clone(),
    )?;
    Ok(Outcome::Weiterleiten(directive))
}

// ---------------------------------------------------------------------------
// RelayRouter
// ---------------------------------------------------------------------------

/// Zentraler Relay-Router
///
/// Thread-safe und `Clone`-faehig (innerer Arc).
#[derive(Clone)]
pub struct RelayRouter {
    inner: Arc<RelayRouterInner>,
}

struct RelayRouterInner {
    registry: Arc<AliasRegistry>,
    dispatch: DispatchTable,
    metriken: Option<RelayMetrics>,
}

impl RelayRouter {
    /// Erstellt den Router und prueft die Dispatch-Tabelle
    pub fn neu(registry: Arc<AliasRegistry>) -> RelayResult<Self> {
        Self::bauen(registry, None)
    }

    /// Wie `neu`, zaehlt zusaetzlich Anfragen und Weiterleitungen
    pub fn mit_metriken(registry: Arc<AliasRegistry>, metriken: RelayMetrics) -> RelayResult<Self> {
        Self::bauen(registry, Some(metriken))
    }

    fn bauen(registry: Arc<AliasRegistry>, metriken: Option<RelayMetrics>) -> RelayResult<Self> {
        let dispatch = DispatchTable::bauen(&standard_eintraege())?;

        Ok(Self {
            inner: Arc::new(RelayRouterInner {
                registry,
                dispatch,
                metriken,
            }),
        })
    }

    pub fn registry(&self) -> &Arc<AliasRegistry> {
        &self.inner.registry
    }

    /// Registriert `alias` unter der Absender-Adresse
    pub fn register(&self, alias: &Alias, von: &Address) -> RelayResult<()> {
        if !self.inner.registry.try_add(alias.clone(), von.clone()) {
            debug!(alias = %alias, von = %von, "Alias bereits vergeben");
            return Err(RelayError::BereitsRegistriert(alias.to_string()));
        }
        info!(alias = %alias, adresse = %von, "Alias registriert");
        self.aliase_zaehlen();
        Ok(())
    }

    /// Hebt die Registrierung auf; nur der Besitzer darf das
    pub fn unregister(&self, alias: &Alias, von: &Address) -> RelayResult<()> {
        let registry = &self.inner.registry;
        match registry.get_by_alias(alias.as_str()) {
            None => return Err(RelayError::NichtRegistriert(alias.to_string())),
            Some(adresse) if adresse != *von => {
                return Err(RelayError::NichtBerechtigt(format!(
                    "{von} besitzt den Alias {alias} nicht"
                )))
            }
            Some(_) => {}
        }
        // Zwischen Lookup und Loeschen kann ein anderer Aufruf den Alias entfernt haben
        if !registry.delete_if_owned(alias.as_str(), von) {
            return Err(RelayError::NichtRegistriert(alias.to_string()));
        }
        info!(alias = %alias, adresse = %von, "Alias abgemeldet");
        self.aliase_zaehlen();
        Ok(())
    }

    /// Loest `relay_to` auf und erzeugt die Weiterleitungs-Anweisung
    ///
    /// Pruefreihenfolge: Absender registriert, Ziel angegeben, Ziel registriert.
    pub fn proxy(
        &self,
        von: &Address,
        relay_to: &str,
        content: Content,
        payload: Bytes,
    ) -> RelayResult<ForwardDirective> {
        let registry = &self.inner.registry;

        let absender_alias = registry.get_by_address(von).ok_or_else(|| {
            RelayError::NichtBerechtigt(format!("Absender {von} ist nicht registriert"))
        })?;

        if relay_to.is_empty() {
            return Err(RelayError::ZielFehlt);
        }

        let ziel = registry
            .get_by_alias(relay_to)
            .ok_or_else(|| RelayError::UnbekannterAlias(relay_to.to_string()))?;

        trace!(
            von = %absender_alias,
            an = relay_to,
            bytes = payload.len(),
            "Paket wird weitergeleitet"
        );

        Ok(ForwardDirective {
            ziel,
            paket: RelayPacket {
                meta: PacketMeta {
                    relay_to: Some(relay_to.to_string()),
                    relay_from: Some(absender_alias.to_string()),
                    relay_from_addr: Some(von.to_string()),
                    content: Some(content),
                    ..Default::default()
                },
                payload,
            },
        })
    }

    /// Verarbeitet ein dekodiertes Paket ueber die Dispatch-Tabelle
    ///
    /// Fehler werden nie nach aussen gereicht, sondern als Fehler-Antwort an
    /// den Absender formuliert.
    pub fn handle(&self, ctx: &RequestContext, paket: &RelayPacket) -> Outcome {
        let ergebnis = match paket.meta.target {
            Some(target) => {
                if let Some(m) = &self.inner.metriken {
                    m.anfrage(target.as_str());
                }
                match self.inner.dispatch.handler(target) {
                    Some(handler) => handler(self, ctx, paket),
                    None => Err(RelayError::HandlerFehlt(target)),
                }
            }
            None => Err(RelayError::UngueltigesPaket(
                "Operation (target) fehlt".to_string(),
            )),
        };

        match ergebnis {
            Ok(outcome) => {
                if let (Some(m), Outcome::Weiterleiten(d)) = (&self.inner.metriken, &outcome) {
                    m.weitergeleitet(d.paket.payload.len());
                }
                outcome
            }
            Err(fehler) => {
                debug!(
                    absender = %ctx.absender,
                    code = %fehler.code(),
                    fehler = %fehler,
                    "Anfrage abgelehnt"
                );
                if let Some(m) = &self.inner.metriken {
                    m.abgelehnt(fehler.code().as_str());
                }
                Outcome::Antwort(RelayPacket::antwort_fehler(
                    paket.meta.request_id,
                    fehler.code(),
                    fehler.to_string(),
                ))
            }
        }
    }

    fn aliase_zaehlen(&self) {
        if let Some(m) = &self.inner.metriken {
            m.aliase_setzen(self.inner.registry.len());
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use ipcall_protocol::{ErrorCode, Status};

    fn alias(name: &str) -> Alias {
        Alias::new(name).unwrap()
    }

    fn adresse(port: u16) -> Address {
        Address::new(format!("10.0.0.1:{port}"))
    }

    fn router() -> RelayRouter {
        RelayRouter::neu(Arc::new(AliasRegistry::neu())).unwrap()
    }

    fn fehlercode(outcome: &Outcome) -> Option<ErrorCode> {
        match outcome {
            Outcome::Antwort(p) => p.meta.code,
            Outcome::Weiterleiten(_) => None,
        }
    }

    #[test]
    fn dispatch_tabelle_unvollstaendig() {
        let eintraege: Vec<(Target, Handler)> =
            vec![(Target::Register, register_handler as Handler)];
        assert!(matches!(
            DispatchTable::bauen(&eintraege),
            Err(RelayError::HandlerFehlt(_))
        ));
    }

    #[test]
    fn standard_eintraege_decken_alle_targets() {
        let tabelle = DispatchTable::bauen(&standard_eintraege()).unwrap();
        for target in Target::ALLE {
            assert!(tabelle.handler(target).is_some(), "{target:?}");
        }
    }

    #[test]
    fn dispatch_tabelle_doppelt() {
        let eintraege: Vec<(Target, Handler)> = vec![
            (Target::Register, register_handler as Handler),
            (Target::Register, unregister_handler as Handler),
        ];
        assert!(matches!(
            DispatchTable::bauen(&eintraege),
            Err(RelayError::HandlerDoppelt(Target::Register))
        ));
    }

    #[test]
    fn doppelte_registrierung_abgelehnt() {
        let r = router();
        r.register(&alias("alice"), &adresse(1)).unwrap();

        let err = r.register(&alias("alice"), &adresse(2)).unwrap_err();
        assert_eq!(err.code(), ErrorCode::AlreadyRegistered);

        // Registry unveraendert
        assert_eq!(r.registry().get_by_alias("alice"), Some(adresse(1)));
        assert_eq!(r.registry().get_by_address(&adresse(2)), None);
    }

    #[test]
    fn unregister_nur_durch_besitzer() {
        let r = router();
        r.register(&alias("alice"), &adresse(1)).unwrap();

        let err = r.unregister(&alias("alice"), &adresse(9)).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Unauthorized);
        assert_eq!(r.registry().get_by_alias("alice"), Some(adresse(1)));

        r.unregister(&alias("alice"), &adresse(1)).unwrap();
        assert!(r.registry().is_empty());
    }

    #[test]
    fn unregister_unbekannt() {
        let r = router();
        let err = r.unregister(&alias("alice"), &adresse(1)).unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotRegistered);
    }

    #[test]
    fn proxy_pruefreihenfolge() {
        let r = router();

        // Absender nicht registriert schlaegt vor unbekanntem Ziel zu
        let err = r
            .proxy(&adresse(1), "bob", Content::Audio, Bytes::new())
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Unauthorized);

        r.register(&alias("alice"), &adresse(1)).unwrap();

        let err = r
            .proxy(&adresse(1), "", Content::Audio, Bytes::new())
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::MissingTarget);

        let err = r
            .proxy(&adresse(1), "bob", Content::Audio, Bytes::new())
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::UnknownAlias);
    }

    #[test]
    fn proxy_annotiert_absender_und_ziel() {
        let r = router();
        r.register(&alias("alice"), &adresse(1)).unwrap();
        r.register(&alias("bob"), &adresse(2)).unwrap();

        let payload = Bytes::from_static(b"opaque");
        let d = r
            .proxy(&adresse(1), "bob", Content::Audio, payload.clone())
            .unwrap();

        assert_eq!(d.ziel, adresse(2));
        assert_eq!(d.paket.payload, payload);
        assert_eq!(d.paket.meta.relay_from.as_deref(), Some("alice"));
        assert_eq!(d.paket.meta.relay_to.as_deref(), Some("bob"));
        assert_eq!(d.paket.meta.relay_from_addr.as_deref(), Some("10.0.0.1:1"));
        assert_eq!(d.paket.meta.target, None);
    }

    #[test]
    fn handle_register_ohne_alias() {
        let r = router();
        let mut paket = RelayPacket::register(&alias("alice"), 4);
        paket.meta.alias = None;

        let outcome = r.handle(&RequestContext::neu(adresse(1)), &paket);
        assert_eq!(fehlercode(&outcome), Some(ErrorCode::MissingAlias));
        assert!(r.registry().is_empty());
    }

    #[test]
    fn handle_antwort_traegt_request_id() {
        let r = router();
        let outcome = r.handle(
            &RequestContext::neu(adresse(1)),
            &RelayPacket::register(&alias("alice"), 42),
        );
        match outcome {
            Outcome::Antwort(p) => {
                assert_eq!(p.meta.status, Some(Status::Ok));
                assert_eq!(p.meta.request_id, Some(42));
            }
            andere => panic!("Antwort erwartet, erhalten {andere:?}"),
        }
    }

    #[test]
    fn handle_ohne_target_ist_malformed() {
        let r = router();
        let outcome = r.handle(
            &RequestContext::neu(adresse(1)),
            &RelayPacket::antwort_ok(None),
        );
        assert_eq!(fehlercode(&outcome), Some(ErrorCode::Malformed));
    }

    #[test]
    fn handle_proxy_leitet_weiter() {
        let r = router();
        let ctx_a = RequestContext::neu(adresse(1));
        r.handle(&ctx_a, &RelayPacket::register(&alias("alice"), 1));
        r.handle(
            &RequestContext::neu(adresse(2)),
            &RelayPacket::register(&alias("bob"), 1),
        );

        let outcome = r.handle(
            &ctx_a,
            &RelayPacket::proxy(&alias("bob"), Content::KeyExchange, vec![1u8, 2]),
        );
        match outcome {
            Outcome::Weiterleiten(d) => {
                assert_eq!(d.ziel, adresse(2));
                assert_eq!(d.paket.meta.content, Some(Content::KeyExchange));
            }
            andere => panic!("Weiterleitung erwartet, erhalten {andere:?}"),
        }
    }

    #[test]
    fn metriken_werden_gezaehlt() {
        let metriken = RelayMetrics::neu().unwrap();
        let r = RelayRouter::mit_metriken(Arc::new(AliasRegistry::neu()), metriken.clone())
            .unwrap();
        let ctx = RequestContext::neu(adresse(1));

        r.handle(&ctx, &RelayPacket::register(&alias("alice"), 1));
        r.handle(&ctx, &RelayPacket::register(&alias("alice"), 2));

        assert_eq!(metriken.registered_aliases.get(), 1);
        assert_eq!(
            metriken
                .requests_total
                .with_label_values(&["register"])
                .get(),
            2
        );
        assert_eq!(
            metriken
                .rejections_total
                .with_label_values(&["already_registered"])
                .get(),
            1
        );
    }
}
