//! Event-Routing vom Bus in die Weichen-Registry.
//!
//! Zwei Nachrichtenarten laufen hier zusammen: unaufgeforderte EventReports
//! und ProducerIdentified-Antworten auf Zustandsabfragen. Beide münden in
//! dieselbe Routing-Funktion. Unbekannte Events werden im Discovery-Modus
//! an einen Callback gemeldet (Anlern-Flow), sonst still verworfen.

use super::BusInterface;
use crate::core::registry::TurnoutRegistry;
use crate::core::turnout::{EventId, TurnoutState};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Callback für unbekannte Event-IDs im Discovery-Modus.
pub type DiscoveryCallback = Arc<dyn Fn(EventId) + Send + Sync>;

/// Leitet Bus-Events in die Registry und bedient den Discovery-Modus.
pub struct EventRouter {
    registry: Arc<TurnoutRegistry>,
    discovery_mode: AtomicBool,
    discovery_callback: Mutex<Option<DiscoveryCallback>>,
}

impl EventRouter {
    /// Erstellt einen Router über der Registry.
    pub fn new(registry: Arc<TurnoutRegistry>) -> Self {
        Self {
            registry,
            discovery_mode: AtomicBool::new(false),
            discovery_callback: Mutex::new(None),
        }
    }

    /// Schaltet den Discovery-Modus ein/aus.
    pub fn set_discovery_mode(&self, enabled: bool) {
        self.discovery_mode.store(enabled, Ordering::SeqCst);
        log::info!(
            "Discovery-Modus {}",
            if enabled { "aktiviert" } else { "deaktiviert" }
        );
    }

    /// Liefert ob der Discovery-Modus aktiv ist.
    pub fn is_discovery_mode(&self) -> bool {
        self.discovery_mode.load(Ordering::SeqCst)
    }

    /// Registriert den Discovery-Callback (None = abmelden).
    pub fn set_discovery_callback(&self, cb: Option<DiscoveryCallback>) {
        let mut slot = self
            .discovery_callback
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        *slot = cb;
    }

    /// Unaufgefordertes EventReport vom Bus.
    pub fn on_event_report(&self, event: EventId) {
        self.route(event);
    }

    /// ProducerIdentified-Antwort auf eine Zustandsabfrage.
    ///
    /// Produzenten antworten für BEIDE Event-IDs einer Weiche; nur die als
    /// gültig/aktiv gemeldete beschreibt die tatsächliche Stellung, die
    /// inaktive Gegenseite wird verworfen.
    pub fn on_producer_identified(&self, event: EventId, is_valid: bool) {
        if !is_valid {
            return;
        }
        self.route(event);
    }

    fn route(&self, event: EventId) {
        if let Some(index) = self.registry.find_by_event(event) {
            if let Some(t) = self.registry.get(index) {
                let state = if event == t.event_normal {
                    TurnoutState::Normal
                } else {
                    TurnoutState::Reverse
                };
                self.registry.set_state_by_event(event, state);
            }
        } else if self.is_discovery_mode() {
            let cb = self
                .discovery_callback
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .clone();
            if let Some(cb) = cb {
                log::info!("Discovery: unbekanntes Event {}", event);
                cb(event);
            }
        }
    }

    /// Fragt den Zustand aller Weichen ab.
    ///
    /// Pro Weiche eine IdentifyProducer-Abfrage für die Normal-ID, dann
    /// nach der halben Pace-Intervalldauer die Reverse-ID und die zweite
    /// Hälfte warten. Die Buslast bleibt so unabhängig von der Größe der
    /// Weichenliste bei einem Abfragepaar pro Intervall.
    pub fn query_all(&self, bus: &dyn BusInterface, pace: Duration) {
        let pairs: Vec<(EventId, EventId)> = self
            .registry
            .with_all(|all| all.iter().map(|t| (t.event_normal, t.event_reverse)).collect());

        log::info!(
            "Frage Zustand von {} Weichen ab (Pace {} ms)",
            pairs.len(),
            pace.as_millis()
        );

        let half = pace / 2;
        for (event_normal, event_reverse) in pairs {
            if let Err(e) = bus.query_producer(event_normal) {
                log::warn!("Abfrage {} fehlgeschlagen: {}", event_normal, e);
            }
            std::thread::sleep(half);
            if let Err(e) = bus.query_producer(event_reverse) {
                log::warn!("Abfrage {} fehlgeschlagen: {}", event_reverse, e);
            }
            std::thread::sleep(half);
        }

        log::info!("Zustandsabfrage abgeschlossen");
    }

    /// Fragt den Zustand einer einzelnen Weiche ab (beide Event-IDs,
    /// ohne Pacing — etwa direkt nach dem Anlegen).
    pub fn query_turnout_state(
        &self,
        bus: &dyn BusInterface,
        event_normal: EventId,
        event_reverse: EventId,
    ) {
        if let Err(e) = bus.query_producer(event_normal) {
            log::warn!("Abfrage {} fehlgeschlagen: {}", event_normal, e);
        }
        if let Err(e) = bus.query_producer(event_reverse) {
            log::warn!("Abfrage {} fehlgeschlagen: {}", event_reverse, e);
        }
        log::info!("Zustand abgefragt für {} / {}", event_normal, event_reverse);
    }
}
