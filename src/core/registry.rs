//! Die zentrale Weichen-Registry: Definitionstabelle plus Live-Zustand.
//!
//! Thread-sicher über genau ein Mutex um die gesamte Tabelle. Zwei Threads
//! greifen gleichzeitig zu: der Netzwerk-Thread (Event-Routing, Query-All)
//! und der UI-Thread (Bedieneraktionen, Stale-Sweep). Der registrierte
//! State-Callback wird grundsätzlich NACH Freigabe des Locks aufgerufen —
//! ein Callback darf selbst wieder in die Registry rufen, ohne zu verklemmen.

use super::turnout::{EventId, Turnout, TurnoutState};
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Maximale Anzahl verwalteter Weichen.
pub const MAX_TURNOUTS: usize = 64;

/// Callback für Zustandsänderungen: (Tabellenindex, neuer Zustand).
/// Trägt Daten, nie Zeiger in fremde Objekte.
pub type StateCallback = Arc<dyn Fn(usize, TurnoutState) + Send + Sync>;

/// Lokale, nicht-fatale Ablehnungen der Registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// Eine der Event-IDs existiert bereits (als Normal- oder Reverse-ID)
    #[error("Event-ID bereits vergeben")]
    DuplicateEvent,
    /// Tabellenkapazität erschöpft
    #[error("Weichen-Limit erreicht ({MAX_TURNOUTS})")]
    Full,
    /// Index außerhalb der Tabelle
    #[error("Ungueltiger Weichen-Index")]
    InvalidIndex,
}

/// Eine Weichendefinition ohne Live-Zustand (Lade-/Import-Pfad).
#[derive(Debug, Clone)]
pub struct TurnoutDef {
    /// Anzeigename (leer = Standardname wird vergeben)
    pub name: String,
    /// Event-ID für NORMAL
    pub event_normal: EventId,
    /// Event-ID für REVERSE
    pub event_reverse: EventId,
    /// Anzeige-Sortierhinweis
    pub user_order: u16,
}

struct Table {
    turnouts: Vec<Turnout>,
    next_id: u32,
}

/// Registry aller Weichendefinitionen und ihres Live-Zustands.
pub struct TurnoutRegistry {
    table: Mutex<Table>,
    callback: Mutex<Option<StateCallback>>,
    /// Monotone Zeitbasis für `last_update_us`
    started: Instant,
}

impl Default for TurnoutRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TurnoutRegistry {
    /// Erstellt eine leere Registry.
    pub fn new() -> Self {
        Self {
            table: Mutex::new(Table {
                turnouts: Vec::new(),
                next_id: 1,
            }),
            callback: Mutex::new(None),
            started: Instant::now(),
        }
    }

    /// Monotoner Zeitstempel in µs seit Registry-Erzeugung, nie 0
    /// (0 ist für "nie aktualisiert" reserviert).
    fn now_us(&self) -> u64 {
        (self.started.elapsed().as_micros() as u64).max(1)
    }

    fn lock_table(&self) -> std::sync::MutexGuard<'_, Table> {
        // Ein vergifteter Mutex heißt: ein anderer Thread ist in der
        // Tabellen-Mutation gepaniced. Weiterarbeiten mit den Daten ist
        // hier vertretbar, die Tabelle kennt keine teilfertigen Zustände.
        self.table.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Registriert den Zustands-Callback (None = abmelden).
    pub fn set_state_callback(&self, cb: Option<StateCallback>) {
        let mut slot = self.callback.lock().unwrap_or_else(|e| e.into_inner());
        *slot = cb;
    }

    fn current_callback(&self) -> Option<StateCallback> {
        self.callback
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    // ── Queries ─────────────────────────────────────────────────────

    /// Anzahl verwalteter Weichen.
    pub fn len(&self) -> usize {
        self.lock_table().turnouts.len()
    }

    /// Prüft ob die Registry leer ist.
    pub fn is_empty(&self) -> bool {
        self.lock_table().turnouts.is_empty()
    }

    /// Kopie einer Weiche nach Index.
    pub fn get(&self, index: usize) -> Option<Turnout> {
        self.lock_table().turnouts.get(index).cloned()
    }

    /// Ganztabellen-Lesezugriff unter dem Lock.
    ///
    /// Der Borrow lebt nur innerhalb der Closure — eine Referenz in die
    /// Tabelle kann so strukturell nicht über die kritische Sektion hinaus
    /// gehalten werden.
    pub fn with_all<R>(&self, f: impl FnOnce(&[Turnout]) -> R) -> R {
        let table = self.lock_table();
        f(&table.turnouts)
    }

    /// Konsistenter Schnappschuss der Tabelle (für Persistenz:
    /// Schnappschuss unter dem Lock, Schreiben außerhalb).
    pub fn snapshot(&self) -> Vec<Turnout> {
        self.lock_table().turnouts.clone()
    }

    /// Findet den Index zur Event-ID (Normal- oder Reverse-Seite).
    pub fn find_by_event(&self, event: EventId) -> Option<usize> {
        self.lock_table()
            .turnouts
            .iter()
            .position(|t| t.matches_event(event))
    }

    // ── Mutations ───────────────────────────────────────────────────

    /// Fügt eine neue Weiche hinzu.
    ///
    /// Abgelehnt wenn eine der beiden Event-IDs bereits in der Tabelle
    /// vorkommt (egal auf welcher Seite) oder die Kapazität erschöpft ist.
    /// Leerer Name ⇒ `"Turnout N"`. Zustand startet als `Unknown`.
    pub fn add(
        &self,
        event_normal: EventId,
        event_reverse: EventId,
        name: &str,
    ) -> Result<usize, RegistryError> {
        self.insert(event_normal, event_reverse, name, None)
    }

    /// Fügt eine geladene/importierte Definition hinzu (behält `user_order`).
    pub fn add_def(&self, def: &TurnoutDef) -> Result<usize, RegistryError> {
        self.insert(
            def.event_normal,
            def.event_reverse,
            &def.name,
            Some(def.user_order),
        )
    }

    /// Gemeinsamer Einfügepfad; eine einzige kritische Sektion, damit
    /// `user_order` nie auf einen zwischenzeitlich verschobenen Slot trifft.
    fn insert(
        &self,
        event_normal: EventId,
        event_reverse: EventId,
        name: &str,
        user_order: Option<u16>,
    ) -> Result<usize, RegistryError> {
        let mut table = self.lock_table();

        if table.turnouts.len() >= MAX_TURNOUTS {
            log::warn!("Weichen-Limit erreicht ({})", MAX_TURNOUTS);
            return Err(RegistryError::Full);
        }

        if table
            .turnouts
            .iter()
            .any(|t| t.matches_event(event_normal) || t.matches_event(event_reverse))
        {
            log::warn!("Event-ID doppelt — Weiche existiert bereits");
            return Err(RegistryError::DuplicateEvent);
        }

        let index = table.turnouts.len();
        let id = table.next_id;
        table.next_id += 1;

        let name = if name.is_empty() {
            format!("Turnout {}", index + 1)
        } else {
            name.to_string()
        };

        let mut turnout = Turnout::new(id, name, event_normal, event_reverse);
        turnout.user_order = user_order.unwrap_or(index as u16);
        log::info!("Weiche '{}' an Index {} angelegt", turnout.name, index);
        table.turnouts.push(turnout);

        Ok(index)
    }

    /// Entfernt eine Weiche; die Tabelle wird unter Erhalt der Reihenfolge
    /// kompaktiert. IDs werden nicht wiederverwendet.
    pub fn remove(&self, index: usize) -> Result<(), RegistryError> {
        let mut table = self.lock_table();
        if index >= table.turnouts.len() {
            return Err(RegistryError::InvalidIndex);
        }
        let removed = table.turnouts.remove(index);
        log::info!("Weiche '{}' an Index {} entfernt", removed.name, index);
        Ok(())
    }

    /// Benennt eine Weiche um.
    pub fn rename(&self, index: usize, name: &str) -> Result<(), RegistryError> {
        let mut table = self.lock_table();
        let t = table
            .turnouts
            .get_mut(index)
            .ok_or(RegistryError::InvalidIndex)?;
        t.name = name.to_string();
        Ok(())
    }

    /// Vertauscht zwei Tabellenplätze (Umsortierung durch den Bediener).
    pub fn swap(&self, a: usize, b: usize) -> Result<(), RegistryError> {
        let mut table = self.lock_table();
        if a >= table.turnouts.len() || b >= table.turnouts.len() {
            return Err(RegistryError::InvalidIndex);
        }
        table.turnouts.swap(a, b);
        Ok(())
    }

    /// Setzt das Befehl-ausstehend-Flag. Außerhalb der Tabelle: No-op.
    pub fn set_pending(&self, index: usize, pending: bool) {
        let mut table = self.lock_table();
        if let Some(t) = table.turnouts.get_mut(index) {
            t.command_pending = pending;
        }
    }

    /// Aktualisiert den Zustand aus einem Bus-Event.
    ///
    /// Linearer Scan über Normal-/Reverse-IDs; bei Treffer: Zustand setzen,
    /// `last_update` stempeln, `command_pending` löschen, Callback nach
    /// Lock-Freigabe aufrufen. Kein Treffer ⇒ stilles No-op (der Router
    /// leitet unbekannte Events separat an die Discovery weiter).
    pub fn set_state_by_event(&self, event: EventId, state: TurnoutState) {
        let notify = {
            let mut table = self.lock_table();
            let now = self.now_us();
            match table.turnouts.iter_mut().enumerate().find(|(_, t)| t.matches_event(event)) {
                Some((index, t)) => {
                    t.state = state;
                    t.last_update_us = now;
                    t.command_pending = false;
                    log::debug!("Weiche '{}' -> {:?}", t.name, state);
                    Some((index, state))
                }
                None => None,
            }
        };

        if let Some((index, state)) = notify {
            if let Some(cb) = self.current_callback() {
                cb(index, state);
            }
        }
    }

    /// Markiert Weichen ohne frische Rückmeldung als `Stale`.
    ///
    /// Betroffen sind nur Weichen in Normal/Reverse mit gestempeltem
    /// `last_update`, dessen Alter `timeout_ms` übersteigt — jede höchstens
    /// einmal pro Sweep. Callbacks laufen nach Freigabe des Locks.
    /// `timeout_ms == 0` deaktiviert den Sweep.
    pub fn check_stale(&self, timeout_ms: u64) {
        if timeout_ms == 0 {
            return;
        }

        let threshold_us = timeout_ms.saturating_mul(1000);
        let now = self.now_us();

        let mut stale: Vec<usize> = Vec::new();
        {
            let mut table = self.lock_table();
            for (index, t) in table.turnouts.iter_mut().enumerate() {
                let live = matches!(t.state, TurnoutState::Normal | TurnoutState::Reverse);
                if live && t.last_update_us > 0 && now.saturating_sub(t.last_update_us) > threshold_us
                {
                    t.state = TurnoutState::Stale;
                    log::warn!(
                        "Weiche '{}' als STALE markiert (keine Rückmeldung seit {} ms)",
                        t.name,
                        timeout_ms
                    );
                    stale.push(index);
                }
            }
        }

        if stale.is_empty() {
            return;
        }
        if let Some(cb) = self.current_callback() {
            for index in stale {
                cb(index, TurnoutState::Stale);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const EV_N: EventId = EventId(0x0501010122600000);
    const EV_R: EventId = EventId(0x0501010122600001);

    fn recorded() -> (StateCallback, Arc<Mutex<Vec<(usize, TurnoutState)>>>) {
        let log: Arc<Mutex<Vec<(usize, TurnoutState)>>> = Arc::new(Mutex::new(Vec::new()));
        let log2 = log.clone();
        let cb: StateCallback = Arc::new(move |index, state| {
            log2.lock().unwrap().push((index, state));
        });
        (cb, log)
    }

    #[test]
    fn test_add_and_state_by_event() {
        let reg = TurnoutRegistry::new();
        let idx = reg.add(EV_N, EV_R, "T1").expect("Add erwartet");
        assert_eq!(idx, 0);
        assert_eq!(reg.get(0).unwrap().state, TurnoutState::Unknown);
        assert_eq!(reg.get(0).unwrap().last_update_us, 0);

        reg.set_state_by_event(EV_N, TurnoutState::Normal);
        let t = reg.get(0).unwrap();
        assert_eq!(t.state, TurnoutState::Normal);
        assert!(t.last_update_us > 0);
        assert!(!t.command_pending);

        reg.set_state_by_event(EV_R, TurnoutState::Reverse);
        assert_eq!(reg.get(0).unwrap().state, TurnoutState::Reverse);
    }

    #[test]
    fn test_duplicate_event_rejected_cross_sides() {
        let reg = TurnoutRegistry::new();
        reg.add(EV_N, EV_R, "T1").unwrap();

        // Gleiche Normal-ID
        assert_eq!(
            reg.add(EV_N, EventId(0x99), "X"),
            Err(RegistryError::DuplicateEvent)
        );
        // Fremde Normal-ID kollidiert mit bestehender Reverse-ID
        assert_eq!(
            reg.add(EV_R, EventId(0x99), "X"),
            Err(RegistryError::DuplicateEvent)
        );
        // Reverse-Seite kollidiert mit bestehender Normal-ID
        assert_eq!(
            reg.add(EventId(0x99), EV_N, "X"),
            Err(RegistryError::DuplicateEvent)
        );
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_add_def_keeps_order_on_its_turnout_under_reorder() {
        let reg = Arc::new(TurnoutRegistry::new());
        reg.add(EventId(1000), EventId(1001), "A").unwrap();
        reg.add(EventId(1002), EventId(1003), "B").unwrap();

        // Parallel umsortieren, während Definitionen eingefügt werden:
        // die user_order muss immer an der Weiche mit den passenden
        // Event-IDs landen, nie an einem verschobenen Slot.
        let swapper = {
            let reg = reg.clone();
            std::thread::spawn(move || {
                for _ in 0..500 {
                    let _ = reg.swap(0, 1);
                }
            })
        };

        for i in 0..32u64 {
            let def = TurnoutDef {
                name: format!("D{}", i),
                event_normal: EventId(i * 2),
                event_reverse: EventId(i * 2 + 1),
                user_order: 100 + i as u16,
            };
            reg.add_def(&def).expect("Add erwartet");
        }
        swapper.join().expect("Swapper-Thread");

        reg.with_all(|all| {
            for t in all {
                if t.event_normal.0 < 1000 {
                    assert_eq!(t.user_order, 100 + (t.event_normal.0 / 2) as u16);
                }
            }
        });
    }

    #[test]
    fn test_capacity_limit() {
        let reg = TurnoutRegistry::new();
        for i in 0..MAX_TURNOUTS as u64 {
            reg.add(EventId(i * 2), EventId(i * 2 + 1), "")
                .expect("unterhalb Kapazität");
        }
        assert_eq!(
            reg.add(EventId(9000), EventId(9001), "X"),
            Err(RegistryError::Full)
        );
    }

    #[test]
    fn test_default_name_assigned() {
        let reg = TurnoutRegistry::new();
        reg.add(EV_N, EV_R, "").unwrap();
        assert_eq!(reg.get(0).unwrap().name, "Turnout 1");
    }

    #[test]
    fn test_remove_compacts_and_keeps_ids() {
        let reg = TurnoutRegistry::new();
        reg.add(EventId(1), EventId(2), "A").unwrap();
        reg.add(EventId(3), EventId(4), "B").unwrap();
        reg.add(EventId(5), EventId(6), "C").unwrap();

        reg.remove(1).unwrap();
        assert_eq!(reg.len(), 2);
        assert_eq!(reg.get(0).unwrap().name, "A");
        assert_eq!(reg.get(1).unwrap().name, "C");
        // Session-IDs bleiben stabil, werden nicht neu vergeben
        assert_eq!(reg.get(0).unwrap().id, 1);
        assert_eq!(reg.get(1).unwrap().id, 3);
        reg.add(EventId(7), EventId(8), "D").unwrap();
        assert_eq!(reg.get(2).unwrap().id, 4);

        assert_eq!(reg.remove(5), Err(RegistryError::InvalidIndex));
    }

    #[test]
    fn test_find_by_event_after_mutations() {
        let reg = TurnoutRegistry::new();
        reg.add(EventId(1), EventId(2), "A").unwrap();
        reg.add(EventId(3), EventId(4), "B").unwrap();

        assert_eq!(reg.find_by_event(EventId(4)), Some(1));
        reg.swap(0, 1).unwrap();
        assert_eq!(reg.find_by_event(EventId(4)), Some(0));
        reg.remove(0).unwrap();
        assert_eq!(reg.find_by_event(EventId(4)), None);
        assert_eq!(reg.find_by_event(EventId(1)), Some(0));
    }

    #[test]
    fn test_rename_and_pending() {
        let reg = TurnoutRegistry::new();
        reg.add(EV_N, EV_R, "alt").unwrap();
        reg.rename(0, "neu").unwrap();
        assert_eq!(reg.get(0).unwrap().name, "neu");
        assert_eq!(reg.rename(7, "x"), Err(RegistryError::InvalidIndex));

        reg.set_pending(0, true);
        assert!(reg.get(0).unwrap().command_pending);
        // Rückmeldung löscht das Pending-Flag
        reg.set_state_by_event(EV_N, TurnoutState::Normal);
        assert!(!reg.get(0).unwrap().command_pending);
    }

    #[test]
    fn test_callback_fires_outside_lock() {
        let reg = Arc::new(TurnoutRegistry::new());
        reg.add(EV_N, EV_R, "T1").unwrap();

        // Der Callback ruft selbst wieder in die Registry — darf nicht
        // verklemmen, weil das Lock beim Aufruf freigegeben ist.
        let reg2 = reg.clone();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits2 = hits.clone();
        reg.set_state_callback(Some(Arc::new(move |index, _state| {
            assert_eq!(reg2.find_by_event(EV_N), Some(index));
            hits2.fetch_add(1, Ordering::SeqCst);
        })));

        reg.set_state_by_event(EV_N, TurnoutState::Normal);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_no_callback_on_unknown_event() {
        let reg = TurnoutRegistry::new();
        reg.add(EV_N, EV_R, "T1").unwrap();
        let (cb, log) = recorded();
        reg.set_state_callback(Some(cb));

        reg.set_state_by_event(EventId(0xDEAD), TurnoutState::Normal);
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(reg.get(0).unwrap().state, TurnoutState::Unknown);
    }

    #[test]
    fn test_stale_sweep_marks_exactly_once_and_resets() {
        let reg = Arc::new(TurnoutRegistry::new());
        reg.add(EV_N, EV_R, "T1").unwrap();
        let (cb, log) = recorded();
        reg.set_state_callback(Some(cb));

        reg.set_state_by_event(EV_N, TurnoutState::Normal);
        std::thread::sleep(Duration::from_millis(80));

        reg.check_stale(20);
        assert_eq!(reg.get(0).unwrap().state, TurnoutState::Stale);

        // Zweiter Sweep: Stale bleibt, kein weiterer Callback
        reg.check_stale(20);
        let entries = log.lock().unwrap().clone();
        assert_eq!(
            entries,
            vec![(0, TurnoutState::Normal), (0, TurnoutState::Stale)]
        );

        // Eine frische Rückmeldung holt die Weiche aus Stale
        reg.set_state_by_event(EV_R, TurnoutState::Reverse);
        assert_eq!(reg.get(0).unwrap().state, TurnoutState::Reverse);
    }

    #[test]
    fn test_stale_skips_unknown_and_fresh() {
        let reg = TurnoutRegistry::new();
        reg.add(EventId(1), EventId(2), "nie gemeldet").unwrap();
        reg.add(EventId(3), EventId(4), "frisch").unwrap();
        reg.set_state_by_event(EventId(3), TurnoutState::Normal);

        // Großzügiger Timeout: nichts wird stale
        reg.check_stale(60_000);
        assert_eq!(reg.get(0).unwrap().state, TurnoutState::Unknown);
        assert_eq!(reg.get(1).unwrap().state, TurnoutState::Normal);

        // Timeout 0 deaktiviert den Sweep komplett
        std::thread::sleep(Duration::from_millis(10));
        reg.check_stale(0);
        assert_eq!(reg.get(1).unwrap().state, TurnoutState::Normal);
    }

    #[test]
    fn test_with_all_scoped_borrow() {
        let reg = TurnoutRegistry::new();
        reg.add(EventId(1), EventId(2), "A").unwrap();
        reg.add(EventId(3), EventId(4), "B").unwrap();

        let names: Vec<String> = reg.with_all(|all| all.iter().map(|t| t.name.clone()).collect());
        assert_eq!(names, vec!["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn test_concurrent_events_and_queries() {
        let reg = Arc::new(TurnoutRegistry::new());
        for i in 0..8u64 {
            reg.add(EventId(i * 2), EventId(i * 2 + 1), "").unwrap();
        }

        let writer = {
            let reg = reg.clone();
            std::thread::spawn(move || {
                for round in 0..200u64 {
                    let i = round % 8;
                    reg.set_state_by_event(EventId(i * 2), TurnoutState::Normal);
                }
            })
        };
        let reader = {
            let reg = reg.clone();
            std::thread::spawn(move || {
                for _ in 0..200 {
                    let _ = reg.snapshot();
                    let _ = reg.find_by_event(EventId(5));
                }
            })
        };

        writer.join().expect("Writer-Thread");
        reader.join().expect("Reader-Thread");
        assert_eq!(reg.len(), 8);
    }
}
