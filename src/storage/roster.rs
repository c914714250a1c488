//! Persistenz der Weichenliste als `turnouts.json`.
//!
//! Event-IDs werden als menschenlesbare Dotted-Hex-Strings gespeichert
//! (analog zur nodeid.txt-Konvention). Dateiformat:
//!
//! ```json
//! {
//!   "version": 1,
//!   "turnouts": [
//!     {
//!       "name": "Turnout 1",
//!       "event_normal": "05.01.01.01.22.60.00.00",
//!       "event_reverse": "05.01.01.01.22.60.00.01",
//!       "order": 0
//!     }
//!   ]
//! }
//! ```

use crate::core::registry::TurnoutDef;
use crate::core::turnout::{EventId, Turnout};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

const ROSTER_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct RosterFile {
    #[serde(default)]
    version: Option<u32>,
    #[serde(default)]
    turnouts: Vec<RosterEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RosterEntry {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    event_normal: Option<String>,
    #[serde(default)]
    event_reverse: Option<String>,
    #[serde(default)]
    order: Option<u16>,
}

/// Lädt die Weichenliste.
///
/// Fehlende, unlesbare oder unparsebare Datei sowie unbekannte Version
/// ergeben eine leere Liste, nie einen Fehler. Defekte Einträge (fehlende
/// oder unparsebare Event-IDs) werden einzeln übersprungen und geloggt.
pub fn load(path: &Path) -> Vec<TurnoutDef> {
    if !path.exists() {
        log::info!("{} nicht gefunden — starte mit leerer Liste", path.display());
        return Vec::new();
    }

    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            log::warn!(
                "Konnte {} nicht lesen: {} — starte mit leerer Liste",
                path.display(),
                e
            );
            return Vec::new();
        }
    };

    let file: RosterFile = match serde_json::from_str(&content) {
        Ok(f) => f,
        Err(e) => {
            log::warn!("Weichenliste defekt: {} — starte mit leerer Liste", e);
            return Vec::new();
        }
    };

    if file.version != Some(ROSTER_VERSION) {
        log::warn!(
            "Unbekannte Weichenlisten-Version: {:?} — starte mit leerer Liste",
            file.version
        );
        return Vec::new();
    }

    let mut defs = Vec::new();
    for (i, entry) in file.turnouts.into_iter().enumerate() {
        let name = entry
            .name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| format!("Turnout {}", defs.len() + 1));

        let event_normal = match parse_entry_event(entry.event_normal.as_deref()) {
            Some(ev) => ev,
            None => {
                log::warn!("Überspringe Weiche '{}' — ungültige event_normal", name);
                continue;
            }
        };
        let event_reverse = match parse_entry_event(entry.event_reverse.as_deref()) {
            Some(ev) => ev,
            None => {
                log::warn!("Überspringe Weiche '{}' — ungültige event_reverse", name);
                continue;
            }
        };

        defs.push(TurnoutDef {
            name,
            event_normal,
            event_reverse,
            user_order: entry.order.unwrap_or(i as u16),
        });
    }

    log::info!("{} Weichen geladen aus {}", defs.len(), path.display());
    defs
}

fn parse_entry_event(raw: Option<&str>) -> Option<EventId> {
    raw?.parse().ok()
}

/// Speichert die Weichenliste (atomar, Temp-Datei + Rename).
/// Nur Definitionen werden persistiert, nie der Live-Zustand.
pub fn save(path: &Path, turnouts: &[Turnout]) -> Result<()> {
    let file = RosterFile {
        version: Some(ROSTER_VERSION),
        turnouts: turnouts
            .iter()
            .map(|t| RosterEntry {
                name: Some(t.name.clone()),
                event_normal: Some(t.event_normal.to_dotted_hex()),
                event_reverse: Some(t.event_reverse.to_dotted_hex()),
                order: Some(t.user_order),
            })
            .collect(),
    };

    let content = serde_json::to_string_pretty(&file)?;
    super::write_atomic(path, &content)?;
    log::info!("{} Weichen gespeichert nach {}", turnouts.len(), path.display());
    Ok(())
}
