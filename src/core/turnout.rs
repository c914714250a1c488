//! Weichen-Domänentypen: Event-ID, Zustand, Weichendefinition.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 64-Bit-Event-ID auf dem LCC-Bus.
///
/// Persistiert als menschenlesbarer Dotted-Hex-String mit 8 Oktetten
/// (z.B. `05.01.01.01.22.60.00.00`), analog zur nodeid.txt-Konvention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId(pub u64);

impl EventId {
    /// Formatiert die ID als Dotted-Hex-String (8 Gruppen à 2 Hex-Ziffern).
    pub fn to_dotted_hex(self) -> String {
        let b = self.0.to_be_bytes();
        format!(
            "{:02X}.{:02X}.{:02X}.{:02X}.{:02X}.{:02X}.{:02X}.{:02X}",
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]
        )
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_dotted_hex())
    }
}

/// Fehler beim Parsen einer Event-ID.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Ungueltige Event-ID: '{0}'")]
pub struct ParseEventIdError(pub String);

impl FromStr for EventId {
    type Err = ParseEventIdError;

    /// Parst Dotted-Hex (`05.01.01.01.22.60.00.00`) oder als Fallback
    /// einen reinen Hex-String (`0501010122600000`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();

        let parts: Vec<&str> = trimmed.split('.').collect();
        if parts.len() == 8 {
            let mut value: u64 = 0;
            let mut ok = true;
            for part in &parts {
                match u8::from_str_radix(part, 16) {
                    Ok(byte) if part.len() <= 2 => value = (value << 8) | u64::from(byte),
                    _ => {
                        ok = false;
                        break;
                    }
                }
            }
            if ok {
                return Ok(EventId(value));
            }
        }

        // Fallback: reiner Hex-String
        if !trimmed.is_empty() && trimmed.len() <= 16 {
            if let Ok(value) = u64::from_str_radix(trimmed, 16) {
                return Ok(EventId(value));
            }
        }

        Err(ParseEventIdError(trimmed.to_string()))
    }
}

/// Zustand einer Weiche
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TurnoutState {
    /// Noch keine Rückmeldung vom Bus empfangen
    #[default]
    Unknown,
    /// Gerade Stellung (geschlossen)
    Normal,
    /// Abzweigende Stellung (geworfen)
    Reverse,
    /// Letzte Rückmeldung älter als der Stale-Timeout
    Stale,
}

/// Eine Weichendefinition mit Live-Zustand.
///
/// Die `id` wird einmalig pro Sitzung vergeben (Session-Zähler) und solange
/// die Weiche existiert nie wiederverwendet. Sie ist nicht inhaltsadressiert
/// und wird nicht persistiert — das Panel-Layout referenziert Weichen über
/// diese ID, die beim Laden in Dateireihenfolge ab 1 vergeben wird.
#[derive(Debug, Clone)]
pub struct Turnout {
    /// Sitzungsstabile ID
    pub id: u32,
    /// Anzeigename
    pub name: String,
    /// Event-ID für die Stellung NORMAL
    pub event_normal: EventId,
    /// Event-ID für die Stellung REVERSE
    pub event_reverse: EventId,
    /// Aktueller Zustand
    pub state: TurnoutState,
    /// Monotoner Zeitstempel der letzten Rückmeldung in µs (0 = nie)
    pub last_update_us: u64,
    /// Ein Stellbefehl wurde gesendet, Rückmeldung steht aus
    pub command_pending: bool,
    /// Anzeige-Sortierhinweis des Bedieners
    pub user_order: u16,
}

impl Turnout {
    /// Erstellt eine neue Weiche im Zustand `Unknown`.
    pub fn new(id: u32, name: String, event_normal: EventId, event_reverse: EventId) -> Self {
        Self {
            id,
            name,
            event_normal,
            event_reverse,
            state: TurnoutState::Unknown,
            last_update_us: 0,
            command_pending: false,
            user_order: 0,
        }
    }

    /// Prüft ob eine der beiden Event-IDs der übergebenen entspricht.
    pub fn matches_event(&self, event: EventId) -> bool {
        self.event_normal == event || self.event_reverse == event
    }
}
