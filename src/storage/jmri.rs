//! Import von Weichendefinitionen aus einer JMRI-Panel-Datei (XML).
//!
//! JMRI speichert OpenLCB-Weichen als `<turnout>`-Blöcke mit
//! `systemName` im Format `MT<event1>;<event2>` (zwei Dotted-Hex-IDs,
//! Semikolon-getrennt, "MT"-Präfix optional). Ohne `inverted`-Attribut
//! ist event1 die NORMAL- und event2 die REVERSE-ID; `inverted="true"`
//! vertauscht die beiden.
//!
//! Der Parser liefert nur Kandidaten — der Abgleich gegen bereits
//! vorhandene Event-IDs passiert beim Einfügen in die Registry.

use crate::core::turnout::EventId;
use anyhow::{Context, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::path::Path;

/// Eine aus JMRI gelesene Weichendefinition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JmriTurnout {
    /// Anzeigename (userName, sonst `"JMRI Turnout N"`)
    pub name: String,
    /// Event-ID für NORMAL
    pub event_normal: EventId,
    /// Event-ID für REVERSE
    pub event_reverse: EventId,
}

/// Lädt eine JMRI-Datei; fehlende Datei ⇒ leere Liste.
pub fn load(path: &Path) -> Result<Vec<JmriTurnout>> {
    if !path.exists() {
        log::info!("Keine JMRI-Importdatei unter {}", path.display());
        return Ok(Vec::new());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Konnte {} nicht lesen", path.display()))?;
    parse_jmri_turnouts(&content)
        .with_context(|| format!("Konnte {} nicht parsen", path.display()))
}

/// Parst JMRI-XML und extrahiert alle auswertbaren `<turnout>`-Blöcke.
///
/// Blöcke ohne auswertbaren `systemName` werden einzeln übersprungen
/// und geloggt, nur defektes XML ist ein Fehler.
pub fn parse_jmri_turnouts(xml_content: &str) -> Result<Vec<JmriTurnout>> {
    let mut reader = Reader::from_str(xml_content);
    reader.config_mut().trim_text(true);

    let mut buffer = Vec::new();
    let mut turnouts: Vec<JmriTurnout> = Vec::new();

    let mut in_turnout = false;
    let mut inverted = false;
    let mut current_tag: Option<String> = None;
    let mut system_name = String::new();
    let mut user_name = String::new();

    loop {
        match reader.read_event_into(&mut buffer) {
            Ok(Event::Start(ref e)) => {
                let name = e.name();
                let tag = reader.decoder().decode(name.as_ref())?;

                if tag == "turnout" {
                    in_turnout = true;
                    inverted = false;
                    system_name.clear();
                    user_name.clear();

                    for attr in e.attributes().with_checks(false) {
                        let attr = attr?;
                        let key = reader.decoder().decode(attr.key.as_ref())?;
                        if key == "inverted" {
                            let value = attr.unescape_value()?;
                            inverted = value.as_ref() == "true";
                        }
                    }
                } else if in_turnout {
                    current_tag = Some(tag.to_string());
                }
            }
            Ok(Event::Text(e)) => {
                if in_turnout {
                    let text = e.xml_content()?.into_owned();
                    match current_tag.as_deref() {
                        Some("systemName") => system_name.push_str(&text),
                        Some("userName") => user_name.push_str(&text),
                        _ => {}
                    }
                }
            }
            Ok(Event::End(ref e)) => {
                let name = e.name();
                let tag = reader.decoder().decode(name.as_ref())?;

                if tag == "turnout" {
                    in_turnout = false;
                    match parse_system_name(&system_name) {
                        Some((ev1, ev2)) => {
                            let (event_normal, event_reverse) =
                                if inverted { (ev2, ev1) } else { (ev1, ev2) };
                            let name = if user_name.is_empty() {
                                format!("JMRI Turnout {}", turnouts.len() + 1)
                            } else {
                                user_name.clone()
                            };
                            log::info!(
                                "JMRI-Import: '{}' N={} R={}{}",
                                name,
                                event_normal,
                                event_reverse,
                                if inverted { " (invertiert)" } else { "" }
                            );
                            turnouts.push(JmriTurnout {
                                name,
                                event_normal,
                                event_reverse,
                            });
                        }
                        None => {
                            log::warn!(
                                "JMRI: systemName nicht auswertbar: '{}'",
                                system_name
                            );
                        }
                    }
                } else if current_tag.as_deref() == Some(tag.as_ref()) {
                    current_tag = None;
                }
            }
            Ok(Event::Eof) => break,
            Err(err) => return Err(err).context("Fehler beim Parsen des JMRI-XML"),
            _ => {}
        }

        buffer.clear();
    }

    Ok(turnouts)
}

/// Zerlegt einen JMRI-systemName (`MT<event1>;<event2>`) in zwei Event-IDs.
fn parse_system_name(sys_name: &str) -> Option<(EventId, EventId)> {
    let trimmed = sys_name.trim();
    let rest = trimmed.strip_prefix("MT").unwrap_or(trimmed);

    let (first, second) = rest.split_once(';')?;
    let ev1: EventId = first.parse().ok()?;
    let ev2: EventId = second.parse().ok()?;
    Some((ev1, ev2))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<layout-config>
  <turnouts class="jmri.jmrix.openlcb.OlcbTurnoutManagerXml">
    <turnout feedback="MONITORING">
      <systemName>MT05.01.01.01.22.50.00.00;05.01.01.01.22.50.00.01</systemName>
      <userName>Einfahrt West</userName>
    </turnout>
    <turnout inverted="true">
      <systemName>MT05.01.01.01.22.50.00.02;05.01.01.01.22.50.00.03</systemName>
    </turnout>
  </turnouts>
</layout-config>"#;

    #[test]
    fn test_parse_sample() {
        let turnouts = parse_jmri_turnouts(SAMPLE).expect("Parsing fehlgeschlagen");
        assert_eq!(turnouts.len(), 2);

        assert_eq!(turnouts[0].name, "Einfahrt West");
        assert_eq!(turnouts[0].event_normal, EventId(0x0501010122500000));
        assert_eq!(turnouts[0].event_reverse, EventId(0x0501010122500001));
    }

    #[test]
    fn test_inverted_swaps_events_and_default_name() {
        let turnouts = parse_jmri_turnouts(SAMPLE).unwrap();
        // inverted: event1 ist REVERSE, event2 ist NORMAL
        assert_eq!(turnouts[1].event_normal, EventId(0x0501010122500003));
        assert_eq!(turnouts[1].event_reverse, EventId(0x0501010122500002));
        assert_eq!(turnouts[1].name, "JMRI Turnout 2");
    }

    #[test]
    fn test_bad_system_name_skipped() {
        let xml = r#"<turnouts>
            <turnout><systemName>IT42</systemName></turnout>
            <turnout><systemName>MT01;02</systemName></turnout>
        </turnouts>"#;
        let turnouts = parse_jmri_turnouts(xml).expect("Parsing fehlgeschlagen");
        assert_eq!(turnouts.len(), 1);
        assert_eq!(turnouts[0].event_normal, EventId(0x01));
    }

    #[test]
    fn test_system_name_without_prefix() {
        let xml = r#"<turnout><systemName>01;02</systemName></turnout>"#;
        let turnouts = parse_jmri_turnouts(xml).unwrap();
        assert_eq!(turnouts.len(), 1);
        assert_eq!(turnouts[0].event_reverse, EventId(0x02));
    }

    #[test]
    fn test_missing_file_yields_empty() {
        let dir = tempfile::tempdir().unwrap();
        let turnouts = load(&dir.path().join("fehlt.xml")).expect("Kein Fehler erwartet");
        assert!(turnouts.is_empty());
    }
}
