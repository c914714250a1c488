//! Persistenz des Panel-Layouts als `panel.json`.
//!
//! Weichen-Items werden über ihre Weichen-ID referenziert, Gleisenden als
//! String `"turnout:N"` bzw. `"endpoint:N"` plus Anschlusspunkt
//! (`entry`/`normal`/`reverse`). Dateiformat:
//!
//! ```json
//! {
//!   "version": 2,
//!   "items": [
//!     { "turnout_id": 1, "grid_x": 5, "grid_y": 3, "rotation": 0, "mirrored": false }
//!   ],
//!   "endpoints": [
//!     { "id": 1, "grid_x": 10, "grid_y": 4 }
//!   ],
//!   "next_endpoint_id": 2,
//!   "tracks": [
//!     { "from": "turnout:1", "from_point": "normal", "to": "endpoint:1", "to_point": "entry" }
//!   ]
//! }
//! ```
//!
//! Ein defektes oder fehlendes Layout ist nie fatal: das Panel startet
//! dann leer. Gespeichert wird immer Version 2, gelesen Version 1 und 2.

use crate::core::layout::{
    ConnectionRef, Endpoint, LayoutModel, PanelItem, PointKind, RefKind, Track, MAX_ENDPOINTS,
    MAX_ITEMS, MAX_TRACKS,
};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

const LAYOUT_VERSION: u32 = 2;

#[derive(Debug, Default, Serialize, Deserialize)]
struct LayoutFile {
    #[serde(default)]
    version: Option<u32>,
    #[serde(default)]
    items: Vec<ItemEntry>,
    #[serde(default)]
    endpoints: Vec<EndpointEntry>,
    #[serde(default)]
    next_endpoint_id: Option<u32>,
    #[serde(default)]
    tracks: Vec<TrackEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ItemEntry {
    #[serde(default)]
    turnout_id: Option<u32>,
    #[serde(default)]
    grid_x: i32,
    #[serde(default)]
    grid_y: i32,
    #[serde(default)]
    rotation: u8,
    #[serde(default)]
    mirrored: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct EndpointEntry {
    #[serde(default)]
    id: Option<u32>,
    #[serde(default)]
    grid_x: i32,
    #[serde(default)]
    grid_y: i32,
}

#[derive(Debug, Serialize, Deserialize)]
struct TrackEntry {
    from: String,
    #[serde(default)]
    from_point: Option<String>,
    to: String,
    #[serde(default)]
    to_point: Option<String>,
}

// ── String-Codierung der Referenzen ─────────────────────────────────

fn point_to_str(point: PointKind) -> &'static str {
    match point {
        PointKind::Entry => "entry",
        PointKind::Normal => "normal",
        PointKind::Reverse => "reverse",
    }
}

/// Unbekannte Punktnamen fallen auf `entry` zurück.
fn str_to_point(s: Option<&str>) -> PointKind {
    match s {
        Some("normal") => PointKind::Normal,
        Some("reverse") => PointKind::Reverse,
        _ => PointKind::Entry,
    }
}

fn ref_to_str(r: &ConnectionRef) -> String {
    match r.kind {
        RefKind::Turnout => format!("turnout:{}", r.id),
        RefKind::Endpoint => format!("endpoint:{}", r.id),
    }
}

fn parse_ref(s: &str, point: Option<&str>) -> Option<ConnectionRef> {
    if let Some(rest) = s.strip_prefix("turnout:") {
        let id = rest.parse().ok()?;
        return Some(ConnectionRef::turnout(id, str_to_point(point)));
    }
    if let Some(rest) = s.strip_prefix("endpoint:") {
        let id = rest.parse().ok()?;
        return Some(ConnectionRef::endpoint(id));
    }
    None
}

// ── Public API ──────────────────────────────────────────────────────

/// Lädt das Panel-Layout.
///
/// Fehlende, unlesbare oder unparsebare Datei sowie unbekannte Version
/// ergeben ein leeres Layout, nie einen Fehler. Über-Kapazität wird mit
/// Warnung abgeschnitten, der Rotationsindex auf 0-7 maskiert.
pub fn load(path: &Path) -> LayoutModel {
    if !path.exists() {
        log::info!("Kein Panel-Layout unter {} — starte leer", path.display());
        return LayoutModel::new();
    }

    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            log::warn!("Konnte {} nicht lesen: {} — starte leer", path.display(), e);
            return LayoutModel::new();
        }
    };

    let file: LayoutFile = match serde_json::from_str(&content) {
        Ok(f) => f,
        Err(e) => {
            log::warn!("Panel-JSON defekt: {} — starte leer", e);
            return LayoutModel::new();
        }
    };

    match file.version {
        Some(1) | Some(2) => {}
        other => {
            log::warn!("Unbekannte Panel-Version: {:?} — starte leer", other);
            return LayoutModel::new();
        }
    }

    if file.items.len() > MAX_ITEMS {
        log::warn!(
            "Panel hat {} Items, schneide auf {} ab",
            file.items.len(),
            MAX_ITEMS
        );
    }
    let items: Vec<PanelItem> = file
        .items
        .into_iter()
        .take(MAX_ITEMS)
        .filter_map(|e| {
            Some(PanelItem {
                turnout_id: e.turnout_id?,
                grid_x: e.grid_x,
                grid_y: e.grid_y,
                rotation: e.rotation & 0x07,
                mirrored: e.mirrored,
            })
        })
        .collect();

    if file.endpoints.len() > MAX_ENDPOINTS {
        log::warn!(
            "Panel hat {} Endpunkte, schneide auf {} ab",
            file.endpoints.len(),
            MAX_ENDPOINTS
        );
    }
    let endpoints: Vec<Endpoint> = file
        .endpoints
        .into_iter()
        .take(MAX_ENDPOINTS)
        .filter_map(|e| {
            Some(Endpoint {
                id: e.id?,
                grid_x: e.grid_x,
                grid_y: e.grid_y,
            })
        })
        .collect();

    if file.tracks.len() > MAX_TRACKS {
        log::warn!(
            "Panel hat {} Gleise, schneide auf {} ab",
            file.tracks.len(),
            MAX_TRACKS
        );
    }
    let tracks: Vec<Track> = file
        .tracks
        .into_iter()
        .take(MAX_TRACKS)
        .enumerate()
        .filter_map(|(i, e)| {
            let from = match parse_ref(&e.from, e.from_point.as_deref()) {
                Some(r) => r,
                None => {
                    log::warn!("Überspringe Gleis {} — unbekannte from-Referenz: {}", i, e.from);
                    return None;
                }
            };
            let to = match parse_ref(&e.to, e.to_point.as_deref()) {
                Some(r) => r,
                None => {
                    log::warn!("Überspringe Gleis {} — unbekannte to-Referenz: {}", i, e.to);
                    return None;
                }
            };
            Some(Track { from, to })
        })
        .collect();

    let next_endpoint_id = file.next_endpoint_id.unwrap_or(1);

    log::info!(
        "Panel-Layout geladen: {} Items, {} Endpunkte, {} Gleise",
        items.len(),
        endpoints.len(),
        tracks.len()
    );

    LayoutModel::from_parts(items, endpoints, tracks, next_endpoint_id)
}

/// Speichert das Panel-Layout (atomar, Temp-Datei + Rename).
pub fn save(path: &Path, layout: &LayoutModel) -> Result<()> {
    let file = LayoutFile {
        version: Some(LAYOUT_VERSION),
        items: layout
            .items()
            .iter()
            .map(|pi| ItemEntry {
                turnout_id: Some(pi.turnout_id),
                grid_x: pi.grid_x,
                grid_y: pi.grid_y,
                rotation: pi.rotation,
                mirrored: pi.mirrored,
            })
            .collect(),
        endpoints: layout
            .endpoints()
            .iter()
            .map(|ep| EndpointEntry {
                id: Some(ep.id),
                grid_x: ep.grid_x,
                grid_y: ep.grid_y,
            })
            .collect(),
        next_endpoint_id: Some(layout.next_endpoint_id()),
        tracks: layout
            .tracks()
            .iter()
            .map(|t| TrackEntry {
                from: ref_to_str(&t.from),
                from_point: Some(point_to_str(t.from.point).to_string()),
                to: ref_to_str(&t.to),
                to_point: Some(point_to_str(t.to.point).to_string()),
            })
            .collect(),
    };

    let content = serde_json::to_string_pretty(&file)?;
    super::write_atomic(path, &content)?;
    log::info!(
        "Panel-Layout gespeichert: {} Items, {} Endpunkte, {} Gleise",
        layout.item_count(),
        layout.endpoint_count(),
        layout.track_count()
    );
    Ok(())
}
