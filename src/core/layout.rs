//! Panel-Layout-Datenmodell: platzierte Weichen, Endpunkte, Gleissegmente.
//!
//! Das Layout hat bewusst kein eigenes Lock: es wird ausschließlich vom
//! UI-Thread mutiert, der Netzwerk-Thread meldet nur über den
//! Registry-Callback. Der interne Hint-Cache (`Cell`) macht das Modell
//! `!Sync` und erzwingt diese Single-Writer-Einschränkung strukturell.

use super::geometry;
use glam::IVec2;
use std::cell::Cell;

/// Maximal platzierbare Weichen auf dem Panel.
pub const MAX_ITEMS: usize = 50;
/// Maximale Endpunkte (Streckenabschlüsse).
pub const MAX_ENDPOINTS: usize = 20;
/// Maximale Gleissegmente.
pub const MAX_TRACKS: usize = 100;
/// Rasterzellengröße in Pixeln.
pub const GRID_SIZE: i32 = 20;

/// Kapazität erschöpft — normale, nicht-fatale Ablehnung.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Layout voll: Kapazität für {0} erreicht")]
pub struct LayoutFull(pub &'static str);

/// Anschlusspunkt-Typ am Weichensymbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PointKind {
    /// Stammgleis (Einfahrt)
    #[default]
    Entry,
    /// Gerader Abgang
    Normal,
    /// Abzweigender Abgang
    Reverse,
}

/// Referenz-Typ eines Gleisendes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    /// Verweist auf eine platzierte Weiche (über Weichen-ID)
    Turnout,
    /// Verweist auf einen Endpunkt (über Endpunkt-ID)
    Endpoint,
}

/// Ein Gleisende: Weiche oder Endpunkt plus Anschlusspunkt.
/// `point` ist nur für Weichen-Referenzen bedeutsam.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionRef {
    /// Referenz-Typ
    pub kind: RefKind,
    /// Weichen-ID bzw. Endpunkt-ID
    pub id: u32,
    /// Anschlusspunkt am Weichensymbol
    pub point: PointKind,
}

impl ConnectionRef {
    /// Referenz auf einen Weichen-Anschlusspunkt.
    pub fn turnout(id: u32, point: PointKind) -> Self {
        Self {
            kind: RefKind::Turnout,
            id,
            point,
        }
    }

    /// Referenz auf einen Endpunkt.
    pub fn endpoint(id: u32) -> Self {
        Self {
            kind: RefKind::Endpoint,
            id,
            point: PointKind::Entry,
        }
    }
}

/// Ein Gleissegment zwischen zwei Anschlusspunkten.
/// Die Speicherreihenfolge from/to impliziert keine Fahrtrichtung.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Track {
    /// Erstes Gleisende
    pub from: ConnectionRef,
    /// Zweites Gleisende
    pub to: ConnectionRef,
}

/// Eine auf dem Panel platzierte Weiche.
///
/// Position in Rasterzellen (× `GRID_SIZE` für Pixel). Rotation 0-7 entspricht
/// 0°-315° im Uhrzeigersinn in 45°-Schritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelItem {
    /// Sitzungsstabile Weichen-ID aus der Registry
    pub turnout_id: u32,
    /// X-Position in Rasterzellen
    pub grid_x: i32,
    /// Y-Position in Rasterzellen
    pub grid_y: i32,
    /// Rotationsindex 0-7
    pub rotation: u8,
    /// Abzweigendes Bein gespiegelt (links-/rechtsweiche)
    pub mirrored: bool,
}

/// Ein Endpunkt: Streckenabschluss ohne Weichenbezug.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    /// Eindeutige Endpunkt-ID (auto-increment)
    pub id: u32,
    /// X-Position in Rasterzellen
    pub grid_x: i32,
    /// Y-Position in Rasterzellen
    pub grid_y: i32,
}

/// Vollständiges Panel-Layout: Weichen-Items, Endpunkte, Gleissegmente.
///
/// Invariante: jede Track-Referenz löst auf eine aktuell vorhandene
/// Weiche/einen Endpunkt auf — gehalten durch Kaskaden-Löschung in
/// `remove_item`/`remove_endpoint`, nie durch Ablehnung beim Anlegen.
#[derive(Debug, Default)]
pub struct LayoutModel {
    items: Vec<PanelItem>,
    endpoints: Vec<Endpoint>,
    tracks: Vec<Track>,
    next_endpoint_id: u32,
    /// Letzter Treffer der Weichen-Auflösung. Reine Optimierung: der Hint
    /// wird nur verwendet, wenn der Slot existiert UND die turnout_id passt,
    /// sonst voller Scan.
    last_hit: Cell<usize>,
}

impl LayoutModel {
    /// Erstellt ein leeres Layout.
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            endpoints: Vec::new(),
            tracks: Vec::new(),
            next_endpoint_id: 1,
            last_hit: Cell::new(0),
        }
    }

    /// Baut ein Layout aus geladenen Bestandteilen auf (Storage-Pfad).
    pub fn from_parts(
        items: Vec<PanelItem>,
        endpoints: Vec<Endpoint>,
        tracks: Vec<Track>,
        next_endpoint_id: u32,
    ) -> Self {
        Self {
            items,
            endpoints,
            tracks,
            next_endpoint_id,
            last_hit: Cell::new(0),
        }
    }

    // ── Queries ─────────────────────────────────────────────────────

    /// Prüft ob das Layout weder Items noch Endpunkte enthält.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.endpoints.is_empty()
    }

    /// Prüft ob eine Weiche bereits platziert ist.
    pub fn is_turnout_placed(&self, turnout_id: u32) -> bool {
        self.items.iter().any(|it| it.turnout_id == turnout_id)
    }

    /// Findet den Item-Index zu einer Weichen-ID.
    pub fn find_item(&self, turnout_id: u32) -> Option<usize> {
        self.items.iter().position(|it| it.turnout_id == turnout_id)
    }

    /// Anzahl platzierter Weichen-Items.
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Anzahl Endpunkte.
    pub fn endpoint_count(&self) -> usize {
        self.endpoints.len()
    }

    /// Anzahl Gleissegmente.
    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// Nächste zu vergebende Endpunkt-ID.
    pub fn next_endpoint_id(&self) -> u32 {
        self.next_endpoint_id
    }

    /// Read-only Zugriff auf die Items.
    pub fn items(&self) -> &[PanelItem] {
        &self.items
    }

    /// Read-only Zugriff auf die Endpunkte.
    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    /// Read-only Zugriff auf die Gleissegmente.
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Löst ein Gleisende zu Pixelkoordinaten auf.
    fn resolve_end(&self, r: &ConnectionRef) -> Option<IVec2> {
        match r.kind {
            RefKind::Endpoint => self
                .endpoints
                .iter()
                .find(|ep| ep.id == r.id)
                .map(|ep| IVec2::new(ep.grid_x * GRID_SIZE, ep.grid_y * GRID_SIZE)),
            RefKind::Turnout => {
                // Hint zuerst prüfen, korrektheitsneutral
                let hint = self.last_hit.get();
                if let Some(item) = self.items.get(hint) {
                    if item.turnout_id == r.id {
                        return Some(geometry::connection_point(item, r.point));
                    }
                }
                let idx = self.items.iter().position(|it| it.turnout_id == r.id)?;
                self.last_hit.set(idx);
                Some(geometry::connection_point(&self.items[idx], r.point))
            }
        }
    }

    /// Löst ein Gleissegment zu zwei Pixelpunkten auf.
    /// `None` wenn eines der Enden nicht (mehr) existiert.
    pub fn resolve_track(&self, track: &Track) -> Option<(IVec2, IVec2)> {
        let from = self.resolve_end(&track.from)?;
        let to = self.resolve_end(&track.to)?;
        Some((from, to))
    }

    /// Achsenparallele Bounding-Box über alle Symbol- und Endpunkt-Punkte,
    /// erweitert um `margin` Pixel. `None` bei leerem Layout.
    /// Wird vom Auto-Fit/Zentrieren des Builders verwendet.
    pub fn bounds(&self, margin: i32) -> Option<(IVec2, IVec2)> {
        if self.is_empty() {
            return None;
        }

        let mut min = IVec2::new(i32::MAX, i32::MAX);
        let mut max = IVec2::new(i32::MIN, i32::MIN);

        for item in &self.items {
            let (entry, normal, reverse) = geometry::points(item);
            for p in [entry, normal, reverse] {
                min = min.min(p);
                max = max.max(p);
            }
        }

        for ep in &self.endpoints {
            let p = IVec2::new(ep.grid_x * GRID_SIZE, ep.grid_y * GRID_SIZE);
            min = min.min(p);
            max = max.max(p);
        }

        Some((min - IVec2::splat(margin), max + IVec2::splat(margin)))
    }

    // ── Mutations ───────────────────────────────────────────────────

    /// Platziert eine Weiche im Raster. Rotation 0, nicht gespiegelt.
    pub fn add_item(&mut self, turnout_id: u32, grid_x: i32, grid_y: i32) -> Result<usize, LayoutFull> {
        if self.items.len() >= MAX_ITEMS {
            log::warn!("Layout voll — keine weiteren Items (max {})", MAX_ITEMS);
            return Err(LayoutFull("Items"));
        }

        self.items.push(PanelItem {
            turnout_id,
            grid_x,
            grid_y,
            rotation: 0,
            mirrored: false,
        });

        log::info!(
            "Item bei Raster ({}, {}) platziert, {} Items gesamt",
            grid_x,
            grid_y,
            self.items.len()
        );
        Ok(self.items.len() - 1)
    }

    /// Mutierender Zugriff auf ein Item (Drag/Rotation/Spiegelung im Builder).
    pub fn item_mut(&mut self, index: usize) -> Option<&mut PanelItem> {
        self.items.get_mut(index)
    }

    /// Fügt einen Endpunkt hinzu und vergibt die nächste ID.
    pub fn add_endpoint(&mut self, grid_x: i32, grid_y: i32) -> Result<u32, LayoutFull> {
        if self.endpoints.len() >= MAX_ENDPOINTS {
            log::warn!(
                "Layout voll — keine weiteren Endpunkte (max {})",
                MAX_ENDPOINTS
            );
            return Err(LayoutFull("Endpunkte"));
        }

        let id = self.next_endpoint_id;
        self.next_endpoint_id += 1;
        self.endpoints.push(Endpoint { id, grid_x, grid_y });

        log::info!(
            "Endpunkt {} bei Raster ({}, {}) platziert, {} Endpunkte gesamt",
            id,
            grid_x,
            grid_y,
            self.endpoints.len()
        );
        Ok(id)
    }

    /// Fügt ein Gleissegment hinzu.
    pub fn add_track(&mut self, track: Track) -> Result<usize, LayoutFull> {
        if self.tracks.len() >= MAX_TRACKS {
            log::warn!("Layout voll — keine weiteren Gleise (max {})", MAX_TRACKS);
            return Err(LayoutFull("Gleise"));
        }
        self.tracks.push(track);
        Ok(self.tracks.len() - 1)
    }

    /// Entfernt ein Weichen-Item samt aller referenzierenden Gleissegmente.
    pub fn remove_item(&mut self, index: usize) {
        if index >= self.items.len() {
            return;
        }
        let removed_id = self.items[index].turnout_id;
        self.items.remove(index);
        self.cascade_remove_tracks(RefKind::Turnout, removed_id, "Item");
        // Hint zeigt ggf. auf einen verschobenen Slot; zurücksetzen
        self.last_hit.set(0);
    }

    /// Entfernt einen Endpunkt samt aller referenzierenden Gleissegmente.
    pub fn remove_endpoint(&mut self, index: usize) {
        if index >= self.endpoints.len() {
            return;
        }
        let removed_id = self.endpoints[index].id;
        self.endpoints.remove(index);
        self.cascade_remove_tracks(RefKind::Endpoint, removed_id, "Endpunkt");
    }

    /// Entfernt genau ein Gleissegment, ohne Kaskade.
    pub fn remove_track(&mut self, index: usize) {
        if index >= self.tracks.len() {
            return;
        }
        self.tracks.remove(index);
        log::info!("Gleissegment entfernt, {} Gleise verbleiben", self.tracks.len());
    }

    /// Kaskade: löscht alle Gleise, deren from/to auf (kind, id) zeigt.
    fn cascade_remove_tracks(&mut self, kind: RefKind, id: u32, what: &str) {
        let before = self.tracks.len();
        self.tracks.retain(|t| {
            !((t.from.kind == kind && t.from.id == id) || (t.to.kind == kind && t.to.id == id))
        });
        log::info!(
            "{} entfernt, Kaskade löschte {} Gleise",
            what,
            before - self.tracks.len()
        );
    }
}
