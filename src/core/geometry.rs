//! Fixpunkt-Geometrie für das Y-förmige Weichensymbol.
//!
//! Berechnet Pixelpositionen der drei Anschlusspunkte aus Rasterposition,
//! Rotation (0-7 für 0°-315° in 45°-Schritten) und Spiegelung.
//!
//! Grundform (rotation=0, mirrored=false) in lokalen Koordinaten:
//!   Entry:   (0, 0)
//!   Normal:  (60, 0)      — kolinear zum Entry
//!   Reverse: (40, -40)    — zweigt mit 45° nach oben ab
//!
//! Die Rotation läuft über eine feste Tabelle (cos/sin × 1024) in reiner
//! Integer-Arithmetik. Das ist tragend, nicht nur ein Implementierungsdetail:
//! ein gespeichertes Layout muss nach dem Neuladen bitidentisch rendern,
//! eine Float-Annäherung würde alte Dateien still verfälschen.

use super::layout::{PanelItem, PointKind, GRID_SIZE};
use glam::IVec2;

// Lokale Offsets der drei Punkte relativ zum Entry im Ursprung.
const LOCAL_NORMAL: IVec2 = IVec2::new(60, 0);
const LOCAL_REVERSE: IVec2 = IVec2::new(40, -40);

/// Rotationstabelle für 8 Schritte: cos/sin skaliert mit 1024.
/// (cos45 ≈ 0.7071 × 1024 ≈ 724)
const ROT_TABLE: [(i32, i32); 8] = [
    (1024, 0),     // 0°
    (724, 724),    // 45°
    (0, 1024),     // 90°
    (-724, 724),   // 135°
    (-1024, 0),    // 180°
    (-724, -724),  // 225°
    (0, -1024),    // 270°
    (724, -724),   // 315°
];

/// Rotiert einen lokalen Offset um den Rotationsindex.
///
/// Standard-2D-Rotation `x' = (x·cos − y·sin)/1024`, `y' = (x·sin + y·cos)/1024`
/// in Fixpunkt-Arithmetik (Skala 1024). Die Integer-Division (Truncation)
/// gehört zum Dateiformat-Vertrag.
fn rotate_offset(offset: IVec2, rotation: u8) -> IVec2 {
    let (cos_fp, sin_fp) = ROT_TABLE[(rotation & 0x07) as usize];
    IVec2::new(
        (offset.x * cos_fp - offset.y * sin_fp) / 1024,
        (offset.x * sin_fp + offset.y * cos_fp) / 1024,
    )
}

/// Transformiert einen lokalen Offset: Spiegelung, dann Rotation, dann
/// Translation zum Weltursprung des Items.
fn transform_point(local: IVec2, item: &PanelItem, origin: IVec2) -> IVec2 {
    let mut local = local;
    // Spiegelung: Y-Komponente kippen (abzweigendes Bein zur anderen Seite)
    if item.mirrored {
        local.y = -local.y;
    }
    origin + rotate_offset(local, item.rotation)
}

/// Liefert die drei Anschlusspunkte (Entry, Normal, Reverse) in Pixeln.
pub fn points(item: &PanelItem) -> (IVec2, IVec2, IVec2) {
    let origin = IVec2::new(item.grid_x * GRID_SIZE, item.grid_y * GRID_SIZE);
    (
        origin,
        transform_point(LOCAL_NORMAL, item, origin),
        transform_point(LOCAL_REVERSE, item, origin),
    )
}

/// Liefert einen einzelnen Anschlusspunkt.
pub fn connection_point(item: &PanelItem, point: PointKind) -> IVec2 {
    let (entry, normal, reverse) = points(item);
    match point {
        PointKind::Entry => entry,
        PointKind::Normal => normal,
        PointKind::Reverse => reverse,
    }
}

/// Symbolmittelpunkt: arithmetisches Mittel der drei Punkte
/// (Integer-Division, abschneidend).
pub fn center(item: &PanelItem) -> IVec2 {
    let (entry, normal, reverse) = points(item);
    IVec2::new(
        (entry.x + normal.x + reverse.x) / 3,
        (entry.y + normal.y + reverse.y) / 3,
    )
}
