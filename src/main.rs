//! panel-datacheck — Wartungswerkzeug für die Panel-Datendateien.
//!
//! Lädt Weichenliste und Layout wie das Panel beim Boot (inklusive
//! JMRI-Import), meldet den Bestand und nicht auflösbare Gleise und
//! schreibt beide Dateien normalisiert zurück.

use anyhow::{Context, Result};
use lcc_turnout_panel::{PanelContext, PanelOptions};
use std::path::PathBuf;

fn main() -> Result<()> {
    // Logger initialisieren
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    log::info!("panel-datacheck v{} startet...", env!("CARGO_PKG_VERSION"));

    let mut options = PanelOptions::load_from_file(&PanelOptions::config_path());
    if let Some(dir) = std::env::args().nth(1) {
        options.data_dir = PathBuf::from(dir);
    }
    log::info!("Datenverzeichnis: {}", options.data_dir.display());

    let ctx = PanelContext::init(options).context("Boot der Datendateien fehlgeschlagen")?;

    report(&ctx);

    // Normalisiert zurückschreiben (aktuelle Formatversionen, Dotted-Hex)
    ctx.save_roster().context("Weichenliste nicht gespeichert")?;
    ctx.save_layout().context("Panel-Layout nicht gespeichert")?;

    log::info!("panel-datacheck abgeschlossen");
    Ok(())
}

fn report(ctx: &PanelContext) {
    log::info!(
        "Bestand: {} Weichen, {} Items, {} Endpunkte, {} Gleise",
        ctx.registry.len(),
        ctx.layout.item_count(),
        ctx.layout.endpoint_count(),
        ctx.layout.track_count()
    );

    ctx.registry.with_all(|all| {
        for t in all {
            let placed = if ctx.layout.is_turnout_placed(t.id) {
                "platziert"
            } else {
                "nicht platziert"
            };
            log::info!("  '{}': N={} R={} ({})", t.name, t.event_normal, t.event_reverse, placed);
        }
    });

    let mut unresolved = 0usize;
    for (i, track) in ctx.layout.tracks().iter().enumerate() {
        if ctx.layout.resolve_track(track).is_none() {
            log::warn!("Gleis {} ist nicht auflösbar", i);
            unresolved += 1;
        }
    }
    if unresolved > 0 {
        log::warn!("{} Gleise verweisen auf fehlende Weichen/Endpunkte", unresolved);
    }

    if let Some((min, max)) = ctx.layout.bounds(0) {
        log::info!(
            "Layout-Ausdehnung: ({}, {}) bis ({}, {})",
            min.x,
            min.y,
            max.x,
            max.y
        );
    }
}
