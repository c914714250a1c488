//! Anwendungskontext: die eine Registry- und Layout-Instanz des Prozesses.
//!
//! Wird einmal beim Start erzeugt (nach dem Laden der Persistenz) und per
//! Referenz durch alle Komponenten gereicht — keine ambienten Globals,
//! Tests können beliebig viele unabhängige Instanzen bauen.
//!
//! `registry` und `router` sind thread-sicher und werden mit dem
//! Netzwerk-Thread geteilt. `layout` gehört allein dem UI-Thread; der
//! Netzwerk-Thread erreicht das Layout nie direkt, sondern nur über den
//! Zustands-Callback der Registry.

use crate::core::layout::LayoutModel;
use crate::core::registry::{RegistryError, TurnoutDef, TurnoutRegistry};
use crate::lcc::EventRouter;
use crate::shared::PanelOptions;
use crate::storage::{jmri, layout, roster};
use anyhow::Result;
use std::sync::Arc;

/// Zustandskern des Panels: Optionen, Registry, Router, Layout.
pub struct PanelContext {
    /// Laufzeit-Optionen
    pub options: PanelOptions,
    /// Weichen-Registry (geteilt mit dem Netzwerk-Thread)
    pub registry: Arc<TurnoutRegistry>,
    /// Event-Router (geteilt mit dem Netzwerk-Thread)
    pub router: Arc<EventRouter>,
    /// Panel-Layout (nur UI-Thread)
    pub layout: LayoutModel,
}

impl PanelContext {
    /// Bootet den Zustandskern: Weichenliste laden, JMRI-Import mergen,
    /// bei Neuzugängen sofort zurückschreiben, Layout laden.
    ///
    /// Defekte Datendateien brechen den Boot nie ab — beide Stores
    /// degradieren auf leere Modelle.
    pub fn init(options: PanelOptions) -> Result<Self> {
        let registry = Arc::new(TurnoutRegistry::new());

        let defs = roster::load(&options.roster_path());
        for def in &defs {
            match registry.add_def(def) {
                Ok(_) => {}
                Err(e) => log::warn!("Weiche '{}' nicht übernommen: {}", def.name, e),
            }
        }

        let imported = Self::import_jmri(&options, &registry);
        if imported > 0 {
            // Sofort zurückschreiben, damit der Import beim nächsten
            // Boot nicht wiederholt wird
            let snapshot = registry.snapshot();
            if let Err(e) = roster::save(&options.roster_path(), &snapshot) {
                log::warn!("Weichenliste nach JMRI-Import nicht gespeichert: {}", e);
            }
        }

        let layout = layout::load(&options.layout_path());

        let router = Arc::new(EventRouter::new(registry.clone()));
        Ok(Self {
            options,
            registry,
            router,
            layout,
        })
    }

    /// Merged die JMRI-Importdatei in die Registry. Liefert die Anzahl
    /// neu übernommener Weichen; Duplikate (alle vier Kreuzkombinationen
    /// von Normal/Reverse) lehnt die Registry selbst ab.
    fn import_jmri(options: &PanelOptions, registry: &TurnoutRegistry) -> usize {
        let candidates = match jmri::load(&options.jmri_import_path()) {
            Ok(c) => c,
            Err(e) => {
                log::warn!("JMRI-Import übersprungen: {:#}", e);
                return 0;
            }
        };

        let mut imported = 0;
        for candidate in candidates {
            let def = TurnoutDef {
                name: candidate.name,
                event_normal: candidate.event_normal,
                event_reverse: candidate.event_reverse,
                user_order: registry.len() as u16,
            };
            match registry.add_def(&def) {
                Ok(_) => imported += 1,
                Err(RegistryError::DuplicateEvent) => {
                    log::debug!("JMRI: '{}' bereits vorhanden", def.name);
                }
                Err(e) => {
                    log::warn!("JMRI: '{}' nicht übernommen: {}", def.name, e);
                    if e == RegistryError::Full {
                        break;
                    }
                }
            }
        }

        if imported > 0 {
            log::info!("{} neue Weichen aus JMRI-Datei importiert", imported);
        }
        imported
    }

    /// Speichert die Weichenliste (Schnappschuss unter dem Lock,
    /// Schreiben außerhalb).
    pub fn save_roster(&self) -> Result<()> {
        let snapshot = self.registry.snapshot();
        roster::save(&self.options.roster_path(), &snapshot)
    }

    /// Speichert das Panel-Layout.
    pub fn save_layout(&self) -> Result<()> {
        layout::save(&self.options.layout_path(), &self.layout)
    }
}
