//! Zentrale Konfiguration für das LCC-Weichenstellpult.
//!
//! `PanelOptions` enthält alle zur Laufzeit änderbaren Werte.
//! Die `const`-Werte bleiben als Fallback/Default erhalten.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ── Timeouts & Pacing ──────────────────────────────────────────────

/// Standard-Stale-Timeout in Sekunden (0 = Stale-Erkennung aus).
pub const DEFAULT_STALE_TIMEOUT_SEC: u16 = 300;
/// Standard-Intervall des Stale-Sweeps in Sekunden.
pub const DEFAULT_STALE_SWEEP_INTERVAL_SEC: u16 = 10;
/// Standard-Pace zwischen Zustandsabfragen in Millisekunden.
pub const DEFAULT_QUERY_PACE_MS: u16 = 100;
/// Zulässiger Pace-Bereich (niedriger = schneller, aber mehr Buslast).
pub const QUERY_PACE_MIN_MS: u16 = 20;
pub const QUERY_PACE_MAX_MS: u16 = 1000;

// ── Dateinamen im Datenverzeichnis ─────────────────────────────────

/// Weichenliste (JSON)
pub const ROSTER_FILE_NAME: &str = "turnouts.json";
/// Panel-Layout (JSON)
pub const LAYOUT_FILE_NAME: &str = "panel.json";
/// Einmalige JMRI-Importdatei (XML)
pub const JMRI_IMPORT_FILE_NAME: &str = "jmri_turnouts.xml";

/// Alle zur Laufzeit änderbaren Panel-Optionen.
/// Wird als `lcc_turnout_panel.toml` neben der Binary gespeichert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelOptions {
    /// Datenverzeichnis für Weichenliste, Layout und Importdatei
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Sekunden bis eine Weiche ohne Rückmeldung STALE wird (0 = aus)
    pub stale_timeout_sec: u16,
    /// Intervall des Stale-Sweeps in Sekunden
    #[serde(default = "default_stale_sweep_interval_sec")]
    pub stale_sweep_interval_sec: u16,
    /// Minimaler Abstand zwischen Zustandsabfragen in Millisekunden
    pub query_pace_ms: u16,
}

impl Default for PanelOptions {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            stale_timeout_sec: DEFAULT_STALE_TIMEOUT_SEC,
            stale_sweep_interval_sec: DEFAULT_STALE_SWEEP_INTERVAL_SEC,
            query_pace_ms: DEFAULT_QUERY_PACE_MS,
        }
    }
}

/// Serde-Default für `data_dir`.
fn default_data_dir() -> PathBuf {
    PathBuf::from(".")
}

/// Serde-Default für `stale_sweep_interval_sec` (Abwärtskompatibilität).
fn default_stale_sweep_interval_sec() -> u16 {
    DEFAULT_STALE_SWEEP_INTERVAL_SEC
}

impl PanelOptions {
    /// Lädt Optionen aus einer TOML-Datei. Bei Fehler: Standardwerte.
    pub fn load_from_file(path: &Path) -> Self {
        let opts = match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(opts) => {
                    log::info!("Optionen geladen aus: {}", path.display());
                    opts
                }
                Err(e) => {
                    log::warn!("Optionen-Datei fehlerhaft, verwende Standardwerte: {}", e);
                    Self::default()
                }
            },
            Err(_) => {
                log::info!("Keine Optionen-Datei gefunden, verwende Standardwerte");
                Self::default()
            }
        };
        opts.clamped()
    }

    /// Speichert Optionen als TOML-Datei.
    pub fn save_to_file(&self, path: &Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        log::info!("Optionen gespeichert nach: {}", path.display());
        Ok(())
    }

    /// Ermittelt den Pfad zur Optionen-Datei neben der Binary.
    pub fn config_path() -> PathBuf {
        std::env::current_exe()
            .unwrap_or_else(|_| PathBuf::from("lcc_turnout_panel"))
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join("lcc_turnout_panel.toml")
    }

    /// Begrenzt Werte auf ihren zulässigen Bereich.
    fn clamped(mut self) -> Self {
        let pace = self.query_pace_ms;
        self.query_pace_ms = pace.clamp(QUERY_PACE_MIN_MS, QUERY_PACE_MAX_MS);
        if self.query_pace_ms != pace {
            log::warn!(
                "query_pace_ms {} außerhalb {}-{}, begrenzt auf {}",
                pace,
                QUERY_PACE_MIN_MS,
                QUERY_PACE_MAX_MS,
                self.query_pace_ms
            );
        }
        self
    }

    /// Pfad zur Weichenliste.
    pub fn roster_path(&self) -> PathBuf {
        self.data_dir.join(ROSTER_FILE_NAME)
    }

    /// Pfad zum Panel-Layout.
    pub fn layout_path(&self) -> PathBuf {
        self.data_dir.join(LAYOUT_FILE_NAME)
    }

    /// Pfad zur JMRI-Importdatei.
    pub fn jmri_import_path(&self) -> PathBuf {
        self.data_dir.join(JMRI_IMPORT_FILE_NAME)
    }

    /// Stale-Timeout in Millisekunden (für `check_stale`).
    pub fn stale_timeout_ms(&self) -> u64 {
        u64::from(self.stale_timeout_sec) * 1000
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = PanelOptions::default();
        assert_eq!(opts.stale_timeout_sec, 300);
        assert_eq!(opts.query_pace_ms, 100);
        assert_eq!(opts.roster_path(), PathBuf::from("./turnouts.json"));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().expect("Tempdir erwartet");
        let opts = PanelOptions::load_from_file(&dir.path().join("fehlt.toml"));
        assert_eq!(opts.stale_timeout_sec, DEFAULT_STALE_TIMEOUT_SEC);
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("panel.toml");

        let mut opts = PanelOptions::default();
        opts.stale_timeout_sec = 120;
        opts.query_pace_ms = 50;
        opts.save_to_file(&path).expect("Speichern erwartet");

        let loaded = PanelOptions::load_from_file(&path);
        assert_eq!(loaded.stale_timeout_sec, 120);
        assert_eq!(loaded.query_pace_ms, 50);
    }

    #[test]
    fn test_pace_clamped_to_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("panel.toml");
        std::fs::write(
            &path,
            "data_dir = \".\"\nstale_timeout_sec = 300\nquery_pace_ms = 5\n",
        )
        .unwrap();
        assert_eq!(PanelOptions::load_from_file(&path).query_pace_ms, QUERY_PACE_MIN_MS);

        std::fs::write(
            &path,
            "data_dir = \".\"\nstale_timeout_sec = 300\nquery_pace_ms = 9999\n",
        )
        .unwrap();
        assert_eq!(PanelOptions::load_from_file(&path).query_pace_ms, QUERY_PACE_MAX_MS);
    }

    #[test]
    fn test_stale_timeout_zero_stays_zero() {
        // 0 = Stale-Erkennung deaktiviert, darf nicht geclampt werden
        let mut opts = PanelOptions::default();
        opts.stale_timeout_sec = 0;
        assert_eq!(opts.clamped().stale_timeout_ms(), 0);
    }
}
