//! Persistenz: Weichenliste (JSON), Panel-Layout (JSON), JMRI-Import (XML).

pub mod jmri;
pub mod layout;
pub mod roster;

use anyhow::{Context, Result};
use std::path::Path;
use std::time::Duration;

/// Wiederholversuche beim Schreiben (die SD-Karte braucht gelegentlich
/// einen Moment nach dem Aufwachen).
const WRITE_MAX_RETRIES: u32 = 3;
const WRITE_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Schreibt `content` atomar nach `path`: Temp-Datei im selben Verzeichnis,
/// dann Rename. Ein Absturz mitten im Schreiben hinterlässt nie eine
/// halbe Zieldatei.
pub(crate) fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
    let dir = dir.unwrap_or_else(|| Path::new("."));

    let mut last_err: Option<anyhow::Error> = None;
    for attempt in 1..=WRITE_MAX_RETRIES {
        match try_write_atomic(dir, path, content) {
            Ok(()) => return Ok(()),
            Err(e) => {
                log::warn!(
                    "Schreiben nach {} fehlgeschlagen (Versuch {}/{}): {}",
                    path.display(),
                    attempt,
                    WRITE_MAX_RETRIES,
                    e
                );
                last_err = Some(e);
                if attempt < WRITE_MAX_RETRIES {
                    std::thread::sleep(WRITE_RETRY_DELAY);
                }
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Schreiben fehlgeschlagen")))
        .with_context(|| format!("Konnte {} nicht schreiben", path.display()))
}

fn try_write_atomic(dir: &Path, path: &Path, content: &str) -> Result<()> {
    use std::io::Write;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(content.as_bytes())?;
    tmp.flush()?;
    tmp.persist(path)?;
    Ok(())
}
