//! Periodischer Stale-Sweep über die Weichen-Registry.
//!
//! Ein Hintergrund-Thread ruft in festem Intervall `check_stale` auf.
//! Weichen ohne frische Rückmeldung kippen so nach dem konfigurierten
//! Timeout auf `Stale`, ohne dass der UI-Thread daran beteiligt ist.

use crate::core::registry::TurnoutRegistry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Schrittweite beim Warten, damit `stop` zeitnah greift.
const SLEEP_STEP: Duration = Duration::from_millis(100);

/// Hintergrund-Sweep, der Weichen ohne Rückmeldung als Stale markiert.
pub struct StaleSupervisor {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl StaleSupervisor {
    /// Startet den Sweep-Thread. `timeout_ms == 0` deaktiviert die
    /// Stale-Erkennung; es wird dann gar kein Thread gestartet.
    pub fn start(registry: Arc<TurnoutRegistry>, timeout_ms: u64, interval: Duration) -> Self {
        let stop = Arc::new(AtomicBool::new(false));

        if timeout_ms == 0 {
            log::info!("Stale-Erkennung deaktiviert");
            return Self { stop, handle: None };
        }

        let stop_flag = stop.clone();
        let handle = std::thread::Builder::new()
            .name("stale-sweep".to_string())
            .spawn(move || {
                log::info!(
                    "Stale-Sweep gestartet (Timeout {} ms, Intervall {} ms)",
                    timeout_ms,
                    interval.as_millis()
                );
                while !stop_flag.load(Ordering::SeqCst) {
                    registry.check_stale(timeout_ms);
                    sleep_interruptible(interval, &stop_flag);
                }
                log::info!("Stale-Sweep beendet");
            })
            .expect("Stale-Sweep-Thread konnte nicht gestartet werden");

        Self {
            stop,
            handle: Some(handle),
        }
    }

    /// Stoppt den Sweep-Thread und wartet auf sein Ende.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Stale-Sweep-Thread ist gepaniced");
            }
        }
    }
}

impl Drop for StaleSupervisor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn sleep_interruptible(total: Duration, stop: &AtomicBool) {
    let mut remaining = total;
    while !remaining.is_zero() && !stop.load(Ordering::SeqCst) {
        let step = remaining.min(SLEEP_STEP);
        std::thread::sleep(step);
        remaining = remaining.saturating_sub(step);
    }
}
