//! Anbindung an den LCC/OpenLCB-Bus.
//!
//! Der eigentliche Bus-Stack (Framing, Arbitrierung, Node-Discovery) lebt
//! außerhalb dieses Kerns. Hier liegt nur der schmale Vertrag dorthin
//! (`BusInterface`) und das Event-Routing in die Registry.

pub mod router;

use crate::core::turnout::EventId;
use anyhow::Result;

pub use router::{DiscoveryCallback, EventRouter};

/// Schmaler Vertrag zum Netzwerk-Layer.
///
/// Implementierungen müssen von beiden Threads (UI und Netzwerk) aufrufbar
/// sein. In Tests genügt ein aufzeichnendes Fake.
pub trait BusInterface: Send + Sync {
    /// Sendet ein EventReport (Stellbefehl) auf den Bus.
    fn send_event(&self, event: EventId) -> Result<()>;

    /// Sendet eine IdentifyProducer-Abfrage ("wer produziert dieses Event?").
    /// Produzenten antworten mit ProducerIdentified samt Zustandsinfo —
    /// löst im Gegensatz zu `send_event` keine Weichenbewegung aus.
    fn query_producer(&self, event: EventId) -> Result<()>;

    /// Meldet ein Event-Paar als konsumiert an (rein informativ: der Router
    /// verarbeitet auch unregistrierte Events aus dem globalen Feed).
    fn register_turnout_events(&self, event_normal: EventId, event_reverse: EventId);
}
