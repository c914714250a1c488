//! Core-Domänentypen: Weichen, Registry, Panel-Layout, Symbolgeometrie.

pub mod geometry;
pub mod layout;
pub mod registry;
pub mod turnout;

pub use layout::{
    ConnectionRef, Endpoint, LayoutFull, LayoutModel, PanelItem, PointKind, RefKind, Track,
    GRID_SIZE, MAX_ENDPOINTS, MAX_ITEMS, MAX_TRACKS,
};
pub use registry::{RegistryError, StateCallback, TurnoutDef, TurnoutRegistry, MAX_TURNOUTS};
pub use turnout::{EventId, ParseEventIdError, Turnout, TurnoutState};
