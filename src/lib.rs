//! LCC-Weichenstellpult — Zustands- und Layout-Kern.
//! Core-Funktionalität als Library exportiert für Tests und Wiederverwendung.

pub mod app;
pub mod core;
pub mod lcc;
pub mod shared;
pub mod storage;

pub use app::{PanelContext, StaleSupervisor};
pub use core::{
    ConnectionRef, Endpoint, EventId, LayoutModel, PanelItem, PointKind, RefKind, Track, Turnout,
    TurnoutRegistry, TurnoutState,
};
pub use lcc::{BusInterface, EventRouter};
pub use shared::PanelOptions;
