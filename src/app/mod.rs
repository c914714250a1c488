//! Application-Layer: Kontext, Stale-Sweep und Use-Cases.

pub mod context;
pub mod stale;
pub mod use_cases;

pub use context::PanelContext;
pub use stale::StaleSupervisor;
