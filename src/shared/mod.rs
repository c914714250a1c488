//! Geteilte Typen für layer-übergreifende Verträge.

pub mod options;

pub use options::PanelOptions;
pub use options::{DEFAULT_QUERY_PACE_MS, DEFAULT_STALE_TIMEOUT_SEC};
