pub mod grouping;
pub mod merge;
pub mod natural_key;
pub mod reconcile_service;
pub mod report;

pub use reconcile_service::{ReconcileScope, ReconcileService, RunMode, RunSummary, TypeSummary};
