// src/pipeline/mod.rs

//! Pipeline entry points for import operations.
//!
//! - `run_import`: drive the selected importers and reconcile the catalog
//! - `Reconciler`: record-by-record reconciliation inside one transaction

pub mod import;
pub mod reconcile;

pub use import::run_import;
pub use reconcile::Reconciler;
