//! oclsync-core - Core library for oclsync
//!
//! This crate keeps a local concept dictionary in step with an Open Concept
//! Lab source. It owns the update ledger, the subscription singleton, the
//! duplicate name resolver, and the `Updater` that drives a single run.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod updater;
pub mod util;

pub use config::EngineConfig;
pub use error::{Error, Result};
pub use models::{
    ConceptName, ConceptNameType, DemotedName, ImportedConcept, Subscription, UpdateCompletion,
    UpdateId, UpdateRecord, UpdateStatus,
};
pub use updater::{ConceptBatch, ConceptSource, FetchError, FetchPlan, RunReport, Updater};
