//! Data models for oclsync

mod concept;
mod subscription;
mod update;

pub use concept::{ConceptName, ConceptNameType, DemotedName, ImportedConcept};
pub use subscription::Subscription;
pub use update::{UpdateCompletion, UpdateId, UpdateRecord, UpdateStatus};
