//! Database layer for oclsync

mod concept_repository;
mod connection;
mod migrations;
mod rows;
mod subscription_repository;
mod update_repository;

pub use concept_repository::{ConceptRepository, LibSqlConceptRepository};
pub use connection::Database;
pub use subscription_repository::{LibSqlSubscriptionRepository, SubscriptionRepository};
pub use update_repository::{LibSqlUpdateRepository, UpdateRepository};
