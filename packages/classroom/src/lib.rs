//! Classroom domain core: a federated entity graph with saga-based
//! compensating rollback and entitlement-based usage authorization.
//!
//! Everything in the system is an [`entity::Entity`]: content nodes (audio,
//! classrooms, messages, participants, transcripts, entitlements) and the
//! relationship edges between them. Entities live in per-tag stores behind
//! one [`repository::FederatedRepository`]; multi-write flows wrap it in a
//! [`saga::Saga`] so a failure anywhere rolls every write back. The use-case
//! flows themselves live under [`domains::classroom`].

pub mod common;
pub mod domains;
pub mod entity;
pub mod kernel;
pub mod query;
pub mod repository;
pub mod saga;

pub use common::{DomainError, EntityId};
pub use entity::{Entity, EntityProps, EntityTag};
pub use kernel::ClassroomDeps;
pub use repository::{BaseEntityRepository, FederatedRepository};
pub use saga::Saga;
