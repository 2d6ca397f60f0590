//! The federated entity-graph repository and its storage seam.

pub mod federated;
pub mod memory;
pub mod traits;

pub use federated::{FederatedRepository, FederatedRepositoryBuilder};
pub use memory::{memory_repository, MemoryIdentityContext, MemorySubRepository};
pub use traits::{BaseEntityRepository, BaseIdentityContext, BaseSubRepository};
