//! Environment bundle handed to every domain flow.

use std::sync::Arc;

use crate::repository::FederatedRepository;

use super::traits::{BaseMultimedia, BaseStorage};

/// Everything a use case needs: the entity-graph repository plus the two
/// external collaborators. Built once by the host and shared by reference.
#[derive(Clone)]
pub struct ClassroomDeps {
    pub repository: Arc<FederatedRepository>,
    pub storage: Arc<dyn BaseStorage>,
    pub multimedia: Arc<dyn BaseMultimedia>,
}

impl ClassroomDeps {
    pub fn new(
        repository: Arc<FederatedRepository>,
        storage: Arc<dyn BaseStorage>,
        multimedia: Arc<dyn BaseMultimedia>,
    ) -> Self {
        Self {
            repository,
            storage,
            multimedia,
        }
    }
}
