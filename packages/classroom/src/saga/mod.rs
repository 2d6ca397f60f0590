//! Saga unit-of-work: compensating actions over heterogeneous stores.
//!
//! The backing sub-repositories share no transaction manager, so writes are
//! made eagerly and every write records how to undo itself first. On failure
//! the saga replays the undo stack in reverse (LIFO), leaving every touched
//! entity byte-for-byte as it was before the flow started. There is no
//! commit: if `rollback` is never called, the writes stand.
//!
//! This is a compensating-transaction pattern, not true atomicity: concurrent
//! readers can observe intermediate states during the transaction window.
//!
//! A saga serves one logical task. The mutex around the undo stack exists
//! only to satisfy `Send + Sync` bounds; sharing one saga between concurrent
//! tasks is a caller error.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tracing::{debug, error};

use crate::common::{DomainError, EntityId};
use crate::entity::{Entity, EntityTag};
use crate::query::Query;
use crate::repository::{BaseEntityRepository, FederatedRepository};

/// How to undo one write.
enum Compensation {
    /// Re-write the pre-write snapshot verbatim.
    Restore(Entity),
    /// Remove an entity that did not exist before the write.
    Remove(EntityId),
}

/// Records compensating actions for every write made through a wrapped
/// repository handle.
#[derive(Clone)]
pub struct Saga {
    inner: Arc<SagaInner>,
}

struct SagaInner {
    compensations: Mutex<Vec<Compensation>>,
}

impl Saga {
    /// Open a fresh saga with an empty undo stack.
    pub fn open() -> Self {
        Self {
            inner: Arc::new(SagaInner {
                compensations: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Wrap a federated repository: the returned handle behaves identically
    /// but records a compensation before every write.
    pub fn wrap(&self, repository: Arc<FederatedRepository>) -> TransactionalRepository {
        TransactionalRepository {
            repository,
            saga: self.clone(),
        }
    }

    fn push(&self, compensation: Compensation) {
        self.inner.compensations.lock().unwrap().push(compensation);
    }

    /// Number of pending compensations.
    pub fn depth(&self) -> usize {
        self.inner.compensations.lock().unwrap().len()
    }

    /// Undo every recorded write in strict reverse order, then clear the
    /// stack. Idempotent: a second call finds an empty stack and does
    /// nothing.
    ///
    /// A compensation failure is logged and does not stop the remaining
    /// compensations from running; the first failure is returned at the end.
    pub async fn rollback(&self, repository: &FederatedRepository) -> Result<(), DomainError> {
        let pending = std::mem::take(&mut *self.inner.compensations.lock().unwrap());
        if pending.is_empty() {
            return Ok(());
        }
        debug!(compensations = pending.len(), "rolling back saga");

        let mut first_failure = None;
        for compensation in pending.into_iter().rev() {
            let outcome = match compensation {
                Compensation::Restore(snapshot) => repository.restore(snapshot).await,
                Compensation::Remove(id) => repository.remove(id).await,
            };
            if let Err(err) = outcome {
                error!(error = %err, "compensation failed during rollback");
                first_failure.get_or_insert(err);
            }
        }
        match first_failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// A repository handle whose writes are undoable through the owning [`Saga`].
pub struct TransactionalRepository {
    repository: Arc<FederatedRepository>,
    saga: Saga,
}

impl TransactionalRepository {
    /// The wrapped federated repository (used for rollback).
    pub fn unwrapped(&self) -> &Arc<FederatedRepository> {
        &self.repository
    }

    /// Roll the owning saga back through the wrapped repository.
    pub async fn rollback(&self) -> Result<(), DomainError> {
        self.saga.rollback(&self.repository).await
    }
}

#[async_trait]
impl BaseEntityRepository for TransactionalRepository {
    async fn get(&self, id: EntityId) -> Result<Option<Entity>, DomainError> {
        self.repository.get(id).await
    }

    async fn set(&self, entity: Entity) -> Result<Entity, DomainError> {
        match entity.meta {
            None => {
                // Mint the id up front so the compensation exists before the
                // write does.
                let stamped = self.repository.stamp(entity).await?;
                let id = stamped.id().ok_or_else(|| {
                    DomainError::Internal(anyhow::anyhow!("stamp produced no id"))
                })?;
                self.saga.push(Compensation::Remove(id));
                self.repository.write(stamped).await
            }
            Some(ref meta) => {
                match self.repository.get(meta.id).await? {
                    Some(snapshot) => self.saga.push(Compensation::Restore(snapshot)),
                    // A write with an explicit id that isn't stored yet still
                    // compensates as a removal.
                    None => self.saga.push(Compensation::Remove(meta.id)),
                }
                self.repository.set(entity).await
            }
        }
    }

    async fn remove(&self, id: EntityId) -> Result<(), DomainError> {
        if let Some(snapshot) = self.repository.get(id).await? {
            self.saga.push(Compensation::Restore(snapshot));
        }
        self.repository.remove(id).await
    }

    async fn query(
        &self,
        query: &Query,
        tag: Option<EntityTag>,
    ) -> Result<Vec<Entity>, DomainError> {
        self.repository.query(query, tag).await
    }
}
