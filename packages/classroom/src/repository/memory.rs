//! In-memory reference implementations of the storage seam.
//!
//! These evaluate the full query description language (predicate tree,
//! ordering, limit, cursor) over a snapshot of the store. Every test in the
//! crate runs against them; embedders can use them for local development.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use crate::common::{Cursor, EntityId};
use crate::entity::{Entity, EntityTag};
use crate::query::{compare_values, field_at, Direction, Query};

use super::federated::FederatedRepository;
use super::traits::{BaseIdentityContext, BaseSubRepository};

/// One in-memory store for one entity tag.
///
/// A `BTreeMap` keyed by id gives deterministic iteration in id order, which
/// (with time-ordered v7 ids) is chronological when no explicit ordering is
/// requested.
#[derive(Default)]
pub struct MemorySubRepository {
    entities: Mutex<BTreeMap<EntityId, Entity>>,
}

impl MemorySubRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BaseSubRepository for MemorySubRepository {
    async fn get(&self, id: EntityId) -> Result<Option<Entity>> {
        Ok(self.entities.lock().unwrap().get(&id).cloned())
    }

    async fn set(&self, entity: Entity) -> Result<Entity> {
        let id = entity
            .id()
            .ok_or_else(|| anyhow::anyhow!("sub-repository received a draft without meta"))?;
        self.entities.lock().unwrap().insert(id, entity.clone());
        Ok(entity)
    }

    async fn remove(&self, id: EntityId) -> Result<()> {
        self.entities.lock().unwrap().remove(&id);
        Ok(())
    }

    async fn query(&self, query: &Query) -> Result<Vec<Entity>> {
        let snapshot: Vec<Entity> = self.entities.lock().unwrap().values().cloned().collect();

        let mut matched = Vec::new();
        for entity in snapshot {
            let projection = entity.to_value()?;
            let keep = match &query.predicate {
                Some(predicate) => predicate.matches(&projection),
                None => true,
            };
            if keep {
                matched.push((projection, entity));
            }
        }

        if !query.order_by.is_empty() {
            matched.sort_by(|(a, _), (b, _)| {
                for ordering in &query.order_by {
                    let left = field_at(a, &ordering.field);
                    let right = field_at(b, &ordering.field);
                    let cmp = match (left, right) {
                        (Some(l), Some(r)) => compare_values(l, r),
                        (Some(_), None) => std::cmp::Ordering::Greater,
                        (None, Some(_)) => std::cmp::Ordering::Less,
                        (None, None) => std::cmp::Ordering::Equal,
                    };
                    let cmp = match ordering.direction {
                        Direction::Asc => cmp,
                        Direction::Desc => cmp.reverse(),
                    };
                    if cmp != std::cmp::Ordering::Equal {
                        return cmp;
                    }
                }
                std::cmp::Ordering::Equal
            });
        }

        let offset = match &query.cursor {
            Some(token) => Cursor::decode(token)?.offset() as usize,
            None => 0,
        };
        let limit = query.limit.unwrap_or(usize::MAX);

        Ok(matched
            .into_iter()
            .map(|(_, entity)| entity)
            .skip(offset)
            .take(limit)
            .collect())
    }
}

/// In-memory identity context: uuid-v7 minting plus a guarded id → tag map.
#[derive(Default)]
pub struct MemoryIdentityContext {
    bindings: Mutex<HashMap<EntityId, EntityTag>>,
}

impl MemoryIdentityContext {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BaseIdentityContext for MemoryIdentityContext {
    async fn next_id(&self) -> Result<EntityId> {
        Ok(EntityId::new())
    }

    async fn bind(&self, id: EntityId, tag: EntityTag) -> Result<()> {
        self.bindings.lock().unwrap().insert(id, tag);
        Ok(())
    }

    async fn resolve(&self, id: EntityId) -> Result<Option<EntityTag>> {
        Ok(self.bindings.lock().unwrap().get(&id).copied())
    }
}

/// A federated repository with an in-memory store registered for every tag.
pub fn memory_repository() -> Arc<FederatedRepository> {
    let identity = Arc::new(MemoryIdentityContext::new());
    let tags = [
        EntityTag::Audio,
        EntityTag::Classroom,
        EntityTag::Message,
        EntityTag::Participant,
        EntityTag::Transcript,
        EntityTag::Entitlement,
        EntityTag::Ownership,
        EntityTag::Participation,
        EntityTag::Source,
        EntityTag::OccursIn,
        EntityTag::Representation,
        EntityTag::Usage,
        EntityTag::Granted,
        EntityTag::PolicyAggregate,
        EntityTag::UsagePolicy,
    ];
    let mut builder = FederatedRepository::builder(identity);
    for tag in tags {
        builder = builder.register(tag, Arc::new(MemorySubRepository::new()));
    }
    Arc::new(builder.build())
}
