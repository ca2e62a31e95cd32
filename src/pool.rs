//! A bounded pool of uniquely-identified worker entities.
//!
//! The pool is a capacity-`N` queue plus an ID ledger. Taking an entity marks
//! its ledger entry out-of-pool; giving it back flips the entry and requeues
//! it. The ledger is what catches misuse: an entity the pool never issued is
//! rejected as unknown, and a second instance carrying an ID that is already
//! back in the pool is rejected as a double return. Misuse is an error
//! return, never a panic.

use std::collections::HashMap;

use kanal::{AsyncReceiver, AsyncSender};
use parking_lot::Mutex;
use thiserror::Error;

use crate::ids::IdGenerator;

/// A pooled worker with an ID unique within its pool.
pub trait Entity: Send + 'static {
    fn id(&self) -> u32;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("the pool capacity can not be 0")]
    InvalidCapacity,
    #[error("the pool is closed")]
    Closed,
    #[error("the entity (id={id}) does not belong to this pool")]
    UnknownEntity { id: u32 },
    #[error("the entity (id={id}) is already in the pool")]
    AlreadyInPool { id: u32 },
}

pub struct EntityPool<T: Entity> {
    total: u32,
    entities_tx: AsyncSender<T>,
    entities_rx: AsyncReceiver<T>,
    // id -> currently in pool?
    id_ledger: Mutex<HashMap<u32, bool>>,
}

impl<T: Entity> EntityPool<T> {
    /// Eagerly builds `total` entities, assigning each a fresh ID from a
    /// pool-local generator.
    pub fn new(total: u32, mut factory: impl FnMut(u32) -> T) -> Result<Self, PoolError> {
        if total == 0 {
            return Err(PoolError::InvalidCapacity);
        }
        let (entities_tx, entities_rx) = kanal::bounded_async(total as usize);
        let id_gen = IdGenerator::new();
        let mut id_ledger = HashMap::with_capacity(total as usize);
        for _ in 0..total {
            let id = id_gen.next_id();
            let entity = factory(id);
            id_ledger.insert(id, true);
            // The queue was sized for exactly `total` entities.
            if !entities_tx.try_send(entity).unwrap_or(false) {
                return Err(PoolError::Closed);
            }
        }
        Ok(EntityPool {
            total,
            entities_tx,
            entities_rx,
            id_ledger: Mutex::new(id_ledger),
        })
    }

    /// Removes one entity from the pool, waiting while the pool is empty.
    pub async fn take(&self) -> Result<T, PoolError> {
        let entity = self
            .entities_rx
            .recv()
            .await
            .map_err(|_| PoolError::Closed)?;
        self.id_ledger.lock().insert(entity.id(), false);
        Ok(entity)
    }

    /// Puts an entity back. Rejects IDs the pool never issued and IDs whose
    /// entity is already in the pool.
    pub fn give_back(&self, entity: T) -> Result<(), PoolError> {
        let id = entity.id();
        let mut ledger = self.id_ledger.lock();
        match ledger.get(&id).copied() {
            None => Err(PoolError::UnknownEntity { id }),
            Some(true) => Err(PoolError::AlreadyInPool { id }),
            Some(false) => {
                if self.entities_tx.try_send(entity).unwrap_or(false) {
                    ledger.insert(id, true);
                    Ok(())
                } else {
                    Err(PoolError::Closed)
                }
            }
        }
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    /// Number of entities currently out of the pool.
    pub fn used(&self) -> u32 {
        self.total - self.entities_rx.len() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Worker {
        id: u32,
    }

    impl Entity for Worker {
        fn id(&self) -> u32 {
            self.id
        }
    }

    fn pool(total: u32) -> EntityPool<Worker> {
        EntityPool::new(total, |id| Worker { id }).unwrap()
    }

    #[test]
    fn rejects_zero_capacity() {
        assert_eq!(
            EntityPool::new(0, |id| Worker { id }).err(),
            Some(PoolError::InvalidCapacity)
        );
    }

    #[tokio::test]
    async fn take_and_give_back_round_trip() {
        let pool = pool(3);
        assert_eq!(pool.total(), 3);
        assert_eq!(pool.used(), 0);

        let worker = pool.take().await.unwrap();
        assert_eq!(pool.used(), 1);

        pool.give_back(worker).unwrap();
        assert_eq!(pool.used(), 0);
    }

    #[tokio::test]
    async fn ids_are_distinct_across_the_population() {
        let pool = pool(3);
        let a = pool.take().await.unwrap();
        let b = pool.take().await.unwrap();
        let c = pool.take().await.unwrap();
        assert_eq!(pool.used(), 3);
        let mut ids = vec![a.id(), b.id(), c.id()];
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 3);
    }

    #[tokio::test]
    async fn double_return_is_rejected_naming_the_id() {
        let pool = pool(2);
        let worker = pool.take().await.unwrap();
        let id = worker.id();
        pool.give_back(worker).unwrap();

        let err = pool.give_back(Worker { id }).unwrap_err();
        assert_eq!(err, PoolError::AlreadyInPool { id });
        assert!(err.to_string().contains(&id.to_string()));
    }

    #[tokio::test]
    async fn foreign_entities_are_rejected() {
        let pool = pool(2);
        let err = pool.give_back(Worker { id: 999 }).unwrap_err();
        assert_eq!(err, PoolError::UnknownEntity { id: 999 });
    }

    #[tokio::test]
    async fn used_plus_queued_always_equals_total() {
        let pool = pool(4);
        let a = pool.take().await.unwrap();
        let b = pool.take().await.unwrap();
        assert_eq!(pool.used() + pool.entities_rx.len() as u32, pool.total());
        pool.give_back(a).unwrap();
        assert_eq!(pool.used() + pool.entities_rx.len() as u32, pool.total());
        pool.give_back(b).unwrap();
        assert_eq!(pool.used(), 0);
    }

    #[tokio::test]
    async fn take_waits_until_an_entity_is_returned() {
        let pool = std::sync::Arc::new(pool(1));
        let worker = pool.take().await.unwrap();

        let waiter = {
            let pool = std::sync::Arc::clone(&pool);
            tokio::spawn(async move { pool.take().await.unwrap().id() })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        let id = worker.id();
        pool.give_back(worker).unwrap();
        assert_eq!(waiter.await.unwrap(), id);
    }
}
