//! Storage contract shared by all ledger adapters.
//!
//! The ledgers never persist implicitly: they `load` (or `create`) a
//! position, mutate a local copy, and hand it back through `save` only once
//! the whole operation has succeeded. Positions are never deleted.

use crate::core::error::{RepositoryError, Result, SettlementError};
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

/// An entity owned by exactly one key.
pub trait Position: Clone {
    type Key: Clone + Eq + Hash + fmt::Display + fmt::Debug;

    /// A fresh position with every field explicitly zeroed.
    fn zeroed(key: Self::Key) -> Self;

    fn key(&self) -> &Self::Key;
}

pub trait Repository<P: Position> {
    fn load(&self, key: &P::Key) -> std::result::Result<Option<P>, RepositoryError>;

    /// Builds a zero-initialized position. Nothing is stored until `save`.
    fn create(&mut self, key: &P::Key) -> std::result::Result<P, RepositoryError> {
        Ok(P::zeroed(key.clone()))
    }

    /// Inserts or replaces the position under its key.
    fn save(&mut self, position: &P) -> std::result::Result<(), RepositoryError>;
}

/// Outcome of [`load_or_create`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetched<P> {
    Created(P),
    Loaded(P),
}

impl<P> Fetched<P> {
    pub fn was_created(&self) -> bool {
        matches!(self, Fetched::Created(_))
    }

    pub fn into_inner(self) -> P {
        match self {
            Fetched::Created(p) | Fetched::Loaded(p) => p,
        }
    }
}

pub fn load_or_create<P, R>(repo: &mut R, key: &P::Key) -> Result<Fetched<P>>
where
    P: Position,
    R: Repository<P> + ?Sized,
{
    match repo.load(key)? {
        Some(position) => Ok(Fetched::Loaded(position)),
        None => Ok(Fetched::Created(repo.create(key)?)),
    }
}

/// Loads a position that must already exist.
pub fn load_existing<P, R>(repo: &R, key: &P::Key) -> Result<P>
where
    P: Position,
    R: Repository<P> + ?Sized,
{
    repo.load(key)?
        .ok_or_else(|| SettlementError::MissingPosition {
            key: key.to_string(),
        })
}

/// Process-local repository backed by a `HashMap`.
#[derive(Debug, Clone)]
pub struct InMemoryRepository<P: Position> {
    positions: HashMap<P::Key, P>,
}

impl<P: Position> InMemoryRepository<P> {
    pub fn new() -> Self {
        Self {
            positions: HashMap::new(),
        }
    }

    pub fn get(&self, key: &P::Key) -> Option<&P> {
        self.positions.get(key)
    }

    pub fn positions(&self) -> impl Iterator<Item = &P> {
        self.positions.values()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

impl<P: Position> Default for InMemoryRepository<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Position> Repository<P> for InMemoryRepository<P> {
    fn load(&self, key: &P::Key) -> std::result::Result<Option<P>, RepositoryError> {
        Ok(self.positions.get(key).cloned())
    }

    fn save(&mut self, position: &P) -> std::result::Result<(), RepositoryError> {
        self.positions
            .insert(position.key().clone(), position.clone());
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Counter {
        key: String,
        value: u32,
    }

    impl Position for Counter {
        type Key = String;

        fn zeroed(key: String) -> Self {
            Counter { key, value: 0 }
        }

        fn key(&self) -> &String {
            &self.key
        }
    }

    /// Repository whose every call fails; used to check error propagation.
    #[derive(Debug, Default)]
    pub(crate) struct FailingRepository;

    impl<P: Position> Repository<P> for FailingRepository {
        fn load(&self, key: &P::Key) -> std::result::Result<Option<P>, RepositoryError> {
            Err(RepositoryError::Load {
                key: key.to_string(),
                reason: "unavailable".into(),
            })
        }

        fn save(&mut self, position: &P) -> std::result::Result<(), RepositoryError> {
            Err(RepositoryError::Save {
                key: position.key().to_string(),
                reason: "unavailable".into(),
            })
        }
    }

    #[test]
    fn test_load_or_create_tags_result() {
        let mut repo = InMemoryRepository::<Counter>::new();
        let key = "k".to_string();

        let fetched = load_or_create(&mut repo, &key).unwrap();
        assert!(fetched.was_created());
        // create does not persist
        assert!(repo.is_empty());

        let mut counter = fetched.into_inner();
        counter.value = 3;
        repo.save(&counter).unwrap();

        let fetched = load_or_create(&mut repo, &key).unwrap();
        assert_eq!(fetched, Fetched::Loaded(Counter { key, value: 3 }));
    }

    #[test]
    fn test_load_existing_missing() {
        let repo = InMemoryRepository::<Counter>::new();
        let err = load_existing(&repo, &"nope".to_string()).unwrap_err();
        assert_eq!(
            err,
            SettlementError::MissingPosition {
                key: "nope".into()
            }
        );
    }

    #[test]
    fn test_repository_failure_propagates() {
        let mut repo = FailingRepository;
        let err = load_or_create::<Counter, _>(&mut repo, &"k".to_string()).unwrap_err();
        assert!(matches!(err, SettlementError::Repository(RepositoryError::Load { .. })));
    }
}
