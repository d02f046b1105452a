use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{PoisonError, RwLock};

use crate::error::{Error, Result};
use crate::model::mongodb::Id;

use super::{
    base::{Election, NewElection},
    store::{BallotStore, ElectionQuery, Mutation, Precondition},
};

/// How many times a conditional write is retried after losing a race.
const MAX_CAS_ATTEMPTS: u32 = 32;

/// A [`BallotStore`] held in process memory.
///
/// Conditional writes follow the same optimistic discipline a document store
/// gives us: take a snapshot, check and apply the change to a copy, then commit
/// only if nobody has bumped the version in the meantime.
#[derive(Default)]
pub struct MemoryStore {
    elections: RwLock<HashMap<Id, Election>>,
    failures: AtomicU32,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` store calls fail with [`Error::StoreUnavailable`].
    pub fn inject_failures(&self, count: u32) {
        self.failures.store(count, Ordering::SeqCst);
    }

    /// Overwrite an election wholesale, bypassing every check.
    pub fn put(&self, election: Election) -> Result<()> {
        self.elections
            .write()
            .map_err(poisoned)?
            .insert(election.id, election);
        Ok(())
    }

    fn check_available(&self) -> Result<()> {
        let injected = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        match injected {
            Ok(_) => Err(Error::StoreUnavailable("injected failure".to_string())),
            Err(_) => Ok(()),
        }
    }

    fn snapshot(&self, id: Id) -> Result<Option<Election>> {
        Ok(self.elections.read().map_err(poisoned)?.get(&id).cloned())
    }

    /// Replace the stored election iff it is still at `expected_version`.
    fn commit(&self, expected_version: u64, next: Election) -> Result<bool> {
        let mut elections = self.elections.write().map_err(poisoned)?;
        match elections.get_mut(&next.id) {
            Some(current) if current.version == expected_version => {
                *current = next;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[rocket::async_trait]
impl BallotStore for MemoryStore {
    async fn insert(&self, election: NewElection) -> Result<Election> {
        self.check_available()?;
        let election = Election {
            id: Id::new(),
            election,
        };
        self.put(election.clone())?;
        Ok(election)
    }

    async fn find_by_id(&self, id: Id) -> Result<Option<Election>> {
        self.check_available()?;
        self.snapshot(id)
    }

    async fn find(&self, query: ElectionQuery) -> Result<Vec<Election>> {
        self.check_available()?;
        let mut found: Vec<Election> = self
            .elections
            .read()
            .map_err(poisoned)?
            .values()
            .filter(|e| query.matches(e))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn find_one_and_update(
        &self,
        id: Id,
        preconditions: &[Precondition],
        mutation: &Mutation,
    ) -> Result<Option<Election>> {
        self.check_available()?;
        for _ in 0..MAX_CAS_ATTEMPTS {
            let Some(mut election) = self.snapshot(id)? else {
                return Ok(None);
            };
            if !preconditions.iter().all(|p| p.holds(&election)) {
                return Ok(None);
            }
            let expected_version = election.version;
            mutation.apply(&mut election);
            if self.commit(expected_version, election.clone())? {
                return Ok(Some(election));
            }
            rocket::tokio::task::yield_now().await;
        }
        Err(Error::StoreUnavailable(format!(
            "election {id} is too contended to update"
        )))
    }

    async fn delete_if(&self, id: Id, preconditions: &[Precondition]) -> Result<bool> {
        self.check_available()?;
        let mut elections = self.elections.write().map_err(poisoned)?;
        match elections.get(&id) {
            Some(election) if preconditions.iter().all(|p| p.holds(election)) => {
                elections.remove(&id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

fn poisoned<T>(_: PoisonError<T>) -> Error {
    Error::StoreUnavailable("election store lock poisoned".to_string())
}
