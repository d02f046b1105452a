//! The election service: lifecycle management, ballot casting, result
//! publication and background reconciliation, over a [`BallotStore`] and a
//! [`MemberDirectory`].

use std::future::Future;
use std::sync::Arc;

use crate::error::Result;
use crate::model::{
    api::member::Profiles,
    db::{
        election::{BallotStore, Election},
        member::MemberDirectory,
    },
    mongodb::Id,
};
use crate::retry::{retry_transient, RetryPolicy};

mod casting;
mod lifecycle;
mod listing;
mod reconciler;
mod results;

pub use reconciler::{
    run_once, ReconcileFailure, ReconciliationReport, Reconciler, ReconcilerFairing,
    ReconcilerStatus,
};
pub use results::Publisher;

/// Shared handle on the election service. Cheap to clone; lives in managed state.
#[derive(Clone)]
pub struct Voting {
    store: Arc<dyn BallotStore>,
    directory: Arc<dyn MemberDirectory>,
    retry: RetryPolicy,
}

impl Voting {
    pub fn new(
        store: Arc<dyn BallotStore>,
        directory: Arc<dyn MemberDirectory>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            directory,
            retry,
        }
    }

    /// Run a store read under the retry policy.
    ///
    /// Writes are never re-sent from here: a conditional write whose reply was
    /// lost would match nothing on the second attempt and be misreported as a
    /// refusal. Retrying writes is left to the driver's retryable writes.
    async fn retrying<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        retry_transient(&self.retry, op).await
    }

    async fn find_election(&self, id: Id) -> Result<Option<Election>> {
        self.retrying(|| self.store.find_by_id(id)).await
    }

    /// Resolve the directory profiles of every nominee across `elections`.
    async fn profiles_for(&self, elections: &[Election]) -> Result<Profiles> {
        let mut ids: Vec<Id> = elections
            .iter()
            .flat_map(|e| e.nominees.iter().map(|n| n.candidate_id))
            .collect();
        ids.sort();
        ids.dedup();
        let members = self
            .retrying(|| self.directory.resolve_users(&ids))
            .await?;
        Ok(members.into_iter().map(|m| (m.id, m)).collect())
    }
}

/// Shared fixtures for the service's tests.
#[cfg(test)]
pub mod examples {
    use std::sync::Arc;

    use crate::model::db::{
        election::MemoryStore,
        member::{Member, MemoryDirectory},
    };
    use crate::retry::RetryPolicy;
    use rocket::tokio::time::Duration;

    use super::Voting;

    /// An in-memory service with a directory of the given members.
    pub struct TestVoting {
        pub voting: Voting,
        pub store: Arc<MemoryStore>,
    }

    impl TestVoting {
        pub fn new(members: &[Member]) -> Self {
            let store = Arc::new(MemoryStore::new());
            let directory = Arc::new(MemoryDirectory::new(members.iter().cloned()));
            let voting = Voting::new(
                store.clone(),
                directory,
                RetryPolicy::new(2, Duration::from_millis(1)),
            );
            Self { voting, store }
        }
    }
}
