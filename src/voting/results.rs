use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::model::{
    api::election::{ElectionResults, NomineeResult, Publication, WinnerEntry},
    db::election::{Election, ElectionQuery, Mutation, Precondition},
    mongodb::Id,
};

use super::Voting;

/// A publication that keeps losing the race to other writers gives up after
/// this many attempts.
const MAX_PUBLISH_ATTEMPTS: u32 = 5;

/// Who is asking for results to be published.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Publisher {
    /// An administrator acting through the API.
    Admin { id: Id, super_admin: bool },
    /// The background reconciler.
    Reconciler,
}

impl Publisher {
    /// Only super-admins may publish before voting closes.
    fn may_publish_early(&self) -> bool {
        matches!(
            self,
            Self::Admin {
                super_admin: true,
                ..
            }
        )
    }
}

impl Display for Publisher {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Admin {
                id,
                super_admin: true,
            } => write!(f, "super-admin {id}"),
            Self::Admin { id, .. } => write!(f, "admin {id}"),
            Self::Reconciler => f.write_str("reconciler"),
        }
    }
}

impl Voting {
    /// Fix the winner of an election and freeze it.
    ///
    /// The winner is computed from a snapshot and written conditionally on that
    /// snapshot's version, so concurrent publishers cannot disagree: exactly
    /// one succeeds and the rest see [`Error::AlreadyPublished`].
    pub async fn publish_results(
        &self,
        id: Id,
        publisher: Publisher,
        now: DateTime<Utc>,
    ) -> Result<Election> {
        for _ in 0..MAX_PUBLISH_ATTEMPTS {
            let election = self
                .find_election(id)
                .await?
                .ok_or_else(|| Error::not_found(format!("Election {id}")))?;
            election.check_invariants()?;

            if election.result_published {
                return Err(Error::AlreadyPublished(id));
            }
            if !election.has_ended_at(now) && !publisher.may_publish_early() {
                return Err(Error::TooEarly(id));
            }
            let winner = election
                .leader()
                .ok_or(Error::NoNominees(id))?
                .candidate_id;

            let preconditions = [
                Precondition::Unpublished,
                Precondition::AtVersion(election.version),
            ];
            let mutation = Mutation::Publish { winner };
            let published = self
                .store
                .find_one_and_update(id, &preconditions, &mutation)
                .await?;
            match published {
                Some(election) => {
                    info!(
                        "Published election {id} ({}): winner {winner} with {} of {} votes, by {publisher}",
                        election.category,
                        election.winning_nominee().map_or(0, |n| n.vote_count),
                        election.total_votes(),
                    );
                    return Ok(election);
                }
                None => debug!("Election {id} changed while publishing, re-reading"),
            }
        }

        Err(Error::StoreUnavailable(format!(
            "election {id} kept changing while publishing"
        )))
    }

    /// Describe a freshly published result.
    pub async fn publication(&self, election: &Election) -> Result<Publication> {
        let profiles = self.profiles_for(std::slice::from_ref(election)).await?;
        let winner = NomineeResult::winner_of(election, &profiles).ok_or_else(|| {
            Error::InvariantViolation(format!("election {} has no published winner", election.id))
        })?;
        Ok(Publication {
            election_id: election.id.into(),
            winner,
        })
    }

    /// The full tally of one election.
    pub async fn results(&self, id: Id, now: DateTime<Utc>) -> Result<ElectionResults> {
        let election = self
            .find_election(id)
            .await?
            .ok_or_else(|| Error::not_found(format!("Election {id}")))?;
        let profiles = self.profiles_for(std::slice::from_ref(&election)).await?;
        Ok(ElectionResults::new(&election, &profiles, now))
    }

    /// The winners of every election matching `query`, newest first.
    pub async fn winners(&self, query: ElectionQuery) -> Result<Vec<WinnerEntry>> {
        let elections = self.retrying(|| self.store.find(query)).await?;
        let profiles = self.profiles_for(&elections).await?;
        Ok(elections
            .iter()
            .filter_map(|e| WinnerEntry::new(e, &profiles))
            .collect())
    }
}
