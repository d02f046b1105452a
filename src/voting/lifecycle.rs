use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::model::{
    api::election::{ElectionPatch, ElectionSpec},
    db::election::{Election, Mutation, NewElection, Precondition},
    mongodb::Id,
};

use super::Voting;

impl Voting {
    /// Create a new election with every tally at zero.
    pub async fn create_election(&self, spec: ElectionSpec, now: DateTime<Utc>) -> Result<Election> {
        let spec = spec.validate(now)?;
        self.check_candidates_exist(&spec.nominee_ids).await?;

        let election = NewElection::new(spec.category, spec.nominee_ids, spec.end_time, now);
        let election = self.store.insert(election).await?;
        info!(
            "Created election {} ({}) with {} nominees, closing {}",
            election.id,
            election.category,
            election.nominees.len(),
            election.end_time
        );
        Ok(election)
    }

    /// Edit an election whose voting window has not yet closed. A new nominee
    /// list restarts every tally; the record of who has voted is kept.
    pub async fn update_election(
        &self,
        id: Id,
        patch: ElectionPatch,
        now: DateTime<Utc>,
    ) -> Result<Election> {
        let amendment = patch.validate(now)?;
        if let Some(nominees) = &amendment.nominees {
            self.check_candidates_exist(nominees).await?;
        }

        let mutation = Mutation::Amend(amendment);
        let preconditions = [Precondition::Editable(now)];
        let updated = self
            .store
            .find_one_and_update(id, &preconditions, &mutation)
            .await?;
        match updated {
            Some(election) => {
                info!("Updated election {id}");
                Ok(election)
            }
            None => match self.find_election(id).await? {
                None => Err(Error::not_found(format!("Election {id}"))),
                Some(_) => Err(Error::WindowClosed(id)),
            },
        }
    }

    /// Delete an election, provided nobody has voted in it yet.
    pub async fn delete_election(&self, id: Id) -> Result<()> {
        let preconditions = [Precondition::Untouched];
        let deleted = self.store.delete_if(id, &preconditions).await?;
        if deleted {
            info!("Deleted election {id}");
            return Ok(());
        }
        match self.find_election(id).await? {
            None => Err(Error::not_found(format!("Election {id}"))),
            Some(election) => Err(Error::Conflict(format!(
                "election {id} is {:?} with {} ballots cast and can no longer be deleted",
                election.status,
                election.total_votes()
            ))),
        }
    }

    /// Fail with the first candidate the directory does not know.
    async fn check_candidates_exist(&self, candidates: &[Id]) -> Result<()> {
        let found = self
            .retrying(|| self.directory.resolve_users(candidates))
            .await?;
        match candidates
            .iter()
            .find(|id| !found.iter().any(|m| m.id == **id))
        {
            Some(missing) => Err(Error::InvalidReference(*missing)),
            None => Ok(()),
        }
    }
}
