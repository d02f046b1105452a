use chrono::{DateTime, Utc};

use crate::error::{CastRejection, Error, Result};
use crate::model::{
    db::election::{Election, Mutation, Precondition},
    mongodb::Id,
};

use super::Voting;

/// Conditional writes that match nothing for no diagnosable reason are retried
/// this many times before giving up.
const MAX_CAST_ATTEMPTS: u32 = 3;

impl Voting {
    /// Record `voter`'s ballot for `candidate`.
    ///
    /// Every check happens inside one conditional write, so concurrent ballots
    /// can neither double-count nor lose an update.
    pub async fn cast_ballot(
        &self,
        election_id: Id,
        voter: Id,
        candidate: Id,
        now: DateTime<Utc>,
    ) -> Result<Election> {
        let preconditions = [
            Precondition::AcceptingBallots(now),
            Precondition::NotVotedBy(voter),
            Precondition::Nominates(candidate),
        ];
        let mutation = Mutation::CastBallot { voter, candidate };

        for attempt in 1..=MAX_CAST_ATTEMPTS {
            let updated = self
                .store
                .find_one_and_update(election_id, &preconditions, &mutation)
                .await?;
            if let Some(election) = updated {
                debug!("Ballot cast in election {election_id}");
                return Ok(election);
            }

            let current = self.find_election(election_id).await?;
            if let Some(rejection) = diagnose(current.as_ref(), voter, candidate, now) {
                debug!("Ballot refused in election {election_id}: {rejection}");
                return Err(rejection.into());
            }
            warn!("Ballot write for election {election_id} matched nothing (attempt {attempt})");
        }

        Err(Error::StoreUnavailable(format!(
            "could not record ballot in election {election_id}"
        )))
    }
}

/// Work out why a ballot was refused, from a fresh read of the election.
/// `None` means every precondition now holds.
fn diagnose(
    election: Option<&Election>,
    voter: Id,
    candidate: Id,
    now: DateTime<Utc>,
) -> Option<CastRejection> {
    let Some(election) = election else {
        return Some(CastRejection::NotFound);
    };
    if election.has_voted(voter) {
        Some(CastRejection::AlreadyVoted)
    } else if !election.accepts_ballots_at(now) {
        Some(CastRejection::WindowClosed)
    } else if election.nominee(candidate).is_none() {
        Some(CastRejection::InvalidNominee)
    } else {
        None
    }
}
