use std::collections::HashSet;
use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{common::election::ElectionStatus, mongodb::Id};

/// A candidate standing in an election, with their running tally.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nominee {
    /// ID of the member standing.
    pub candidate_id: Id,
    /// Number of ballots cast for this nominee.
    pub vote_count: u64,
}

impl Nominee {
    pub fn new(candidate_id: Id) -> Self {
        Self {
            candidate_id,
            vote_count: 0,
        }
    }
}

/// Core election data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionCore {
    /// What is being voted on.
    pub category: String,
    /// Candidates in display order. Order matters for tie-breaking.
    pub nominees: Vec<Nominee>,
    /// Everyone who has cast a ballot. Only ever grows.
    pub voters: Vec<Id>,
    /// Ballots are accepted from this point.
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    /// Ballots are refused from this point.
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub end_time: DateTime<Utc>,
    /// Set once, at publication.
    pub winner: Option<Id>,
    pub result_published: bool,
    pub status: ElectionStatus,
    /// Bumped by every write; the basis of compare-and-swap updates.
    pub version: u64,
}

impl ElectionCore {
    /// Create a new pending election with every tally at zero.
    pub fn new(
        category: String,
        candidates: impl IntoIterator<Item = Id>,
        end_time: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            category,
            nominees: candidates.into_iter().map(Nominee::new).collect(),
            voters: Vec::new(),
            created_at: now,
            end_time,
            winner: None,
            result_published: false,
            status: ElectionStatus::Pending,
            version: 0,
        }
    }

    pub fn nominee(&self, candidate_id: Id) -> Option<&Nominee> {
        self.nominees.iter().find(|n| n.candidate_id == candidate_id)
    }

    pub fn has_voted(&self, voter: Id) -> bool {
        self.voters.contains(&voter)
    }

    /// Is the voting window open at `now`?
    pub fn accepts_ballots_at(&self, now: DateTime<Utc>) -> bool {
        !self.result_published && self.created_at <= now && now < self.end_time
    }

    pub fn has_ended_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.end_time
    }

    /// The number of ballots cast. This, not the sum of nominee tallies, is
    /// the denominator for every percentage.
    pub fn total_votes(&self) -> u64 {
        self.voters.len() as u64
    }

    /// The status as a reader should see it at `now`: an election whose window
    /// has closed reports `Ended` even if nothing has written that yet.
    pub fn effective_status(&self, now: DateTime<Utc>) -> ElectionStatus {
        if self.result_published {
            ElectionStatus::ResultsPublished
        } else if self.has_ended_at(now) {
            self.status.max(ElectionStatus::Ended)
        } else {
            self.status
        }
    }

    /// Share of all ballots cast for the given candidate, as a whole percentage.
    pub fn percentage_for(&self, candidate_id: Id) -> u64 {
        let votes = self.nominee(candidate_id).map_or(0, |n| n.vote_count);
        percentage(votes, self.total_votes())
    }

    /// The nominee currently in the lead, if there are any nominees.
    pub fn leader(&self) -> Option<&Nominee> {
        determine_winner(&self.nominees)
    }

    /// The published winner's nominee entry.
    pub fn winning_nominee(&self) -> Option<&Nominee> {
        self.winner.and_then(|id| self.nominee(id))
    }

    /// Check the structural invariants of the aggregate.
    ///
    /// A failure here means the stored document is corrupt; callers must not
    /// try to repair it.
    pub fn check_invariants(&self) -> Result<()> {
        let mut seen = HashSet::with_capacity(self.voters.len());
        if let Some(dup) = self.voters.iter().find(|v| !seen.insert(**v)) {
            return Err(Error::InvariantViolation(format!(
                "voter {dup} appears more than once"
            )));
        }

        let mut seen = HashSet::with_capacity(self.nominees.len());
        if let Some(dup) = self
            .nominees
            .iter()
            .find(|n| !seen.insert(n.candidate_id))
        {
            return Err(Error::InvariantViolation(format!(
                "nominee {} appears more than once",
                dup.candidate_id
            )));
        }

        let tallied: u64 = self.nominees.iter().map(|n| n.vote_count).sum();
        if tallied > self.total_votes() {
            return Err(Error::InvariantViolation(format!(
                "{tallied} votes tallied but only {} voters recorded",
                self.total_votes()
            )));
        }

        if self.result_published {
            match self.winner {
                None => {
                    return Err(Error::InvariantViolation(
                        "results published without a winner".to_string(),
                    ))
                }
                Some(winner) if self.nominee(winner).is_none() => {
                    return Err(Error::InvariantViolation(format!(
                        "winner {winner} is not a nominee"
                    )))
                }
                Some(_) => {}
            }
            if self.status != ElectionStatus::ResultsPublished {
                return Err(Error::InvariantViolation(format!(
                    "results published but status is {:?}",
                    self.status
                )));
            }
        }

        Ok(())
    }
}

/// Pick the nominee with the most votes. Ties go to whoever is listed first,
/// so re-evaluating the same tally always yields the same winner.
pub fn determine_winner(nominees: &[Nominee]) -> Option<&Nominee> {
    nominees.iter().fold(None, |best: Option<&Nominee>, n| match best {
        Some(b) if b.vote_count >= n.vote_count => Some(b),
        _ => Some(n),
    })
}

/// `round(100 * votes / total)`, rounding halves up. Zero when nobody voted.
pub fn percentage(votes: u64, total: u64) -> u64 {
    if total == 0 {
        return 0;
    }
    (200 * votes + total) / (2 * total)
}

/// An election without an ID, ready for insertion.
pub type NewElection = ElectionCore;

/// An election from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Election {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub election: ElectionCore,
}

impl Deref for Election {
    type Target = ElectionCore;

    fn deref(&self) -> &Self::Target {
        &self.election
    }
}

impl DerefMut for Election {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.election
    }
}
