use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    api::{
        id::ApiId,
        member::{MemberProfile, Profiles},
    },
    common::election::ElectionStatus,
    db::election::{Election, Nominee},
};

/// One nominee's standing in an election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NomineeResult {
    pub candidate_id: ApiId,
    pub vote_count: u64,
    /// Share of all ballots cast, rounded to a whole percent.
    pub percentage: u64,
    pub profile: Option<MemberProfile>,
}

impl NomineeResult {
    pub fn new(election: &Election, nominee: &Nominee, profiles: &Profiles) -> Self {
        Self {
            candidate_id: nominee.candidate_id.into(),
            vote_count: nominee.vote_count,
            percentage: election.percentage_for(nominee.candidate_id),
            profile: MemberProfile::lookup(profiles, nominee.candidate_id),
        }
    }

    /// The published winner's result, if there is one.
    pub fn winner_of(election: &Election, profiles: &Profiles) -> Option<Self> {
        election
            .winning_nominee()
            .map(|nominee| Self::new(election, nominee, profiles))
    }
}

/// The full tally of an election, for administrators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionResults {
    pub id: ApiId,
    pub category: String,
    pub status: ElectionStatus,
    pub end_time: DateTime<Utc>,
    pub total_votes: u64,
    pub result_published: bool,
    pub nominees: Vec<NomineeResult>,
    /// Whoever is currently ahead, ties going to the first listed.
    pub leader: Option<ApiId>,
    pub winner: Option<NomineeResult>,
}

impl ElectionResults {
    pub fn new(election: &Election, profiles: &Profiles, now: DateTime<Utc>) -> Self {
        Self {
            id: election.id.into(),
            category: election.category.clone(),
            status: election.effective_status(now),
            end_time: election.end_time,
            total_votes: election.total_votes(),
            result_published: election.result_published,
            nominees: election
                .nominees
                .iter()
                .map(|n| NomineeResult::new(election, n, profiles))
                .collect(),
            leader: election.leader().map(|n| n.candidate_id.into()),
            winner: NomineeResult::winner_of(election, profiles),
        }
    }
}

/// The winner of one published election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WinnerEntry {
    pub election_id: ApiId,
    pub category: String,
    pub end_time: DateTime<Utc>,
    pub total_votes: u64,
    pub winner: NomineeResult,
}

impl WinnerEntry {
    /// `None` unless the election has a published winner.
    pub fn new(election: &Election, profiles: &Profiles) -> Option<Self> {
        Some(Self {
            election_id: election.id.into(),
            category: election.category.clone(),
            end_time: election.end_time,
            total_votes: election.total_votes(),
            winner: NomineeResult::winner_of(election, profiles)?,
        })
    }
}

/// Response to a successful publication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Publication {
    pub election_id: ApiId,
    pub winner: NomineeResult,
}
