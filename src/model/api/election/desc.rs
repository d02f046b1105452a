use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    api::{
        id::ApiId,
        member::{MemberProfile, Profiles},
    },
    common::election::{Countdown, ElectionStatus},
    db::election::Election,
    mongodb::Id,
};

use super::results::NomineeResult;

/// An election as listed for administrators, with its running tally and a
/// countdown to the close of voting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionSummary {
    pub id: ApiId,
    pub category: String,
    pub status: ElectionStatus,
    pub created_at: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub countdown: Countdown,
    pub nominees: Vec<NomineeResult>,
    pub total_votes: u64,
    pub result_published: bool,
    pub winner: Option<ApiId>,
}

impl ElectionSummary {
    pub fn new(election: &Election, profiles: &Profiles, now: DateTime<Utc>) -> Self {
        Self {
            id: election.id.into(),
            category: election.category.clone(),
            status: election.effective_status(now),
            created_at: election.created_at,
            end_time: election.end_time,
            countdown: Countdown::until(election.end_time, now),
            nominees: election
                .nominees
                .iter()
                .map(|n| NomineeResult::new(election, n, profiles))
                .collect(),
            total_votes: election.total_votes(),
            result_published: election.result_published,
            winner: election.winner.map(ApiId::from),
        }
    }
}

/// A candidate as shown to voters: no tallies while voting is open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub candidate_id: ApiId,
    pub profile: Option<MemberProfile>,
}

/// An election as shown to a member, including whether they have voted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberElection {
    pub id: ApiId,
    pub category: String,
    pub status: ElectionStatus,
    pub created_at: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub has_ended: bool,
    pub result_published: bool,
    pub nominees: Vec<Candidate>,
    pub user_has_voted: bool,
}

impl MemberElection {
    pub fn new(election: &Election, profiles: &Profiles, member: Id, now: DateTime<Utc>) -> Self {
        Self {
            id: election.id.into(),
            category: election.category.clone(),
            status: election.effective_status(now),
            created_at: election.created_at,
            end_time: election.end_time,
            has_ended: election.has_ended_at(now),
            result_published: election.result_published,
            nominees: election
                .nominees
                .iter()
                .map(|n| Candidate {
                    candidate_id: n.candidate_id.into(),
                    profile: MemberProfile::lookup(profiles, n.candidate_id),
                })
                .collect(),
            user_has_voted: election.has_voted(member),
        }
    }
}

/// Where an election stands, with its winner once published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionStatusView {
    pub id: ApiId,
    pub category: String,
    pub status: ElectionStatus,
    pub end_time: DateTime<Utc>,
    pub has_ended: bool,
    pub result_published: bool,
    pub total_votes: u64,
    pub winner: Option<NomineeResult>,
}

impl ElectionStatusView {
    pub fn new(election: &Election, profiles: &Profiles, now: DateTime<Utc>) -> Self {
        Self {
            id: election.id.into(),
            category: election.category.clone(),
            status: election.effective_status(now),
            end_time: election.end_time,
            has_ended: election.has_ended_at(now),
            result_published: election.result_published,
            total_votes: election.total_votes(),
            winner: NomineeResult::winner_of(election, profiles),
        }
    }
}
