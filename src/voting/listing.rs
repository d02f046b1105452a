use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::model::{
    api::election::{ElectionStatusView, ElectionSummary, MemberElection},
    db::election::{Election, ElectionQuery},
    mongodb::Id,
};

use super::Voting;

impl Voting {
    /// Describe one election for administrators.
    pub async fn summarize(&self, election: &Election, now: DateTime<Utc>) -> Result<ElectionSummary> {
        let profiles = self.profiles_for(std::slice::from_ref(election)).await?;
        Ok(ElectionSummary::new(election, &profiles, now))
    }

    /// Describe one election as `member` sees it.
    pub async fn member_view(
        &self,
        election: &Election,
        member: Id,
        now: DateTime<Utc>,
    ) -> Result<MemberElection> {
        let profiles = self.profiles_for(std::slice::from_ref(election)).await?;
        Ok(MemberElection::new(election, &profiles, member, now))
    }

    /// Every election, newest first, with tallies and a countdown.
    pub async fn list_all(&self, now: DateTime<Utc>) -> Result<Vec<ElectionSummary>> {
        let elections = self.retrying(|| self.store.find(ElectionQuery::All)).await?;
        let profiles = self.profiles_for(&elections).await?;
        Ok(elections
            .iter()
            .map(|e| ElectionSummary::new(e, &profiles, now))
            .collect())
    }

    /// Every election as `member` sees it, newest first.
    pub async fn list_for_member(
        &self,
        member: Id,
        now: DateTime<Utc>,
    ) -> Result<Vec<MemberElection>> {
        let elections = self.retrying(|| self.store.find(ElectionQuery::All)).await?;
        let profiles = self.profiles_for(&elections).await?;
        Ok(elections
            .iter()
            .map(|e| MemberElection::new(e, &profiles, member, now))
            .collect())
    }

    /// The most recently opened election still accepting ballots.
    pub async fn active_for_member(&self, member: Id, now: DateTime<Utc>) -> Result<MemberElection> {
        let open = self
            .retrying(|| self.store.find(ElectionQuery::Open(now)))
            .await?;
        let election = open
            .into_iter()
            .next()
            .ok_or_else(|| Error::not_found("Open election"))?;
        self.member_view(&election, member, now).await
    }

    /// Where one election stands.
    pub async fn status(&self, id: Id, now: DateTime<Utc>) -> Result<ElectionStatusView> {
        let election = self
            .find_election(id)
            .await?
            .ok_or_else(|| Error::not_found(format!("Election {id}")))?;
        let profiles = self.profiles_for(std::slice::from_ref(&election)).await?;
        Ok(ElectionStatusView::new(&election, &profiles, now))
    }
}
