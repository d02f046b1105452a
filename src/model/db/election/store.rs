use chrono::{DateTime, Utc};
use mongodb::bson::{doc, to_bson, Bson, DateTime as BsonDateTime, Document};

use crate::error::Result;
use crate::model::{common::election::ElectionStatus, mongodb::Id};

use super::base::{Election, ElectionCore, NewElection, Nominee};

/// A condition that must still hold at the moment a write is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Precondition {
    /// The voting window is open and results are unpublished.
    AcceptingBallots(DateTime<Utc>),
    /// The given member has not yet cast a ballot.
    NotVotedBy(Id),
    /// The given member is a current nominee.
    Nominates(Id),
    /// Results have not been published.
    Unpublished,
    /// The end time has not yet passed and results are unpublished.
    Editable(DateTime<Utc>),
    /// Still pending with no ballots cast.
    Untouched,
    /// The stored status is one of these.
    StatusIn(Vec<ElectionStatus>),
    /// Nothing has written to the election since this revision was read.
    AtVersion(u64),
}

impl Precondition {
    /// Evaluate against an in-memory election.
    pub fn holds(&self, election: &ElectionCore) -> bool {
        match self {
            Self::AcceptingBallots(now) => election.accepts_ballots_at(*now),
            Self::NotVotedBy(voter) => !election.has_voted(*voter),
            Self::Nominates(candidate) => election.nominee(*candidate).is_some(),
            Self::Unpublished => !election.result_published,
            Self::Editable(now) => !election.result_published && *now < election.end_time,
            Self::Untouched => {
                election.status == ElectionStatus::Pending && election.voters.is_empty()
            }
            Self::StatusIn(statuses) => statuses.contains(&election.status),
            Self::AtVersion(version) => election.version == *version,
        }
    }

    /// The equivalent MongoDB query fragment.
    pub fn to_filter(&self) -> Document {
        match self {
            Self::AcceptingBallots(now) => doc! {
                "created_at": { "$lte": bson_datetime(*now) },
                "end_time": { "$gt": bson_datetime(*now) },
                "result_published": false,
            },
            Self::NotVotedBy(voter) => doc! { "voters": { "$ne": *voter } },
            Self::Nominates(candidate) => doc! { "nominees.candidate_id": *candidate },
            Self::Unpublished => doc! { "result_published": false },
            Self::Editable(now) => doc! {
                "end_time": { "$gt": bson_datetime(*now) },
                "result_published": false,
            },
            Self::Untouched => doc! {
                "status": ElectionStatus::Pending,
                "voters": { "$size": 0 },
            },
            Self::StatusIn(statuses) => {
                let statuses: Vec<Bson> = statuses.iter().map(|s| Bson::from(*s)).collect();
                doc! { "status": { "$in": statuses } }
            }
            Self::AtVersion(version) => doc! { "version": bson_u64(*version) },
        }
    }
}

/// Build the filter selecting the given election iff every precondition holds.
pub fn conditional_filter(id: Id, preconditions: &[Precondition]) -> Document {
    let mut filter = id.as_doc();
    if !preconditions.is_empty() {
        let clauses: Vec<Document> = preconditions.iter().map(Precondition::to_filter).collect();
        filter.insert("$and", clauses);
    }
    filter
}

/// Replacement fields for an election that has not yet closed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Amendment {
    pub category: Option<String>,
    /// A new nominee list. Every tally restarts from zero.
    pub nominees: Option<Vec<Id>>,
    pub end_time: Option<DateTime<Utc>>,
}

/// A change to apply to an election in a single conditional write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Record one ballot.
    CastBallot { voter: Id, candidate: Id },
    /// Edit an election still open for changes.
    Amend(Amendment),
    /// Fix the winner and freeze the election.
    Publish { winner: Id },
    /// Close out an election that cannot be published.
    MarkEnded,
}

impl Mutation {
    /// Apply to an in-memory election, bumping its version.
    pub fn apply(&self, election: &mut ElectionCore) {
        match self {
            Self::CastBallot { voter, candidate } => {
                election.voters.push(*voter);
                if let Some(nominee) = election
                    .nominees
                    .iter_mut()
                    .find(|n| n.candidate_id == *candidate)
                {
                    nominee.vote_count += 1;
                }
                if election.status.can_advance_to(ElectionStatus::Active) {
                    election.status = ElectionStatus::Active;
                }
            }
            Self::Amend(amendment) => {
                if let Some(category) = &amendment.category {
                    election.category = category.clone();
                }
                if let Some(nominees) = &amendment.nominees {
                    election.nominees = nominees.iter().copied().map(Nominee::new).collect();
                }
                if let Some(end_time) = amendment.end_time {
                    election.end_time = end_time;
                }
            }
            Self::Publish { winner } => {
                election.winner = Some(*winner);
                election.result_published = true;
                election.status = ElectionStatus::ResultsPublished;
            }
            Self::MarkEnded => {
                election.status = ElectionStatus::Ended;
            }
        }
        election.version += 1;
    }

    /// The equivalent MongoDB update document, with any array filters it needs.
    pub fn to_update(&self) -> (Document, Option<Vec<Document>>) {
        match self {
            Self::CastBallot { voter, candidate } => (
                doc! {
                    "$push": { "voters": *voter },
                    "$inc": { "nominees.$[nominee].vote_count": 1_i64, "version": 1_i64 },
                    // Preconditions guarantee the stored status is pending or active.
                    "$set": { "status": ElectionStatus::Active },
                },
                Some(vec![doc! { "nominee.candidate_id": *candidate }]),
            ),
            Self::Amend(amendment) => {
                let mut set = Document::new();
                if let Some(category) = &amendment.category {
                    set.insert("category", category.clone());
                }
                if let Some(nominees) = &amendment.nominees {
                    let nominees: Vec<Nominee> =
                        nominees.iter().copied().map(Nominee::new).collect();
                    set.insert(
                        "nominees",
                        to_bson(&nominees).expect("Serialisation is infallible"),
                    );
                }
                if let Some(end_time) = amendment.end_time {
                    set.insert("end_time", bson_datetime(end_time));
                }
                let mut update = doc! { "$inc": { "version": 1_i64 } };
                if !set.is_empty() {
                    update.insert("$set", set);
                }
                (update, None)
            }
            Self::Publish { winner } => (
                doc! {
                    "$set": {
                        "winner": *winner,
                        "result_published": true,
                        "status": ElectionStatus::ResultsPublished,
                    },
                    "$inc": { "version": 1_i64 },
                },
                None,
            ),
            Self::MarkEnded => (
                doc! {
                    "$set": { "status": ElectionStatus::Ended },
                    "$inc": { "version": 1_i64 },
                },
                None,
            ),
        }
    }
}

/// Read-side selections over the election collection.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ElectionQuery {
    /// Everything, newest first.
    All,
    /// Elections accepting ballots at the given instant.
    Open(DateTime<Utc>),
    /// Closed by the given instant but not yet published.
    Unreconciled(DateTime<Utc>),
    /// Every election with published results.
    Published,
    /// Published elections whose window closed before the given instant.
    PublishedBefore(DateTime<Utc>),
}

impl ElectionQuery {
    pub fn matches(&self, election: &ElectionCore) -> bool {
        match self {
            Self::All => true,
            Self::Open(now) => election.accepts_ballots_at(*now),
            Self::Unreconciled(now) => election.end_time <= *now && !election.result_published,
            Self::Published => election.result_published,
            Self::PublishedBefore(now) => election.end_time < *now && election.result_published,
        }
    }

    pub fn to_filter(&self) -> Document {
        match self {
            Self::All => Document::new(),
            Self::Open(now) => Precondition::AcceptingBallots(*now).to_filter(),
            Self::Unreconciled(now) => doc! {
                "end_time": { "$lte": bson_datetime(*now) },
                "result_published": false,
            },
            Self::Published => doc! { "result_published": true },
            Self::PublishedBefore(now) => doc! {
                "end_time": { "$lt": bson_datetime(*now) },
                "result_published": true,
            },
        }
    }
}

/// Durable storage for elections.
///
/// Every mutation goes through [`BallotStore::find_one_and_update`] or
/// [`BallotStore::delete_if`], which apply their change only if all the given
/// preconditions hold at write time, as one indivisible step. `None`/`false`
/// means some precondition failed (or the election is gone); callers re-read
/// to find out which.
#[rocket::async_trait]
pub trait BallotStore: Send + Sync {
    /// Insert a new election and return it with its assigned ID.
    async fn insert(&self, election: NewElection) -> Result<Election>;

    async fn find_by_id(&self, id: Id) -> Result<Option<Election>>;

    /// Elections matching the query, newest first.
    async fn find(&self, query: ElectionQuery) -> Result<Vec<Election>>;

    /// Atomically apply `mutation` iff every precondition holds, returning the
    /// updated election.
    async fn find_one_and_update(
        &self,
        id: Id,
        preconditions: &[Precondition],
        mutation: &Mutation,
    ) -> Result<Option<Election>>;

    /// Atomically delete the election iff every precondition holds.
    async fn delete_if(&self, id: Id, preconditions: &[Precondition]) -> Result<bool>;
}

pub(crate) fn bson_datetime(datetime: DateTime<Utc>) -> BsonDateTime {
    BsonDateTime::from_chrono(datetime)
}

fn bson_u64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Duration;

    #[test]
    fn cast_ballot_applies_in_memory() {
        let x = Id::new();
        let y = Id::new();
        let voter = Id::new();
        let mut election = ElectionCore::example(&[x, y]);

        Mutation::CastBallot {
            voter,
            candidate: y,
        }
        .apply(&mut election);

        assert_eq!(election.voters, vec![voter]);
        assert_eq!(election.nominee(x).unwrap().vote_count, 0);
        assert_eq!(election.nominee(y).unwrap().vote_count, 1);
        assert_eq!(election.status, ElectionStatus::Active);
        assert_eq!(election.version, 1);
    }

    #[test]
    fn amend_resets_tallies_but_keeps_voters() {
        let x = Id::new();
        let z = Id::new();
        let mut election = ElectionCore::example(&[x]).with_votes(&[2]);
        let end_time = election.end_time + Duration::days(1);

        Mutation::Amend(Amendment {
            category: Some("Youth Leader".to_string()),
            nominees: Some(vec![x, z]),
            end_time: Some(end_time),
        })
        .apply(&mut election);

        assert_eq!(election.category, "Youth Leader");
        assert_eq!(election.nominees, vec![Nominee::new(x), Nominee::new(z)]);
        assert_eq!(election.voters.len(), 2);
        assert_eq!(election.end_time, end_time);
    }

    #[test]
    fn preconditions_on_open_election() {
        let x = Id::new();
        let voter = Id::new();
        let now = Utc::now();
        let mut election = ElectionCore::example(&[x]);

        assert!(Precondition::AcceptingBallots(now).holds(&election));
        assert!(Precondition::NotVotedBy(voter).holds(&election));
        assert!(Precondition::Nominates(x).holds(&election));
        assert!(!Precondition::Nominates(voter).holds(&election));
        assert!(Precondition::Untouched.holds(&election));
        assert!(Precondition::AtVersion(0).holds(&election));

        Mutation::CastBallot {
            voter,
            candidate: x,
        }
        .apply(&mut election);

        assert!(!Precondition::NotVotedBy(voter).holds(&election));
        assert!(!Precondition::Untouched.holds(&election));
        assert!(!Precondition::AtVersion(0).holds(&election));
        assert!(Precondition::StatusIn(vec![ElectionStatus::Active]).holds(&election));
    }

    #[test]
    fn closed_election_is_not_editable() {
        let election = ElectionCore::closed_example(&[Id::new()]);
        let now = Utc::now();
        assert!(!Precondition::Editable(now).holds(&election));
        assert!(!Precondition::AcceptingBallots(now).holds(&election));
        assert!(ElectionQuery::Unreconciled(now).matches(&election));
        assert!(!ElectionQuery::Open(now).matches(&election));
    }

    #[test]
    fn conditional_filter_nests_clauses() {
        let id = Id::new();
        let voter = Id::new();
        let filter = conditional_filter(
            id,
            &[Precondition::Unpublished, Precondition::NotVotedBy(voter)],
        );
        assert_eq!(
            filter,
            doc! {
                "_id": *id,
                "$and": [
                    { "result_published": false },
                    { "voters": { "$ne": *voter } },
                ],
            }
        );
    }

    #[test]
    fn ballot_window_filter_bounds() {
        let now = Utc::now();
        let at = bson_datetime(now);
        assert_eq!(
            Precondition::AcceptingBallots(now).to_filter(),
            doc! {
                "created_at": { "$lte": at },
                "end_time": { "$gt": at },
                "result_published": false,
            }
        );
        assert_eq!(
            ElectionQuery::Open(now).to_filter(),
            Precondition::AcceptingBallots(now).to_filter()
        );
        assert_eq!(
            Precondition::Editable(now).to_filter(),
            doc! {
                "end_time": { "$gt": at },
                "result_published": false,
            }
        );
    }

    #[test]
    fn lifecycle_filters() {
        let candidate = Id::new();
        assert_eq!(
            Precondition::Untouched.to_filter(),
            doc! { "status": "pending", "voters": { "$size": 0 } }
        );
        assert_eq!(
            Precondition::StatusIn(vec![ElectionStatus::Pending, ElectionStatus::Active])
                .to_filter(),
            doc! { "status": { "$in": ["pending", "active"] } }
        );
        assert_eq!(
            Precondition::Nominates(candidate).to_filter(),
            doc! { "nominees.candidate_id": *candidate }
        );
        assert_eq!(
            Precondition::AtVersion(7).to_filter(),
            doc! { "version": 7_i64 }
        );
    }

    #[test]
    fn reconciliation_queries_split_on_end_time() {
        let now = Utc::now();
        let at = bson_datetime(now);
        assert_eq!(
            ElectionQuery::Unreconciled(now).to_filter(),
            doc! {
                "end_time": { "$lte": at },
                "result_published": false,
            }
        );
        assert_eq!(
            ElectionQuery::PublishedBefore(now).to_filter(),
            doc! {
                "end_time": { "$lt": at },
                "result_published": true,
            }
        );
        assert_eq!(
            ElectionQuery::Published.to_filter(),
            doc! { "result_published": true }
        );
        assert!(ElectionQuery::All.to_filter().is_empty());

        // An election closing exactly now is due for reconciliation but is not
        // yet listed among ended winners.
        let mut election = ElectionCore::example(&[Id::new()]);
        election.end_time = now;
        assert!(ElectionQuery::Unreconciled(now).matches(&election));
        election.result_published = true;
        assert!(!ElectionQuery::PublishedBefore(now).matches(&election));
    }

    #[test]
    fn cast_update_targets_nominee() {
        let voter = Id::new();
        let candidate = Id::new();
        let (update, array_filters) = Mutation::CastBallot { voter, candidate }.to_update();
        assert_eq!(
            update.get_document("$inc").unwrap(),
            &doc! { "nominees.$[nominee].vote_count": 1_i64, "version": 1_i64 }
        );
        assert_eq!(
            array_filters,
            Some(vec![doc! { "nominee.candidate_id": *candidate }])
        );
    }
}
