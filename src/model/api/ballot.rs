use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// A member's ballot, as submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BallotSpec {
    #[serde(alias = "voteId")]
    pub election_id: Id,
    #[serde(alias = "nomineeId")]
    pub candidate_id: Id,
}
