use mongodb::bson::{to_bson, Bson};
use serde::{Deserialize, Serialize};

/// States in the election lifecycle. Transitions only ever move forward.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElectionStatus {
    /// Created, no ballots cast yet. The only deletable state.
    Pending,
    /// At least one ballot has been accepted.
    Active,
    /// The voting window closed without a publishable result.
    Ended,
    /// Terminal: the winner is fixed and the tally is frozen.
    ResultsPublished,
}

impl ElectionStatus {
    /// Is moving from `self` to `next` a forward transition?
    pub fn can_advance_to(self, next: ElectionStatus) -> bool {
        next > self
    }
}

impl From<ElectionStatus> for Bson {
    fn from(status: ElectionStatus) -> Self {
        to_bson(&status).expect("Serialisation is infallible")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_only_move_forward() {
        use ElectionStatus::*;

        assert!(Pending.can_advance_to(Active));
        assert!(Active.can_advance_to(Ended));
        assert!(Active.can_advance_to(ResultsPublished));
        assert!(!ResultsPublished.can_advance_to(Ended));
        assert!(!Active.can_advance_to(Pending));
        assert!(!Active.can_advance_to(Active));
    }

    #[test]
    fn serialises_as_snake_case() {
        assert_eq!(
            Bson::from(ElectionStatus::ResultsPublished),
            Bson::String("results_published".to_string())
        );
    }
}
