mod base;
mod memory;
mod mongo;
mod store;

pub use base::{determine_winner, percentage, Election, ElectionCore, NewElection, Nominee};
pub use memory::MemoryStore;
pub use mongo::MongoStore;
pub use store::{Amendment, BallotStore, ElectionQuery, Mutation, Precondition};
