mod base;
mod directory;

pub use base::{Member, MemberCore};
pub use directory::{MemberDirectory, MemoryDirectory, MongoDirectory};
