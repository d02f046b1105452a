mod desc;
mod results;
mod spec;

pub use desc::{Candidate, ElectionStatusView, ElectionSummary, MemberElection};
pub use results::{ElectionResults, NomineeResult, Publication, WinnerEntry};
pub use spec::{ElectionPatch, ElectionSpec, ValidSpec};
