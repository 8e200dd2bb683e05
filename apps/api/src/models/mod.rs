pub mod candidate;
pub mod evaluation;
pub mod job;
pub mod user;

pub use candidate::{
    Candidate, CandidateListing, CandidateStatus, Disposition, NewCandidate, ScreeningStatus,
};
pub use evaluation::Evaluation;
pub use job::Job;
pub use user::User;
