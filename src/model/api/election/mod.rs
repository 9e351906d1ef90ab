mod desc;
mod results;
mod spec;

pub use desc::{CandidateDescription, ElectionDescription};
pub use results::{rank_candidates, CandidateResult, ElectionResults, Winner};
pub use spec::{ElectionSpec, PasscodeRequest, SpecError};
