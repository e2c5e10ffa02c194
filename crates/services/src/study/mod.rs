//! The study-session progression engine: resolve the next word, record
//! known/unknown responses, and detect daily and generation completion.

mod completion;
mod recorder;
mod resolver;
mod service;
mod session;

pub use resolver::{NextStep, Resolution, SessionCounts};
pub use service::{StudyEvent, StudyOutcome, StudyService};
pub use session::StudySession;
