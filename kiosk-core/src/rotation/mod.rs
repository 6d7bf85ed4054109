mod outcome;
mod pacer;
mod probe;
mod resilience;
mod scheduler;
mod session;

pub use outcome::{FailureKind, VisitOutcome};
pub use pacer::AdaptivePacer;
pub use probe::{HttpProbe, ProbeError, ProbeVerdict, ReachabilityProbe};
pub use resilience::ResilienceManager;
pub use scheduler::{ExitReason, RotationError, RotationScheduler};
pub use session::SessionState;
