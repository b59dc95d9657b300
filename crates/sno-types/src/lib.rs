pub mod error;
pub mod id;
pub mod lifecycle;

pub use error::ErrorKind;
pub use id::{Hash32, HashParseError, JobId, PublicKeyHash, UserHash};
pub use lifecycle::LifecycleState;

/// Validator identifier, allocated monotonically by the registry and never reused.
pub type ValidatorId = u64;

/// Position of a proposal in the governor's append-only arena.
pub type ProposalIndex = u64;

/// Unix timestamp in seconds.
pub type Timestamp = i64;
