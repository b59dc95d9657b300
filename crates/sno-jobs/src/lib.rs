pub mod error;
pub mod ledger;
pub mod rewards;
pub mod types;

pub use error::{JobError, Result};
pub use ledger::JobLedger;
pub use rewards::{FlatReward, RewardPolicy};
pub use types::{Job, JobStatus, User};
