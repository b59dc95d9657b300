pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod persistence;
pub mod service;
pub mod state;

pub use config::{CoreConfig, EconomicsConfig, EventsConfig, LoggingConfig};
pub use error::{CoreError, Result};
pub use events::{Effect, EventBus, EventRecord, Operation, OperationStatus};
pub use logging::init_logging;
pub use service::{Clock, ManualClock, SmartnodesCore, SystemClock};
pub use state::{CoreState, Dispatcher};

pub use sno_economics::{AccountAddress, TokenAmount};
pub use sno_governance::{Command, FunctionType};
pub use sno_types::{ErrorKind, Hash32, JobId, ProposalIndex, UserHash, ValidatorId};
