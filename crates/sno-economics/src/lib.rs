pub mod emission;
pub mod error;
pub mod genesis;
pub mod ledger;
pub mod types;

pub use emission::{EmissionSchedule, EmissionStatus, HalvingEmission};
pub use error::{EconomicsError, Result};
pub use genesis::GenesisAllocation;
pub use ledger::{SupplyState, TokenLedger};
pub use types::{AccountAddress, TokenAmount, SNO_BASE_UNIT, SNO_DECIMALS};
