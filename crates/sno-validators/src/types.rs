use serde::{Deserialize, Serialize};
use sno_economics::{AccountAddress, TokenAmount};
use sno_types::{PublicKeyHash, Timestamp, ValidatorId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validator {
    pub id: ValidatorId,
    pub owner: AccountAddress,
    pub public_key_hash: PublicKeyHash,
    pub locked_stake: TokenAmount,
    /// `locked_stake >= MIN_STAKE` and not removed
    pub active: bool,
    /// Set once by governance removal; a removed validator never comes back
    pub removed: bool,
    pub created_at: Timestamp,
}

impl Validator {
    pub fn is_active(&self) -> bool {
        self.active && !self.removed
    }
}
