use crate::types::TokenAmount;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-epoch emission policy.
///
/// Implementations must be pure: the rate is re-derivable by any observer
/// from the total supply alone, and it never increases as supply grows.
pub trait EmissionSchedule: Send + Sync + fmt::Debug {
    /// Tokens that may be minted during an epoch that opened at `total_supply`.
    fn current_rate(&self, total_supply: TokenAmount) -> TokenAmount;

    /// Hard cap on total supply.
    fn max_supply(&self) -> TokenAmount;
}

/// Piecewise halving: the epoch emission halves every time total supply
/// crosses another `halving_interval`, and is clipped so supply never
/// exceeds `max_supply`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HalvingEmission {
    pub initial_epoch_emission: TokenAmount,
    pub halving_interval: TokenAmount,
    pub max_supply: TokenAmount,
}

impl Default for HalvingEmission {
    fn default() -> Self {
        Self {
            initial_epoch_emission: TokenAmount::from_sno(1_000_000),
            halving_interval: TokenAmount::from_sno(100_000_000),
            max_supply: TokenAmount::from_sno(1_000_000_000),
        }
    }
}

impl HalvingEmission {
    pub fn new(
        initial_epoch_emission: TokenAmount,
        halving_interval: TokenAmount,
        max_supply: TokenAmount,
    ) -> Self {
        Self {
            initial_epoch_emission,
            halving_interval,
            max_supply,
        }
    }

    /// Halvings applied at `total_supply`. A zero interval disables halving.
    pub fn halvings(&self, total_supply: TokenAmount) -> u128 {
        total_supply.steps_of(self.halving_interval).unwrap_or(0)
    }
}

impl EmissionSchedule for HalvingEmission {
    fn current_rate(&self, total_supply: TokenAmount) -> TokenAmount {
        let remaining = self.max_supply.saturating_sub(total_supply);
        if remaining.is_zero() {
            return TokenAmount::ZERO;
        }
        self.initial_epoch_emission
            .halved(self.halvings(total_supply))
            .min(remaining)
    }

    fn max_supply(&self) -> TokenAmount {
        self.max_supply
    }
}

/// Read-only view of the emission position, reported by `getState`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmissionStatus {
    pub epoch: u64,
    pub total_supply: TokenAmount,
    pub epoch_start_supply: TokenAmount,
    pub current_rate: TokenAmount,
    pub epoch_ceiling: TokenAmount,
    pub remaining_in_epoch: TokenAmount,
    pub max_supply: TokenAmount,
}
