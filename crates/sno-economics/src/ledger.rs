use crate::emission::{EmissionSchedule, EmissionStatus};
use crate::error::{EconomicsError, Result};
use crate::genesis::{total_allocation, GenesisAllocation};
use crate::types::{AccountAddress, TokenAmount};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Supply scalars persisted next to the balance table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplyState {
    pub total_supply: TokenAmount,
    pub emission_epoch: u64,
    /// Supply when the current epoch opened; the epoch ceiling derives from it.
    pub epoch_start_supply: TokenAmount,
    pub total_minted: TokenAmount,
    pub total_burned: TokenAmount,
}

/// Balances, allowances and supply.
///
/// The ledger never calls out to other components; the validator registry
/// and the job ledger invoke it to move stake and settle rewards.
#[derive(Debug, Clone)]
pub struct TokenLedger {
    balances: HashMap<AccountAddress, TokenAmount>,
    allowances: HashMap<(AccountAddress, AccountAddress), TokenAmount>,
    supply: SupplyState,
    schedule: Arc<dyn EmissionSchedule>,
}

impl TokenLedger {
    pub fn new(schedule: Arc<dyn EmissionSchedule>) -> Self {
        Self {
            balances: HashMap::new(),
            allowances: HashMap::new(),
            supply: SupplyState::default(),
            schedule,
        }
    }

    /// Credits the genesis allocations outside the epoch ceiling. The
    /// resulting supply opens epoch 0.
    pub fn with_genesis(
        schedule: Arc<dyn EmissionSchedule>,
        allocations: &[GenesisAllocation],
    ) -> Result<Self> {
        let total = total_allocation(allocations).ok_or(EconomicsError::Overflow("genesis total"))?;
        if total > schedule.max_supply() {
            return Err(EconomicsError::EmissionCapExceeded {
                requested: total,
                total_supply: TokenAmount::ZERO,
                ceiling: schedule.max_supply(),
            });
        }

        let mut ledger = Self::new(schedule);
        for alloc in allocations {
            ledger.credit(alloc.address, alloc.amount)?;
            debug!(
                address = %alloc.address,
                amount = alloc.amount.to_sno(),
                label = alloc.label.as_deref().unwrap_or(""),
                "Genesis allocation"
            );
        }
        ledger.supply.total_supply = total;
        ledger.supply.total_minted = total;
        ledger.supply.epoch_start_supply = total;

        info!(
            allocations = allocations.len(),
            total_supply = total.to_sno(),
            "🌱 Genesis allocated"
        );
        Ok(ledger)
    }

    /// Rebuilds a ledger from persisted parts.
    pub fn from_parts(
        schedule: Arc<dyn EmissionSchedule>,
        supply: SupplyState,
        balances: impl IntoIterator<Item = (AccountAddress, TokenAmount)>,
        allowances: impl IntoIterator<Item = ((AccountAddress, AccountAddress), TokenAmount)>,
    ) -> Self {
        Self {
            balances: balances.into_iter().collect(),
            allowances: allowances.into_iter().collect(),
            supply,
            schedule,
        }
    }

    pub fn balance_of(&self, address: &AccountAddress) -> TokenAmount {
        self.balances.get(address).copied().unwrap_or_default()
    }

    pub fn allowance(&self, owner: &AccountAddress, spender: &AccountAddress) -> TokenAmount {
        self.allowances
            .get(&(*owner, *spender))
            .copied()
            .unwrap_or_default()
    }

    pub fn total_supply(&self) -> TokenAmount {
        self.supply.total_supply
    }

    pub fn emission_epoch(&self) -> u64 {
        self.supply.emission_epoch
    }

    pub fn supply_state(&self) -> &SupplyState {
        &self.supply
    }

    pub fn schedule(&self) -> &Arc<dyn EmissionSchedule> {
        &self.schedule
    }

    pub fn balances(&self) -> impl Iterator<Item = (&AccountAddress, &TokenAmount)> {
        self.balances.iter()
    }

    pub fn allowances(
        &self,
    ) -> impl Iterator<Item = (&(AccountAddress, AccountAddress), &TokenAmount)> {
        self.allowances.iter()
    }

    /// Emission rate at the current total supply.
    pub fn emission_rate(&self) -> TokenAmount {
        self.schedule.current_rate(self.supply.total_supply)
    }

    /// Highest total supply reachable by minting in the current epoch.
    pub fn epoch_ceiling(&self) -> TokenAmount {
        let start = self.supply.epoch_start_supply;
        start
            .saturating_add(self.schedule.current_rate(start))
            .min(self.schedule.max_supply())
            .max(start)
    }

    pub fn emission_status(&self) -> EmissionStatus {
        let ceiling = self.epoch_ceiling();
        EmissionStatus {
            epoch: self.supply.emission_epoch,
            total_supply: self.supply.total_supply,
            epoch_start_supply: self.supply.epoch_start_supply,
            current_rate: self.emission_rate(),
            epoch_ceiling: ceiling,
            remaining_in_epoch: ceiling.saturating_sub(self.supply.total_supply),
            max_supply: self.schedule.max_supply(),
        }
    }

    /// Mints within the current epoch ceiling.
    pub fn mint(&mut self, to: AccountAddress, amount: TokenAmount) -> Result<()> {
        if amount.is_zero() {
            return Ok(());
        }

        let ceiling = self.epoch_ceiling();
        let new_supply = self
            .supply
            .total_supply
            .checked_add(amount)
            .ok_or(EconomicsError::Overflow("total supply"))?;
        if new_supply > ceiling {
            return Err(EconomicsError::EmissionCapExceeded {
                requested: amount,
                total_supply: self.supply.total_supply,
                ceiling,
            });
        }

        self.credit(to, amount)?;
        self.supply.total_supply = new_supply;
        self.supply.total_minted = self.supply.total_minted.saturating_add(amount);

        info!(
            to = %to,
            amount = amount.to_sno(),
            total_supply = new_supply.to_sno(),
            epoch = self.supply.emission_epoch,
            "🪙 Tokens minted"
        );
        Ok(())
    }

    /// Mints every payout or none: the batch total is checked against the
    /// epoch ceiling before any balance moves.
    pub fn mint_batch(&mut self, payouts: &[(AccountAddress, TokenAmount)]) -> Result<TokenAmount> {
        let total = payouts
            .iter()
            .try_fold(TokenAmount::ZERO, |acc, (_, amount)| acc.checked_add(*amount))
            .ok_or(EconomicsError::Overflow("mint batch"))?;
        let ceiling = self.epoch_ceiling();
        let fits = self
            .supply
            .total_supply
            .checked_add(total)
            .is_some_and(|new_supply| new_supply <= ceiling);
        if !total.is_zero() && !fits {
            return Err(EconomicsError::EmissionCapExceeded {
                requested: total,
                total_supply: self.supply.total_supply,
                ceiling,
            });
        }

        for (to, amount) in payouts {
            self.mint(*to, *amount)?;
        }
        Ok(total)
    }

    pub fn burn(&mut self, from: AccountAddress, amount: TokenAmount) -> Result<()> {
        if amount.is_zero() {
            return Ok(());
        }

        self.debit(from, amount)?;
        self.supply.total_supply = self.supply.total_supply.saturating_sub(amount);
        self.supply.total_burned = self.supply.total_burned.saturating_add(amount);

        info!(
            from = %from,
            amount = amount.to_sno(),
            total_supply = self.supply.total_supply.to_sno(),
            "🔥 Tokens burned"
        );
        Ok(())
    }

    pub fn transfer(
        &mut self,
        from: AccountAddress,
        to: AccountAddress,
        amount: TokenAmount,
    ) -> Result<()> {
        let available = self.balance_of(&from);
        if available < amount {
            return Err(EconomicsError::InsufficientBalance {
                address: from,
                available,
                needed: amount,
            });
        }
        if amount.is_zero() || from == to {
            return Ok(());
        }

        // Both sides are bounded by total supply, so the credit cannot overflow
        // once the debit succeeded.
        self.debit(from, amount)?;
        self.credit(to, amount)?;

        info!(
            from = %from,
            to = %to,
            amount = amount.to_sno(),
            "💸 Transfer completed"
        );
        Ok(())
    }

    /// Sets (overwrites) the allowance of `spender` over `owner`'s balance.
    pub fn approve(
        &mut self,
        owner: AccountAddress,
        spender: AccountAddress,
        amount: TokenAmount,
    ) -> Result<()> {
        if amount.is_zero() {
            self.allowances.remove(&(owner, spender));
        } else {
            self.allowances.insert((owner, spender), amount);
        }

        debug!(
            owner = %owner,
            spender = %spender,
            amount = amount.to_sno(),
            "Allowance set"
        );
        Ok(())
    }

    pub fn transfer_from(
        &mut self,
        spender: AccountAddress,
        owner: AccountAddress,
        to: AccountAddress,
        amount: TokenAmount,
    ) -> Result<()> {
        let allowed = self.allowance(&owner, &spender);
        if allowed < amount {
            return Err(EconomicsError::InsufficientAllowance {
                owner,
                spender,
                allowed,
                needed: amount,
            });
        }

        self.transfer(owner, to, amount)?;

        let remaining = allowed.saturating_sub(amount);
        if remaining.is_zero() {
            self.allowances.remove(&(owner, spender));
        } else {
            self.allowances.insert((owner, spender), remaining);
        }
        Ok(())
    }

    /// Closes the current epoch and opens the next one at the current supply.
    pub fn advance_epoch(&mut self) -> u64 {
        self.supply.emission_epoch += 1;
        self.supply.epoch_start_supply = self.supply.total_supply;

        info!(
            epoch = self.supply.emission_epoch,
            start_supply = self.supply.total_supply.to_sno(),
            ceiling = self.epoch_ceiling().to_sno(),
            "⏭️ Emission epoch advanced"
        );
        self.supply.emission_epoch
    }

    fn credit(&mut self, address: AccountAddress, amount: TokenAmount) -> Result<()> {
        let current = self.balance_of(&address);
        let new_balance = current
            .checked_add(amount)
            .ok_or(EconomicsError::Overflow("balance"))?;
        self.balances.insert(address, new_balance);
        Ok(())
    }

    fn debit(&mut self, address: AccountAddress, amount: TokenAmount) -> Result<()> {
        let current = self.balance_of(&address);
        let new_balance = current
            .checked_sub(amount)
            .ok_or(EconomicsError::InsufficientBalance {
                address,
                available: current,
                needed: amount,
            })?;
        self.balances.insert(address, new_balance);
        Ok(())
    }
}
