use crate::types::{AccountAddress, TokenAmount};
use serde::{Deserialize, Serialize};

/// Initial balance credited when the ledger is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisAllocation {
    pub address: AccountAddress,
    pub amount: TokenAmount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl GenesisAllocation {
    pub fn new(address: AccountAddress, amount: TokenAmount) -> Self {
        Self {
            address,
            amount,
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Sum of all allocations, `None` on overflow.
pub fn total_allocation(allocations: &[GenesisAllocation]) -> Option<TokenAmount> {
    allocations
        .iter()
        .try_fold(TokenAmount::ZERO, |acc, a| acc.checked_add(a.amount))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocation_toml() {
        let alloc = GenesisAllocation::new(
            AccountAddress::from_seed(b"operator"),
            TokenAmount::from_sno(50_000),
        )
        .with_label("operator");

        let text = toml::to_string(&alloc).unwrap();
        assert!(text.contains("label = \"operator\""));
        let back: GenesisAllocation = toml::from_str(&text).unwrap();
        assert_eq!(back, alloc);
    }

    #[test]
    fn test_total_allocation() {
        let a = AccountAddress::from_seed(b"a");
        let allocations = vec![
            GenesisAllocation::new(a, TokenAmount::from_sno(1)),
            GenesisAllocation::new(a, TokenAmount::from_sno(2)),
        ];
        assert_eq!(total_allocation(&allocations), Some(TokenAmount::from_sno(3)));

        let overflowing = vec![
            GenesisAllocation::new(a, TokenAmount::MAX),
            GenesisAllocation::new(a, TokenAmount::from_base_units(1)),
        ];
        assert_eq!(total_allocation(&overflowing), None);
    }
}
