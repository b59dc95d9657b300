#![allow(dead_code)]

use sno_core::{AccountAddress, CoreConfig, SmartnodesCore, TokenAmount};
use sno_economics::GenesisAllocation;
use sno_governance::command::encode_all;
use sno_governance::Command;
use sno_types::{Hash32, ProposalIndex, UserHash, ValidatorId};

pub const USER_HASH_HEX: &str = "0d976b7e1fd59537000313e274dc6a9d035ebaf95f4b8857740f7c799abd8629";

pub fn addr(name: &str) -> AccountAddress {
    AccountAddress::from_seed(name.as_bytes())
}

pub fn sno(amount: u64) -> TokenAmount {
    TokenAmount::from_sno(amount)
}

pub fn user_hash() -> UserHash {
    Hash32::from_hex(USER_HASH_HEX).unwrap()
}

/// Config funding each named owner with 100_000 SNO at genesis.
pub fn config_for(owners: &[&str]) -> CoreConfig {
    let mut config = CoreConfig::default();
    config.genesis = owners
        .iter()
        .map(|name| GenesisAllocation::new(addr(name), sno(100_000)).with_label(*name))
        .collect();
    config
}

pub struct Network {
    pub core: SmartnodesCore,
    pub owners: Vec<AccountAddress>,
    pub ids: Vec<ValidatorId>,
}

impl Network {
    pub fn owner(&self, i: usize) -> AccountAddress {
        self.owners[i]
    }

    pub async fn propose(&self, proposer: usize, commands: &[Command]) -> ProposalIndex {
        let (function_types, encoded_calls) = encode_all(commands).unwrap();
        self.core
            .create_proposal(self.owners[proposer], function_types, encoded_calls)
            .await
            .unwrap()
    }
}

/// Core with one 50_000 SNO validator per owner in `owners`.
pub async fn network_with(config: CoreConfig, owners: &[&str]) -> Network {
    let core = SmartnodesCore::new(config).unwrap();
    let mut ids = Vec::new();
    for name in owners {
        let id = core
            .create_validator(
                addr(name),
                Hash32::digest(format!("pk-{}", name).as_bytes()),
                sno(50_000),
            )
            .await
            .unwrap();
        ids.push(id);
    }
    Network {
        core,
        owners: owners.iter().map(|n| addr(n)).collect(),
        ids,
    }
}

pub async fn network(owners: &[&str]) -> Network {
    network_with(config_for(owners), owners).await
}
