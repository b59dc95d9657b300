use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use sno_economics::{AccountAddress, GenesisAllocation, HalvingEmission, TokenAmount};
use sno_governance::GovernorConfig;
use sno_jobs::FlatReward;
use sno_validators::registry::DEFAULT_MIN_STAKE;
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Accounts allowed to call `mint_tokens` directly
    #[serde(default)]
    pub minters: Vec<AccountAddress>,
    #[serde(default)]
    pub economics: EconomicsConfig,
    #[serde(default)]
    pub governance: GovernorConfig,
    #[serde(default)]
    pub genesis: Vec<GenesisAllocation>,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub events: EventsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EconomicsConfig {
    pub min_stake: TokenAmount,
    pub max_supply: TokenAmount,
    pub initial_epoch_emission: TokenAmount,
    pub halving_interval: TokenAmount,
    pub reward_per_worker: TokenAmount,
}

impl Default for EconomicsConfig {
    fn default() -> Self {
        let emission = HalvingEmission::default();
        Self {
            min_stake: DEFAULT_MIN_STAKE,
            max_supply: emission.max_supply,
            initial_epoch_emission: emission.initial_epoch_emission,
            halving_interval: emission.halving_interval,
            reward_per_worker: FlatReward::default().per_worker,
        }
    }
}

impl EconomicsConfig {
    pub fn emission(&self) -> HalvingEmission {
        HalvingEmission::new(
            self.initial_epoch_emission,
            self.halving_interval,
            self.max_supply,
        )
    }

    pub fn reward(&self) -> FlatReward {
        FlatReward::new(self.reward_per_worker)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    /// `pretty`, `compact` or `json`
    pub format: String,
    #[serde(default)]
    pub module_filters: BTreeMap<String, String>,
    #[serde(default)]
    pub file_output: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            module_filters: BTreeMap::new(),
            file_output: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    /// Events buffered per subscriber before the oldest are dropped
    pub buffer: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self { buffer: 1000 }
    }
}

impl CoreConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(min_stake) = env::var("SNO_MIN_STAKE") {
            if let Ok(amount) = min_stake.parse() {
                self.economics.min_stake = amount;
            }
        }
        if let Ok(reward) = env::var("SNO_REWARD_PER_WORKER") {
            if let Ok(amount) = reward.parse() {
                self.economics.reward_per_worker = amount;
            }
        }
        if let Ok(ttl) = env::var("SNO_PROPOSAL_TTL_SECS") {
            if ttl.is_empty() || ttl == "none" {
                self.governance.proposal_ttl_secs = None;
            } else if let Ok(secs) = ttl.parse() {
                self.governance.proposal_ttl_secs = Some(secs);
            }
        }
        if let Ok(level) = env::var("SNO_LOG_LEVEL") {
            if !level.is_empty() {
                self.logging.level = level;
            }
        }
        if let Ok(format) = env::var("SNO_LOG_FORMAT") {
            if !format.is_empty() {
                self.logging.format = format;
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        let economics = &self.economics;
        if economics.min_stake.is_zero() {
            bail!("economics.min_stake must be positive");
        }
        if economics.max_supply.is_zero() {
            bail!("economics.max_supply must be positive");
        }
        if economics.initial_epoch_emission > economics.max_supply {
            bail!(
                "economics.initial_epoch_emission ({}) exceeds max_supply ({})",
                economics.initial_epoch_emission,
                economics.max_supply
            );
        }
        if economics.min_stake > economics.max_supply {
            bail!("economics.min_stake exceeds max_supply");
        }

        let genesis_total = sno_economics::genesis::total_allocation(&self.genesis)
            .ok_or_else(|| anyhow::anyhow!("genesis allocations overflow"))?;
        if genesis_total > economics.max_supply {
            bail!(
                "genesis allocates {} but max_supply is {}",
                genesis_total,
                economics.max_supply
            );
        }
        if let Some(system) = self.genesis.iter().find(|a| a.address.is_system()) {
            bail!("genesis allocation to system account {}", system.address);
        }

        if let Some(ttl) = self.governance.proposal_ttl_secs {
            if ttl <= 0 {
                bail!("governance.proposal_ttl_secs must be positive, got {}", ttl);
            }
        }
        if !matches!(self.logging.format.as_str(), "pretty" | "compact" | "json") {
            bail!("logging.format must be pretty, compact or json");
        }
        if self.events.buffer == 0 {
            bail!("events.buffer must be positive");
        }
        Ok(())
    }
}
