//! Client configuration.
//!
//! Loaded from TOML; every section except the three addresses has defaults.
//!
//! ```toml
//! rpc_url = "https://api.devnet.solana.com"
//! program_id = "..."
//! token_mint = "..."
//! commitment = "confirmed"
//!
//! [retry]
//! max_attempts = 2
//! initial_delay_ms = 400
//!
//! [balances]
//! debounce_ms = 10000
//! ```

use crate::core::constants::*;
use crate::core::retry::RetryPolicy;
use crate::error::{Result, StakeSdkError};
use serde::{Deserialize, Serialize};
use solana_sdk::commitment_config::{CommitmentConfig, CommitmentLevel};
use solana_sdk::pubkey::Pubkey;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    Processed,
    #[default]
    Confirmed,
    Finalized,
}

impl From<Commitment> for CommitmentConfig {
    fn from(c: Commitment) -> Self {
        let commitment = match c {
            Commitment::Processed => CommitmentLevel::Processed,
            Commitment::Confirmed => CommitmentLevel::Confirmed,
            Commitment::Finalized => CommitmentLevel::Finalized,
        };
        CommitmentConfig { commitment }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BalanceConfig {
    pub debounce_ms: u64,
}

impl Default for BalanceConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_BALANCE_DEBOUNCE_MS,
        }
    }
}

impl BalanceConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfirmationConfig {
    pub poll_interval_ms: u64,
    /// Stall guard: consecutive polls that see no new block height
    pub max_polls: u32,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_CONFIRM_POLL_INTERVAL_MS,
            max_polls: DEFAULT_CONFIRM_MAX_POLLS,
        }
    }
}

impl ConfirmationConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationConfig {
    /// Pause between existence checks after a confirmed registration
    pub settle_delay_ms: u64,
    pub settle_attempts: u32,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            settle_attempts: DEFAULT_SETTLE_ATTEMPTS,
        }
    }
}

impl RegistrationConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StakeClientConfig {
    pub rpc_url: String,
    #[serde(with = "pubkey_str")]
    pub program_id: Pubkey,
    #[serde(with = "pubkey_str")]
    pub token_mint: Pubkey,
    /// Pins the mint's decimals instead of reading them from the mint account
    #[serde(default)]
    pub token_decimals: Option<u8>,
    #[serde(default)]
    pub commitment: Commitment,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub balances: BalanceConfig,
    #[serde(default)]
    pub confirmation: ConfirmationConfig,
    #[serde(default)]
    pub registration: RegistrationConfig,
}

impl StakeClientConfig {
    pub fn new(rpc_url: impl Into<String>, program_id: Pubkey, token_mint: Pubkey) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            program_id,
            token_mint,
            token_decimals: None,
            commitment: Commitment::default(),
            retry: RetryPolicy::default(),
            balances: BalanceConfig::default(),
            confirmation: ConfirmationConfig::default(),
            registration: RegistrationConfig::default(),
        }
    }

    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(input).map_err(|e| StakeSdkError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let input = std::fs::read_to_string(path)
            .map_err(|e| StakeSdkError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&input)
    }

    pub fn validate(&self) -> Result<()> {
        if self.rpc_url.trim().is_empty() {
            return Err(StakeSdkError::Config("rpc_url is empty".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(StakeSdkError::Config("retry.max_attempts must be at least 1".into()));
        }
        if self.confirmation.max_polls == 0 {
            return Err(StakeSdkError::Config("confirmation.max_polls must be at least 1".into()));
        }
        if self.registration.settle_attempts == 0 {
            return Err(StakeSdkError::Config(
                "registration.settle_attempts must be at least 1".into(),
            ));
        }
        if matches!(self.token_decimals, Some(d) if d > 19) {
            return Err(StakeSdkError::Config("token_decimals must be at most 19".into()));
        }
        Ok(())
    }

    pub fn commitment_config(&self) -> CommitmentConfig {
        self.commitment.into()
    }
}

/// Base58 string (de)serialization for pubkeys in config files.
mod pubkey_str {
    use serde::{de, Deserialize, Deserializer, Serializer};
    use solana_sdk::pubkey::Pubkey;
    use std::str::FromStr;

    pub fn serialize<S: Serializer>(key: &Pubkey, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&key.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Pubkey, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Pubkey::from_str(&raw).map_err(|e| de::Error::custom(format!("invalid pubkey {raw}: {e}")))
    }
}
