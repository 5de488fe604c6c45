use crate::error::Result;
use crate::utils;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use std::fmt;
use tokio::time::Instant;

/// Every address a staking transaction touches for one owner.
///
/// Derived once from the pinned seed table and reused by all builders, so no
/// call site ever recomputes an address on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StakeAccounts {
    pub program_id: Pubkey,
    pub owner: Pubkey,
    pub token_mint: Pubkey,
    /// GlobalState PDA
    pub global_state: Pubkey,
    /// UserInfo PDA for `owner`
    pub user_info: Pubkey,
    /// Vault PDA for `token_mint`
    pub vault: Pubkey,
    /// Owner's associated token account
    pub owner_token_account: Pubkey,
}

impl StakeAccounts {
    pub fn derive(program_id: &Pubkey, token_mint: &Pubkey, owner: &Pubkey) -> Result<Self> {
        Ok(Self {
            program_id: *program_id,
            owner: *owner,
            token_mint: *token_mint,
            global_state: utils::derive_global_state_pda(program_id)?.address,
            user_info: utils::derive_user_info_pda(program_id, owner)?.address,
            vault: utils::derive_vault_pda(program_id, token_mint)?.address,
            owner_token_account: utils::owner_token_account(owner, token_mint),
        })
    }
}

/// A strictly positive amount in the mint's base units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenAmount {
    base_units: u64,
    decimals: u8,
}

impl TokenAmount {
    /// Scale a human decimal string, flooring extra precision.
    pub fn from_ui(amount: &str, decimals: u8) -> Result<Self> {
        Ok(Self {
            base_units: utils::ui_amount_to_base_units(amount, decimals)?,
            decimals,
        })
    }

    pub fn base_units(&self) -> u64 {
        self.base_units
    }

    pub fn decimals(&self) -> u8 {
        self.decimals
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&utils::format_base_units(self.base_units, self.decimals))
    }
}

/// Cached view of an SPL token account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenAccountSnapshot {
    pub address: Pubkey,
    pub owner: Pubkey,
    pub mint: Pubkey,
    /// Raw balance; zero when the account does not exist
    pub amount: u64,
}

/// Balances for one owner as of `fetched_at`. Stale as soon as any of the
/// owner's transactions confirms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceSnapshot {
    pub token: TokenAccountSnapshot,
    pub decimals: u8,
    /// Staked amount from the user record, in base units
    pub staked_amount: u64,
    pub pending_rewards: u64,
    /// Whether the user record exists
    pub registered: bool,
    pub fetched_at: Instant,
}

impl BalanceSnapshot {
    pub fn owner(&self) -> Pubkey {
        self.token.owner
    }

    pub fn token_balance(&self) -> u64 {
        self.token.amount
    }

    pub fn token_balance_ui(&self) -> String {
        utils::format_base_units(self.token.amount, self.decimals)
    }

    pub fn staked_ui(&self) -> String {
        utils::format_base_units(self.staked_amount, self.decimals)
    }

    pub fn pending_rewards_ui(&self) -> String {
        utils::format_base_units(self.pending_rewards, self.decimals)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StakeAction {
    Register,
    Stake,
    Unstake,
    Claim,
}

impl fmt::Display for StakeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StakeAction::Register => "register",
            StakeAction::Stake => "stake",
            StakeAction::Unstake => "unstake",
            StakeAction::Claim => "claim",
        };
        f.write_str(name)
    }
}

/// Entry handed to the external transaction log sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StakeLogEntry {
    pub owner: Pubkey,
    /// Base units; zero for claims, whose amount is decided on chain
    pub amount: u64,
    pub action: StakeAction,
    pub signature: Signature,
    /// Unix seconds
    pub timestamp: i64,
}

/// Result of a confirmed stake, unstake or claim.
#[derive(Debug, Clone)]
pub struct ActionReceipt {
    pub action: StakeAction,
    pub signature: Signature,
    pub amount: u64,
    /// Registration transaction sent first, if one was needed
    pub registration: Option<Signature>,
    /// Balances after the post-confirmation refresh; `None` if that read failed
    pub balances: Option<BalanceSnapshot>,
}
