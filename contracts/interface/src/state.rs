//! StakeKit account layouts.
//!
//! Accounts are `[discriminator (8 bytes)][borsh fields][reserved]`, with the
//! discriminator `sha256("account:<Name>")[..8]`. Trailing reserved bytes are
//! ignored; everything else must decode exactly or the read fails.

use crate::error::InterfaceError;
use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::pubkey::Pubkey;

/// Account types owned by the staking program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountDiscriminator {
    GlobalState,
    UserInfo,
}

impl AccountDiscriminator {
    pub fn name(self) -> &'static str {
        match self {
            AccountDiscriminator::GlobalState => "GlobalState",
            AccountDiscriminator::UserInfo => "UserInfo",
        }
    }

    pub fn bytes(self) -> [u8; 8] {
        crate::discriminator("account", self.name())
    }
}

/// Singleton program configuration.
///
/// PDA Seeds: ["global_state"]
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct GlobalState {
    /// Program admin
    pub authority: [u8; 32],
    /// Staked token mint
    pub token_mint: [u8; 32],
    /// Vault token account (PDA: ["vault", token_mint])
    pub vault: [u8; 32],
    /// Reward rate in basis points per year
    pub reward_rate_bps: u64,
    /// Minimum time between stake and unstake
    pub lock_period_secs: i64,
    /// Sum of all staked amounts, in base units
    pub total_staked: u64,
    /// Number of registered users
    pub total_users: u64,
    pub bump: u8,
}

/// Per-wallet staking record.
///
/// PDA Seeds: ["user_info", owner]
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct UserInfo {
    pub owner: [u8; 32],
    /// Staked amount, in base units
    pub staked_amount: u64,
    /// Accrued and unclaimed rewards, in base units
    pub pending_rewards: u64,
    pub last_stake_ts: i64,
    pub last_claim_ts: i64,
    pub referrer: Option<[u8; 32]>,
    pub bump: u8,
}

fn decode<T: BorshDeserialize>(kind: AccountDiscriminator, data: &[u8]) -> Result<T, InterfaceError> {
    let account = kind.name();
    if data.len() < 8 {
        return Err(InterfaceError::AccountDataTooSmall {
            account,
            len: data.len(),
        });
    }
    let (head, mut rest) = data.split_at(8);
    if head != kind.bytes() {
        return Err(InterfaceError::DiscriminatorMismatch { account });
    }
    T::deserialize(&mut rest).map_err(|e| InterfaceError::Malformed {
        account,
        reason: e.to_string(),
    })
}

fn encode<T: BorshSerialize>(kind: AccountDiscriminator, value: &T) -> Result<Vec<u8>, InterfaceError> {
    let mut data = kind.bytes().to_vec();
    borsh::to_writer(&mut data, value).map_err(|e| InterfaceError::Encode {
        what: kind.name(),
        reason: e.to_string(),
    })?;
    Ok(data)
}

impl GlobalState {
    pub fn decode(data: &[u8]) -> Result<Self, InterfaceError> {
        decode(AccountDiscriminator::GlobalState, data)
    }

    pub fn encode(&self) -> Result<Vec<u8>, InterfaceError> {
        encode(AccountDiscriminator::GlobalState, self)
    }

    pub fn token_mint(&self) -> Pubkey {
        Pubkey::new_from_array(self.token_mint)
    }

    pub fn vault(&self) -> Pubkey {
        Pubkey::new_from_array(self.vault)
    }

    pub fn authority(&self) -> Pubkey {
        Pubkey::new_from_array(self.authority)
    }
}

impl UserInfo {
    pub fn new(owner: &Pubkey, referrer: Option<&Pubkey>, bump: u8) -> Self {
        Self {
            owner: owner.to_bytes(),
            staked_amount: 0,
            pending_rewards: 0,
            last_stake_ts: 0,
            last_claim_ts: 0,
            referrer: referrer.map(|r| r.to_bytes()),
            bump,
        }
    }

    pub fn decode(data: &[u8]) -> Result<Self, InterfaceError> {
        decode(AccountDiscriminator::UserInfo, data)
    }

    /// Decode and check the record belongs to `owner`.
    pub fn decode_for(data: &[u8], owner: &Pubkey) -> Result<Self, InterfaceError> {
        let info = Self::decode(data)?;
        if info.owner != owner.to_bytes() {
            return Err(InterfaceError::OwnerMismatch {
                account: AccountDiscriminator::UserInfo.name(),
                expected: *owner,
                found: info.owner(),
            });
        }
        Ok(info)
    }

    pub fn encode(&self) -> Result<Vec<u8>, InterfaceError> {
        encode(AccountDiscriminator::UserInfo, self)
    }

    pub fn owner(&self) -> Pubkey {
        Pubkey::new_from_array(self.owner)
    }

    pub fn referrer(&self) -> Option<Pubkey> {
        self.referrer.map(Pubkey::new_from_array)
    }
}
