//! StakeKit Interface Error Types

use solana_program::pubkey::Pubkey;
use thiserror::Error;

/// Offset Anchor applies to program-defined error codes.
pub const CUSTOM_ERROR_OFFSET: u32 = 6000;

/// System program "account already in use", raised when `register` tries to
/// create a user record that already exists.
pub const SYSTEM_ACCOUNT_ALREADY_IN_USE: u32 = 0;

/// Custom errors returned by the staking program.
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u32)]
pub enum StakingProgramError {
    #[error("User is already registered")]
    AlreadyRegistered = 6000,

    #[error("User is not registered")]
    NotRegistered = 6001,

    #[error("Amount must be greater than zero")]
    ZeroAmount = 6002,

    #[error("Insufficient staked amount")]
    InsufficientStake = 6003,

    #[error("Stake is still locked")]
    StakeLocked = 6004,

    #[error("No rewards to claim")]
    NoRewards = 6005,

    #[error("Token mint does not match global state")]
    InvalidMint = 6006,

    #[error("Vault does not match global state")]
    InvalidVault = 6007,

    #[error("Arithmetic overflow")]
    MathOverflow = 6008,
}

impl StakingProgramError {
    pub fn code(self) -> u32 {
        self as u32
    }
}

impl TryFrom<u32> for StakingProgramError {
    type Error = u32;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        match code {
            6000 => Ok(Self::AlreadyRegistered),
            6001 => Ok(Self::NotRegistered),
            6002 => Ok(Self::ZeroAmount),
            6003 => Ok(Self::InsufficientStake),
            6004 => Ok(Self::StakeLocked),
            6005 => Ok(Self::NoRewards),
            6006 => Ok(Self::InvalidMint),
            6007 => Ok(Self::InvalidVault),
            6008 => Ok(Self::MathOverflow),
            other => Err(other),
        }
    }
}

/// Whether a custom error code returned by a `register` transaction means the
/// user record already exists.
pub fn is_already_registered(code: u32) -> bool {
    code == StakingProgramError::AlreadyRegistered.code() || code == SYSTEM_ACCOUNT_ALREADY_IN_USE
}

/// Deterministic failures of PDA derivation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressDerivationError {
    #[error("too many seeds: {0} (max {max})", max = solana_program::pubkey::MAX_SEEDS)]
    TooManySeeds(usize),

    #[error("seed {index} is {len} bytes (max {max})", max = solana_program::pubkey::MAX_SEED_LEN)]
    SeedTooLong { index: usize, len: usize },

    #[error("no valid bump seed for program {0}")]
    NoViableBump(Pubkey),
}

/// Account and instruction data failures. Decoding never guesses: any
/// mismatch is an error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("instruction data too short ({len} bytes)")]
    InstructionTooShort { len: usize },

    #[error("unknown instruction discriminator")]
    UnknownInstruction,

    #[error("failed to decode instruction arguments: {0}")]
    MalformedInstruction(String),

    #[error("failed to encode {what}: {reason}")]
    Encode { what: &'static str, reason: String },

    #[error("{account}: data too small ({len} bytes)")]
    AccountDataTooSmall { account: &'static str, len: usize },

    #[error("{account}: discriminator mismatch")]
    DiscriminatorMismatch { account: &'static str },

    #[error("{account}: failed to decode fields: {reason}")]
    Malformed {
        account: &'static str,
        reason: String,
    },

    #[error("{account}: owner mismatch (expected {expected}, found {found})")]
    OwnerMismatch {
        account: &'static str,
        expected: Pubkey,
        found: Pubkey,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_program_error_codes_round_trip() {
        for err in [
            StakingProgramError::AlreadyRegistered,
            StakingProgramError::InsufficientStake,
            StakingProgramError::MathOverflow,
        ] {
            assert_eq!(StakingProgramError::try_from(err.code()), Ok(err));
        }
        assert_eq!(StakingProgramError::try_from(42), Err(42));
    }

    #[test]
    fn test_already_registered_codes() {
        assert!(is_already_registered(6000));
        assert!(is_already_registered(SYSTEM_ACCOUNT_ALREADY_IN_USE));
        assert!(!is_already_registered(6001));
    }
}
