use crate::core::connection::ConnectionError;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::instruction::InstructionError;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::TransactionError;
use stakekit_interface::{AddressDerivationError, InterfaceError, StakingProgramError};
use thiserror::Error;

/// SDK-specific error types for StakeKit operations
#[derive(Debug, Clone, Error)]
pub enum StakeSdkError {
    /// The wallet declined to sign
    #[error("User cancelled the signature request")]
    UserCancelled,

    /// The wallet failed for a reason other than the user declining
    #[error("Signer error: {0}")]
    Signer(String),

    /// Amount is zero, negative, unparsable or finer than the mint allows
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Local pre-check: not enough tokens in the owner's token account
    #[error("Insufficient balance: requested {requested}, available {available} (base units)")]
    InsufficientBalance { requested: u64, available: u64 },

    /// Local pre-check: not enough staked to unstake
    #[error("Insufficient staked amount: requested {requested}, staked {staked} (base units)")]
    InsufficientStaked { requested: u64, staked: u64 },

    /// Local pre-check: no pending rewards
    #[error("Nothing to claim")]
    NothingToClaim,

    /// Account not found on-chain. For PDAs this is also how a seed mismatch shows up.
    #[error("Account not found: {0}")]
    AccountNotFound(Pubkey),

    /// Seeds could not be mapped to a program address
    #[error("Address derivation failed: {0}")]
    AddressDerivation(#[from] AddressDerivationError),

    /// Account or instruction bytes did not match the pinned schema
    #[error("Program data error: {0}")]
    ProgramData(#[from] InterfaceError),

    /// A transient RPC failure persisted through every retry
    #[error("Network unavailable after {attempts} attempt(s): {source}")]
    TransientNetwork {
        attempts: usize,
        #[source]
        source: ConnectionError,
    },

    /// A non-retryable RPC failure
    #[error("RPC error: {0}")]
    Rpc(ConnectionError),

    /// The transaction's blockhash expired before it landed. It must be
    /// rebuilt, never resent.
    #[error("Blockhash expired{}", signature_suffix(.signature))]
    BlockhashExpired { signature: Option<Signature> },

    /// Polling budget ran out before the blockhash expired; outcome unknown
    #[error("Confirmation of {0} timed out")]
    ConfirmationTimeout(Signature),

    /// Program rejected the transaction with a custom error code
    #[error("Program error {code}{}", program_error_suffix(.code))]
    ProgramError { code: u32, signature: Option<Signature> },

    /// Transaction failed on-chain for a non-program reason
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Registration confirmed but the record never became visible
    #[error("User record for {0} not visible after registration")]
    RegistrationNotVisible(Pubkey),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

fn signature_suffix(signature: &Option<Signature>) -> String {
    signature
        .map(|s| format!(" before transaction {s} was confirmed"))
        .unwrap_or_default()
}

fn program_error_suffix(code: &u32) -> String {
    StakingProgramError::try_from(*code)
        .map(|e| format!(" ({e})"))
        .unwrap_or_default()
}

impl StakeSdkError {
    /// Whether the caller can safely re-initiate the whole operation with a
    /// freshly built transaction.
    ///
    /// Program rejections and expired transactions return `false`: the
    /// outcome of the original submission must be re-checked first.
    pub fn is_retry_safe(&self) -> bool {
        matches!(
            self,
            StakeSdkError::UserCancelled | StakeSdkError::TransientNetwork { .. }
        )
    }

    /// Decoded program error, if this is one the interface knows.
    pub fn program_error(&self) -> Option<StakingProgramError> {
        match self {
            StakeSdkError::ProgramError { code, .. } => StakingProgramError::try_from(*code).ok(),
            _ => None,
        }
    }
}

impl StakeSdkError {
    /// Classify an on-chain transaction failure.
    pub fn from_transaction_error(err: TransactionError, signature: Option<Signature>) -> Self {
        match err {
            TransactionError::InstructionError(_, InstructionError::Custom(code)) => {
                StakeSdkError::ProgramError { code, signature }
            },
            TransactionError::BlockhashNotFound => StakeSdkError::BlockhashExpired { signature },
            other => StakeSdkError::TransactionFailed(other.to_string()),
        }
    }
}

impl From<ConnectionError> for StakeSdkError {
    fn from(e: ConnectionError) -> Self {
        match e {
            ConnectionError::BlockhashNotFound => StakeSdkError::BlockhashExpired { signature: None },
            ConnectionError::TransactionRejected(err) => Self::from_transaction_error(err, None),
            other => StakeSdkError::Rpc(other),
        }
    }
}

/// Result type alias for SDK operations
pub type Result<T> = std::result::Result<T, StakeSdkError>;
