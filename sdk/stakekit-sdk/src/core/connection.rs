use async_trait::async_trait;
use solana_sdk::account::Account;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::{Transaction, TransactionError};
use thiserror::Error;

/// A blockhash together with the last block height at which a transaction
/// referencing it can still land.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatestBlockhash {
    pub blockhash: Hash,
    pub last_valid_block_height: u64,
}

/// What the endpoint currently knows about a submitted signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureState {
    /// Not yet confirmed at the configured commitment.
    Pending { block_height: u64 },
    Confirmed,
    Failed(TransactionError),
}

/// Failures reported by a [`SolConnection`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("rate limited by RPC endpoint")]
    RateLimited,

    #[error("RPC endpoint unavailable: {0}")]
    Unavailable(String),

    #[error("RPC request timed out")]
    Timeout,

    #[error("invalid RPC request: {0}")]
    InvalidRequest(String),

    #[error("blockhash not found")]
    BlockhashNotFound,

    #[error("transaction simulation failed: {0}")]
    Preflight(String),

    #[error("transaction rejected: {0}")]
    TransactionRejected(TransactionError),

    #[error("{0}")]
    Other(String),
}

impl ConnectionError {
    /// Transient failures may succeed if the same request is repeated.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ConnectionError::RateLimited | ConnectionError::Unavailable(_) | ConnectionError::Timeout
        )
    }
}

pub type ConnectionResult<T> = Result<T, ConnectionError>;

/// The RPC surface the SDK consumes.
///
/// Implementations must report a missing account as `Ok(None)`, not as an error.
#[async_trait]
pub trait SolConnection: Send + Sync {
    async fn get_account(&self, pubkey: &Pubkey) -> ConnectionResult<Option<Account>>;

    /// Raw balance of an SPL token account, `None` if the account does not exist.
    async fn get_token_balance(&self, token_account: &Pubkey) -> ConnectionResult<Option<u64>>;

    async fn get_latest_blockhash(&self) -> ConnectionResult<LatestBlockhash>;

    async fn send_transaction(&self, tx: &Transaction) -> ConnectionResult<Signature>;

    async fn confirm_transaction(
        &self,
        signature: &Signature,
        blockhash: &Hash,
        last_valid_block_height: u64,
    ) -> ConnectionResult<SignatureState>;
}
