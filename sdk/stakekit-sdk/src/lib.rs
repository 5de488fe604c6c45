//! StakeKit SDK
//!
//! Client-side orchestration for the StakeKit staking program: address
//! derivation, registration, transaction building and confirmation, balance
//! synchronization and retry handling.
//!
//! Most callers only need [`StakingClient`]. The [`advanced`] module exposes
//! the raw instruction builders for callers composing their own transactions.

pub mod advanced;
pub mod basic;
pub mod core;
pub mod error;
pub mod types;
pub mod utils;

pub use crate::basic::history::{NoopLogSink, TracingLogSink, TransactionLogSink};
pub use crate::basic::registration::{RegistrationOutcome, RegistrationState};
pub use crate::basic::staking::StakingClient;
pub use crate::basic::status::{
    FailureReason, StatusUpdate, TransactionStatus, TransactionStatusTracker,
};
pub use crate::core::config::StakeClientConfig;
pub use crate::core::connection::{ConnectionError, SolConnection};
pub use crate::core::retry::{RetryPolicy, RetryScheduler};
pub use crate::core::rpc::RpcConnection;
pub use crate::core::signer::{KeypairSigner, SignerError, WalletSigner};
pub use crate::error::{Result, StakeSdkError};
pub use crate::types::{
    ActionReceipt, BalanceSnapshot, StakeAccounts, StakeAction, StakeLogEntry, TokenAmount,
};
pub use crate::utils::{
    derive_global_state_pda, derive_user_info_pda, derive_vault_pda, format_base_units,
    ui_amount_to_base_units,
};

pub use stakekit_interface as interface;
