use crate::advanced::builders::TransactionRequest;
use crate::advanced::instructions;
use crate::basic::status::{FailureReason, TransactionStatus, TransactionStatusTracker};
use crate::core::config::ConfirmationConfig;
use crate::core::connection::{LatestBlockhash, SignatureState, SolConnection};
use crate::core::retry::RetryScheduler;
use crate::core::signer::{SignerError, WalletSigner};
use crate::error::{Result, StakeSdkError};
use crate::types::{StakeAccounts, StakeAction, TokenAmount};
use solana_sdk::hash::Hash;
use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::Transaction;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A transaction that reached the RPC endpoint, with the blockhash window it
/// must land in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmittedTransaction {
    pub signature: Signature,
    pub blockhash: Hash,
    pub last_valid_block_height: u64,
}

/// Builds, signs via the wallet, submits and confirms program transactions.
///
/// Holds no per-owner state; every address comes from a [`StakeAccounts`].
pub struct ProgramClient {
    connection: Arc<dyn SolConnection>,
    signer: Arc<dyn WalletSigner>,
    retry: RetryScheduler,
    confirmation: ConfirmationConfig,
}

impl ProgramClient {
    pub fn new(
        connection: Arc<dyn SolConnection>,
        signer: Arc<dyn WalletSigner>,
        retry: RetryScheduler,
        confirmation: ConfirmationConfig,
    ) -> Self {
        Self {
            connection,
            signer,
            retry,
            confirmation,
        }
    }

    pub fn connection(&self) -> &dyn SolConnection {
        self.connection.as_ref()
    }

    pub fn retry(&self) -> &RetryScheduler {
        &self.retry
    }

    //=========================================================================
    // Builders
    //=========================================================================

    pub fn build_register_transaction(
        &self,
        accounts: &StakeAccounts,
        referrer: Option<Pubkey>,
    ) -> Result<TransactionRequest> {
        Ok(TransactionRequest::builder(StakeAction::Register, accounts.owner)
            .add_instruction(instructions::register(accounts, referrer)?)
            .build())
    }

    pub async fn build_stake_transaction(
        &self,
        accounts: &StakeAccounts,
        amount: TokenAmount,
    ) -> Result<TransactionRequest> {
        let ix = instructions::stake(accounts, amount.base_units())?;
        self.build_token_transaction(StakeAction::Stake, accounts, ix)
            .await
    }

    pub async fn build_unstake_transaction(
        &self,
        accounts: &StakeAccounts,
        amount: TokenAmount,
    ) -> Result<TransactionRequest> {
        let ix = instructions::unstake(accounts, amount.base_units())?;
        self.build_token_transaction(StakeAction::Unstake, accounts, ix)
            .await
    }

    pub async fn build_claim_transaction(
        &self,
        accounts: &StakeAccounts,
    ) -> Result<TransactionRequest> {
        let ix = instructions::claim(accounts)?;
        self.build_token_transaction(StakeAction::Claim, accounts, ix)
            .await
    }

    /// Prefix `ix` with a token account creation when the owner has none yet.
    async fn build_token_transaction(
        &self,
        action: StakeAction,
        accounts: &StakeAccounts,
        ix: Instruction,
    ) -> Result<TransactionRequest> {
        let token_account = accounts.owner_token_account;
        let existing = self
            .retry
            .run("get_account", || self.connection.get_account(&token_account))
            .await?;
        if existing.is_none() {
            debug!(owner = %accounts.owner, %token_account, "token account missing, creating it first");
        }

        Ok(TransactionRequest::builder(action, accounts.owner)
            .add_instruction_if(existing.is_none(), || {
                instructions::create_owner_token_account(accounts)
            })
            .add_instruction(ix)
            .build())
    }

    //=========================================================================
    // Submission
    //=========================================================================

    /// Attach a fresh blockhash, ask the wallet to sign, then send.
    ///
    /// The blockhash is fetched here and never at build time.
    pub async fn submit(
        &self,
        request: TransactionRequest,
        tracker: &TransactionStatusTracker,
    ) -> Result<SubmittedTransaction> {
        let outcome = match self.sign(request, tracker).await {
            Ok((signed, latest)) => self.send(&signed, &latest, tracker).await,
            Err(e) => Err(e),
        };
        outcome.map_err(|e| abandon(tracker, e))
    }

    async fn sign(
        &self,
        request: TransactionRequest,
        tracker: &TransactionStatusTracker,
    ) -> Result<(Transaction, LatestBlockhash)> {
        let latest = self
            .retry
            .run("get_latest_blockhash", || self.connection.get_latest_blockhash())
            .await?;

        tracker.advance(TransactionStatus::AwaitingSignature);
        let unsigned = request.into_transaction(&latest);
        let signed = self
            .signer
            .sign_transaction(unsigned)
            .await
            .map_err(|e| match e {
                SignerError::Cancelled => StakeSdkError::UserCancelled,
                SignerError::Failed(msg) => StakeSdkError::Signer(msg),
            })?;
        Ok((signed, latest))
    }

    async fn send(
        &self,
        signed: &Transaction,
        latest: &LatestBlockhash,
        tracker: &TransactionStatusTracker,
    ) -> Result<SubmittedTransaction> {
        // Resending the same signed bytes cannot double-spend: the ledger
        // deduplicates by signature.
        let signature = self
            .retry
            .run("send_transaction", || self.connection.send_transaction(signed))
            .await?;

        tracker.advance(TransactionStatus::Submitted(signature));
        info!(action = %tracker.action(), %signature, "transaction submitted");

        Ok(SubmittedTransaction {
            signature,
            blockhash: latest.blockhash,
            last_valid_block_height: latest.last_valid_block_height,
        })
    }

    /// Poll until the transaction is confirmed, fails, or its blockhash
    /// expires.
    pub async fn confirm(
        &self,
        submitted: &SubmittedTransaction,
        tracker: &TransactionStatusTracker,
    ) -> Result<()> {
        match self.poll_confirmation(submitted).await {
            Ok(()) => {
                land(tracker, submitted.signature);
                Ok(())
            },
            Err(e) => Err(abandon(tracker, e)),
        }
    }

    /// The blockhash expiry height is the deadline. `max_polls` only bounds
    /// consecutive polls in which the block height does not move, so a
    /// stalled or unreachable node cannot hold the loop open forever.
    async fn poll_confirmation(&self, submitted: &SubmittedTransaction) -> Result<()> {
        let signature = submitted.signature;
        let stall_limit = self.confirmation.max_polls.max(1);
        let mut highest: Option<u64> = None;
        let mut stalled = 0;

        loop {
            match self.poll_once(submitted).await {
                PollOutcome::Final(result) => return result,
                PollOutcome::Pending(Some(height)) if highest.map_or(true, |h| height > h) => {
                    debug!(%signature, block_height = height, "awaiting confirmation");
                    highest = Some(height);
                    stalled = 0;
                },
                PollOutcome::Pending(_) => {
                    stalled += 1;
                    debug!(%signature, stalled, "block height not advancing");
                },
            }

            tokio::time::sleep(self.confirmation.poll_interval()).await;
            if stalled >= stall_limit {
                break;
            }
        }

        // One last look before giving up.
        match self.poll_once(submitted).await {
            PollOutcome::Final(result) => result,
            PollOutcome::Pending(_) => {
                warn!(%signature, ?highest, "chain stalled before the blockhash expired");
                Err(StakeSdkError::ConfirmationTimeout(signature))
            },
        }
    }

    async fn poll_once(&self, submitted: &SubmittedTransaction) -> PollOutcome {
        let signature = submitted.signature;
        let state = self
            .connection
            .confirm_transaction(
                &signature,
                &submitted.blockhash,
                submitted.last_valid_block_height,
            )
            .await;

        match state {
            Ok(SignatureState::Confirmed) => PollOutcome::Final(Ok(())),
            Ok(SignatureState::Failed(err)) => PollOutcome::Final(Err(
                StakeSdkError::from_transaction_error(err, Some(signature)),
            )),
            Ok(SignatureState::Pending { block_height })
                if block_height > submitted.last_valid_block_height =>
            {
                PollOutcome::Final(Err(StakeSdkError::BlockhashExpired {
                    signature: Some(signature),
                }))
            },
            Ok(SignatureState::Pending { block_height }) => PollOutcome::Pending(Some(block_height)),
            // A failed status query says nothing about the transaction.
            Err(e) if e.is_transient() => {
                debug!(%signature, error = %e, "status query failed, polling again");
                PollOutcome::Pending(None)
            },
            Err(e) => PollOutcome::Final(Err(e.into())),
        }
    }

    pub async fn send_and_confirm(
        &self,
        request: TransactionRequest,
        tracker: &TransactionStatusTracker,
    ) -> Result<Signature> {
        let settlement = self
            .send_and_confirm_accepting(request, tracker, |_| false)
            .await?;
        Ok(settlement.signature())
    }

    /// Like [`send_and_confirm`](Self::send_and_confirm), but a rejection
    /// for which `accept` returns true ends the tracker in `Confirmed`: the
    /// state the transaction asked for already holds.
    pub async fn send_and_confirm_accepting<F>(
        &self,
        request: TransactionRequest,
        tracker: &TransactionStatusTracker,
        accept: F,
    ) -> Result<Settlement>
    where
        F: Fn(&StakeSdkError) -> bool,
    {
        let (signed, latest) = self
            .sign(request, tracker)
            .await
            .map_err(|e| abandon(tracker, e))?;
        let signature = signed.signatures.first().copied().unwrap_or_default();

        let outcome = match self.send(&signed, &latest, tracker).await {
            Ok(submitted) => self.poll_confirmation(&submitted).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(()) => {
                land(tracker, signature);
                Ok(Settlement::Landed(signature))
            },
            Err(e) if accept(&e) => {
                debug!(action = %tracker.action(), %signature, error = %e, "rejection accepted");
                if tracker.current() == TransactionStatus::AwaitingSignature {
                    tracker.advance(TransactionStatus::Submitted(signature));
                }
                land(tracker, signature);
                Ok(Settlement::Accepted(signature))
            },
            Err(e) => Err(abandon(tracker, e)),
        }
    }
}

/// How a transaction sent through
/// [`ProgramClient::send_and_confirm_accepting`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    Landed(Signature),
    /// Rejected with an error the caller counts as success
    Accepted(Signature),
}

impl Settlement {
    pub fn signature(&self) -> Signature {
        match self {
            Settlement::Landed(signature) | Settlement::Accepted(signature) => *signature,
        }
    }
}

enum PollOutcome {
    Final(Result<()>),
    /// Still in flight; the block height when the node reported one
    Pending(Option<u64>),
}

fn land(tracker: &TransactionStatusTracker, signature: Signature) {
    tracker.advance(TransactionStatus::Confirmed(signature));
    info!(action = %tracker.action(), %signature, "transaction confirmed");
}

fn abandon(tracker: &TransactionStatusTracker, error: StakeSdkError) -> StakeSdkError {
    tracker.fail(failure_reason(&error));
    warn!(action = %tracker.action(), status = ?tracker.current(), error = %error, "transaction abandoned");
    error
}

fn failure_reason(error: &StakeSdkError) -> FailureReason {
    match error {
        StakeSdkError::UserCancelled => FailureReason::Cancelled,
        StakeSdkError::BlockhashExpired { .. } => FailureReason::Expired,
        StakeSdkError::ConfirmationTimeout(_) => FailureReason::TimedOut,
        StakeSdkError::ProgramError { code, .. } => FailureReason::Program(*code),
        other => FailureReason::Rejected(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::connection::ConnectionError;

    #[test]
    fn test_failure_reason_mapping() {
        assert_eq!(
            failure_reason(&StakeSdkError::UserCancelled),
            FailureReason::Cancelled
        );
        assert_eq!(
            failure_reason(&StakeSdkError::ProgramError {
                code: 6004,
                signature: None
            }),
            FailureReason::Program(6004)
        );
        assert_eq!(
            failure_reason(&StakeSdkError::BlockhashExpired { signature: None }),
            FailureReason::Expired
        );
        assert!(matches!(
            failure_reason(&StakeSdkError::Rpc(ConnectionError::InvalidRequest("x".into()))),
            FailureReason::Rejected(_)
        ));
    }
}
