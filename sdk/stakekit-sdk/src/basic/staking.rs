use crate::advanced::builders::TransactionRequest;
use crate::basic::balances::BalanceSynchronizer;
use crate::basic::client::ProgramClient;
use crate::basic::history::{self, NoopLogSink, TransactionLogSink};
use crate::basic::registration::{RegistrationCoordinator, RegistrationOutcome, RegistrationState};
use crate::basic::status::{StatusUpdate, TransactionStatusTracker};
use crate::core::config::StakeClientConfig;
use crate::core::connection::SolConnection;
use crate::core::constants::STATUS_CHANNEL_CAPACITY;
use crate::core::retry::RetryScheduler;
use crate::core::rpc::RpcConnection;
use crate::core::signer::WalletSigner;
use crate::error::{Result, StakeSdkError};
use crate::types::{
    ActionReceipt, BalanceSnapshot, StakeAccounts, StakeAction, StakeLogEntry, TokenAmount,
};
use crate::utils;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use stakekit_interface::{GlobalState, UserInfo};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Stake, unstake and claim for the wallet behind one signer.
///
/// Every action runs local checks against the cached balances first, sends
/// one transaction (after a registration transaction if the stake needs one),
/// waits for confirmation, hands the result to the log sink and force
/// refreshes balances.
///
/// Concurrent actions are not serialized here; ordering between them is up to
/// the program.
pub struct StakingClient {
    config: StakeClientConfig,
    accounts: StakeAccounts,
    program: Arc<ProgramClient>,
    registration: RegistrationCoordinator,
    balances: BalanceSynchronizer,
    log_sink: Arc<dyn TransactionLogSink>,
    events: broadcast::Sender<StatusUpdate>,
}

impl StakingClient {
    pub fn new(
        connection: Arc<dyn SolConnection>,
        signer: Arc<dyn WalletSigner>,
        config: StakeClientConfig,
    ) -> Result<Self> {
        config.validate()?;

        let owner = signer.pubkey();
        let accounts = StakeAccounts::derive(&config.program_id, &config.token_mint, &owner)?;
        let retry = RetryScheduler::new(config.retry.clone());

        let program = Arc::new(ProgramClient::new(
            connection.clone(),
            signer,
            retry.clone(),
            config.confirmation.clone(),
        ));
        let registration =
            RegistrationCoordinator::new(program.clone(), config.registration.clone());
        let balances = BalanceSynchronizer::new(
            connection,
            retry,
            config.balances.debounce(),
            config.token_decimals,
        );
        let (events, _) = broadcast::channel(STATUS_CHANNEL_CAPACITY);

        debug!(%owner, program_id = %config.program_id, "staking client ready");
        Ok(Self {
            config,
            accounts,
            program,
            registration,
            balances,
            log_sink: Arc::new(NoopLogSink),
            events,
        })
    }

    /// Connect over JSON-RPC to `config.rpc_url`.
    pub fn connect(config: StakeClientConfig, signer: Arc<dyn WalletSigner>) -> Result<Self> {
        let connection = RpcConnection::new(config.rpc_url.clone(), config.commitment_config());
        Self::new(Arc::new(connection), signer, config)
    }

    pub fn with_log_sink(mut self, sink: Arc<dyn TransactionLogSink>) -> Self {
        self.log_sink = sink;
        self
    }

    pub fn owner(&self) -> Pubkey {
        self.accounts.owner
    }

    pub fn accounts(&self) -> &StakeAccounts {
        &self.accounts
    }

    pub fn config(&self) -> &StakeClientConfig {
        &self.config
    }

    pub fn program(&self) -> &ProgramClient {
        &self.program
    }

    /// Status changes of every transaction this client sends.
    pub fn subscribe(&self) -> broadcast::Receiver<StatusUpdate> {
        self.events.subscribe()
    }

    //=========================================================================
    // Reads
    //=========================================================================

    /// Debounced balance read.
    pub async fn refresh_balances(&self) -> Result<BalanceSnapshot> {
        let snapshot = self.balances.refresh(&self.accounts).await?;
        self.registration.observe(&self.accounts.owner, snapshot.registered);
        Ok(snapshot)
    }

    pub async fn force_refresh_balances(&self) -> Result<BalanceSnapshot> {
        let snapshot = self.balances.force_refresh(&self.accounts).await?;
        self.registration.observe(&self.accounts.owner, snapshot.registered);
        Ok(snapshot)
    }

    pub fn cached_balances(&self) -> Option<BalanceSnapshot> {
        self.balances.cached(&self.accounts.owner)
    }

    pub async fn fetch_user_info(&self) -> Result<Option<UserInfo>> {
        utils::fetch_user_info(
            self.program.connection(),
            self.program.retry(),
            &self.accounts.user_info,
            &self.accounts.owner,
        )
        .await
    }

    pub async fn fetch_global_state(&self) -> Result<GlobalState> {
        utils::fetch_global_state(
            self.program.connection(),
            self.program.retry(),
            &self.accounts.global_state,
        )
        .await
    }

    //=========================================================================
    // Actions
    //=========================================================================

    /// Cached registration state; `Unknown` until a read or action saw the ledger.
    pub fn registration_state(&self) -> RegistrationState {
        self.registration.state(&self.accounts.owner)
    }

    pub async fn ensure_registered(&self, referrer: Option<Pubkey>) -> Result<RegistrationOutcome> {
        self.registration
            .ensure_registered(&self.accounts, referrer, Some(self.events.clone()))
            .await
    }

    /// Stake `amount`, given in whole-token decimal notation ("40.5").
    pub async fn stake(&self, amount: &str) -> Result<ActionReceipt> {
        self.stake_with_referrer(amount, None).await
    }

    /// Stake, registering first with `referrer` if the owner has no record yet.
    pub async fn stake_with_referrer(
        &self,
        amount: &str,
        referrer: Option<Pubkey>,
    ) -> Result<ActionReceipt> {
        let snapshot = self.balances_for_check().await?;
        let amount = TokenAmount::from_ui(amount, snapshot.decimals)?;
        if amount.base_units() > snapshot.token_balance() {
            return Err(StakeSdkError::InsufficientBalance {
                requested: amount.base_units(),
                available: snapshot.token_balance(),
            });
        }

        let registration = self.ensure_registered(referrer).await?.signature;

        let request = self
            .program
            .build_stake_transaction(&self.accounts, amount)
            .await?;
        let signature = self.send(StakeAction::Stake, request).await?;
        Ok(self
            .finish(StakeAction::Stake, amount.base_units(), signature, registration)
            .await)
    }

    pub async fn unstake(&self, amount: &str) -> Result<ActionReceipt> {
        let snapshot = self.balances_for_check().await?;
        let amount = TokenAmount::from_ui(amount, snapshot.decimals)?;
        if amount.base_units() > snapshot.staked_amount {
            return Err(StakeSdkError::InsufficientStaked {
                requested: amount.base_units(),
                staked: snapshot.staked_amount,
            });
        }

        let request = self
            .program
            .build_unstake_transaction(&self.accounts, amount)
            .await?;
        let signature = self.send(StakeAction::Unstake, request).await?;
        Ok(self
            .finish(StakeAction::Unstake, amount.base_units(), signature, None)
            .await)
    }

    /// Claim pending rewards. The claimed amount is decided by the program.
    pub async fn claim(&self) -> Result<ActionReceipt> {
        let snapshot = self.balances_for_check().await?;
        if !snapshot.registered || snapshot.pending_rewards == 0 {
            return Err(StakeSdkError::NothingToClaim);
        }

        let request = self.program.build_claim_transaction(&self.accounts).await?;
        let signature = self.send(StakeAction::Claim, request).await?;
        Ok(self.finish(StakeAction::Claim, 0, signature, None).await)
    }

    /// Cached balances when present, otherwise a (debounced) read.
    async fn balances_for_check(&self) -> Result<BalanceSnapshot> {
        match self.cached_balances() {
            Some(snapshot) => Ok(snapshot),
            None => self.refresh_balances().await,
        }
    }

    async fn send(
        &self,
        action: StakeAction,
        request: TransactionRequest,
    ) -> Result<Signature> {
        let tracker = TransactionStatusTracker::new(action).with_events(self.events.clone());
        match self.program.send_and_confirm(request, &tracker).await {
            Ok(signature) => Ok(signature),
            Err(e) => {
                // Anything past the signer may have touched the ledger.
                if !matches!(e, StakeSdkError::UserCancelled) {
                    self.balances.invalidate(&self.accounts.owner);
                }
                Err(e)
            },
        }
    }

    async fn finish(
        &self,
        action: StakeAction,
        amount: u64,
        signature: Signature,
        registration: Option<Signature>,
    ) -> ActionReceipt {
        history::emit(
            self.log_sink.clone(),
            StakeLogEntry {
                owner: self.accounts.owner,
                amount,
                action,
                signature,
                timestamp: unix_timestamp(),
            },
        );

        let balances = match self.force_refresh_balances().await {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!(%signature, error = %e, "post-confirmation balance refresh failed");
                self.balances.invalidate(&self.accounts.owner);
                None
            },
        };

        info!(owner = %self.accounts.owner, %action, amount, %signature, "action complete");
        ActionReceipt {
            action,
            signature,
            amount,
            registration,
            balances,
        }
    }
}

fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}
