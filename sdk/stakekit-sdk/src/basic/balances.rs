use crate::core::connection::SolConnection;
use crate::core::retry::RetryScheduler;
use crate::error::Result;
use crate::types::{BalanceSnapshot, StakeAccounts, TokenAccountSnapshot};
use crate::utils;
use solana_sdk::pubkey::Pubkey;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio::time::Instant;
use tracing::debug;

/// Per-owner refresh bookkeeping. The async mutex is held for the whole
/// fetch, so at most one refresh per owner is in flight.
#[derive(Default)]
struct RefreshSlot {
    /// Number of refreshes started so far
    started: AtomicU64,
    /// Generation of the last completed refresh
    finished: AtomicU64,
    state: tokio::sync::Mutex<SlotState>,
}

#[derive(Default)]
struct SlotState {
    /// Which start produced `outcome`
    generation: u64,
    outcome: Option<Result<BalanceSnapshot>>,
}

/// Fetches and caches token and staked balances per owner.
///
/// Non-forced refreshes inside the debounce window, measured from the last
/// completed refresh, return the cached snapshot. A caller that arrives while
/// a refresh is running waits for it and shares its outcome, failure
/// included. A forced caller only shares a refresh that started after it
/// asked, so it never sees data read before a confirmation.
pub struct BalanceSynchronizer {
    connection: Arc<dyn SolConnection>,
    retry: RetryScheduler,
    debounce: Duration,
    pinned_decimals: Option<u8>,
    decimals: OnceCell<u8>,
    slots: Mutex<HashMap<Pubkey, Arc<RefreshSlot>>>,
    latest: Mutex<HashMap<Pubkey, BalanceSnapshot>>,
}

impl BalanceSynchronizer {
    pub fn new(
        connection: Arc<dyn SolConnection>,
        retry: RetryScheduler,
        debounce: Duration,
        pinned_decimals: Option<u8>,
    ) -> Self {
        Self {
            connection,
            retry,
            debounce,
            pinned_decimals,
            decimals: OnceCell::new(),
            slots: Mutex::new(HashMap::new()),
            latest: Mutex::new(HashMap::new()),
        }
    }

    /// Latest snapshot for `owner` without touching the network.
    pub fn cached(&self, owner: &Pubkey) -> Option<BalanceSnapshot> {
        self.latest
            .lock()
            .ok()
            .and_then(|latest| latest.get(owner).cloned())
    }

    /// Drop the cached snapshot so the next refresh reads the ledger.
    pub fn invalidate(&self, owner: &Pubkey) {
        if let Ok(mut latest) = self.latest.lock() {
            latest.remove(owner);
        }
    }

    /// Mint decimals, pinned or read once from the mint account.
    pub async fn decimals(&self, token_mint: &Pubkey) -> Result<u8> {
        if let Some(decimals) = self.pinned_decimals {
            return Ok(decimals);
        }
        let decimals = self
            .decimals
            .get_or_try_init(|| {
                utils::fetch_mint_decimals(self.connection.as_ref(), &self.retry, token_mint)
            })
            .await?;
        Ok(*decimals)
    }

    pub async fn refresh(&self, accounts: &StakeAccounts) -> Result<BalanceSnapshot> {
        self.refresh_inner(accounts, false).await
    }

    /// Refresh ignoring the debounce window, e.g. right after a confirmation.
    pub async fn force_refresh(&self, accounts: &StakeAccounts) -> Result<BalanceSnapshot> {
        self.refresh_inner(accounts, true).await
    }

    fn slot(&self, owner: &Pubkey) -> Arc<RefreshSlot> {
        match self.slots.lock() {
            Ok(mut slots) => slots.entry(*owner).or_default().clone(),
            // Poisoned: refresh without coalescing.
            Err(_) => Arc::new(RefreshSlot::default()),
        }
    }

    async fn refresh_inner(&self, accounts: &StakeAccounts, force: bool) -> Result<BalanceSnapshot> {
        let owner = accounts.owner;
        let slot = self.slot(&owner);
        let shares_after = if force {
            slot.started.load(Ordering::Acquire)
        } else {
            slot.finished.load(Ordering::Acquire)
        };

        let mut state = slot.state.lock().await;

        if state.generation > shares_after {
            if let Some(outcome) = &state.outcome {
                debug!(%owner, force, ok = outcome.is_ok(), "joined in-flight balance refresh");
                return outcome.clone();
            }
        }

        if !force {
            if let Some(cached) = self.cached(&owner) {
                if cached.fetched_at.elapsed() < self.debounce {
                    debug!(%owner, "balance refresh debounced");
                    return Ok(cached);
                }
            }
        }

        let generation = slot.started.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(%owner, force, generation, "refreshing balances");
        let outcome = self.fetch(accounts).await;

        state.generation = generation;
        state.outcome = Some(outcome.clone());
        slot.finished.store(generation, Ordering::Release);
        if let Ok(snapshot) = &outcome {
            if let Ok(mut latest) = self.latest.lock() {
                latest.insert(owner, snapshot.clone());
            }
        }
        outcome
    }

    async fn fetch(&self, accounts: &StakeAccounts) -> Result<BalanceSnapshot> {
        let decimals = self.decimals(&accounts.token_mint).await?;
        let connection = self.connection.as_ref();
        let token_account = accounts.owner_token_account;

        let (token_balance, user_info) = tokio::try_join!(
            self.retry.run("get_token_balance", || {
                connection.get_token_balance(&token_account)
            }),
            utils::fetch_user_info(connection, &self.retry, &accounts.user_info, &accounts.owner),
        )?;

        // Missing accounts are the normal state of a wallet that never staked.
        let (staked_amount, pending_rewards) = user_info
            .as_ref()
            .map(|info| (info.staked_amount, info.pending_rewards))
            .unwrap_or_default();

        Ok(BalanceSnapshot {
            token: TokenAccountSnapshot {
                address: token_account,
                owner: accounts.owner,
                mint: accounts.token_mint,
                amount: token_balance.unwrap_or(0),
            },
            decimals,
            staked_amount,
            pending_rewards,
            registered: user_info.is_some(),
            fetched_at: Instant::now(),
        })
    }
}
