use crate::basic::client::{ProgramClient, Settlement};
use crate::basic::status::{StatusUpdate, TransactionStatusTracker};
use crate::core::config::RegistrationConfig;
use crate::error::{Result, StakeSdkError};
use crate::types::{StakeAccounts, StakeAction};
use crate::utils;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use stakekit_interface::error::is_already_registered;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// What the client currently believes about an owner's user record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegistrationState {
    #[default]
    Unknown,
    NotRegistered,
    Registering,
    Registered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistrationOutcome {
    pub state: RegistrationState,
    /// Set only when this call confirmed a registration transaction
    pub signature: Option<Signature>,
}

impl RegistrationOutcome {
    fn existing() -> Self {
        Self {
            state: RegistrationState::Registered,
            signature: None,
        }
    }
}

/// Makes sure an owner's user record exists before anything is staked.
pub struct RegistrationCoordinator {
    program: Arc<ProgramClient>,
    settle: RegistrationConfig,
    states: Mutex<HashMap<Pubkey, RegistrationState>>,
}

impl RegistrationCoordinator {
    pub fn new(program: Arc<ProgramClient>, settle: RegistrationConfig) -> Self {
        Self {
            program,
            settle,
            states: Mutex::new(HashMap::new()),
        }
    }

    pub fn state(&self, owner: &Pubkey) -> RegistrationState {
        self.states
            .lock()
            .map(|states| states.get(owner).copied().unwrap_or_default())
            .unwrap_or_default()
    }

    fn set_state(&self, owner: &Pubkey, state: RegistrationState) {
        if let Ok(mut states) = self.states.lock() {
            let previous = states.insert(*owner, state).unwrap_or_default();
            if previous != state {
                debug!(%owner, from = ?previous, to = ?state, "registration state changed");
            }
        }
    }

    /// Feed in what a balance read saw. A record that exists stays registered;
    /// absence only replaces `Unknown`.
    pub fn observe(&self, owner: &Pubkey, record_exists: bool) {
        if let Ok(mut states) = self.states.lock() {
            let state = states.entry(*owner).or_default();
            if record_exists {
                *state = RegistrationState::Registered;
            } else if *state == RegistrationState::Unknown {
                *state = RegistrationState::NotRegistered;
            }
        }
    }

    /// Read the ledger and record whether the user record exists.
    pub async fn check(&self, accounts: &StakeAccounts) -> Result<RegistrationState> {
        let state = if self.lookup(accounts).await? {
            RegistrationState::Registered
        } else {
            RegistrationState::NotRegistered
        };
        self.set_state(&accounts.owner, state);
        Ok(state)
    }

    async fn lookup(&self, accounts: &StakeAccounts) -> Result<bool> {
        let record = utils::fetch_user_info(
            self.program.connection(),
            self.program.retry(),
            &accounts.user_info,
            &accounts.owner,
        )
        .await?;
        Ok(record.is_some())
    }

    /// Register `accounts.owner` unless the record already exists.
    ///
    /// A no-op with zero transactions when the owner is registered. After a
    /// confirmed registration the record is re-read until visible, up to
    /// `settle_attempts` times.
    pub async fn ensure_registered(
        &self,
        accounts: &StakeAccounts,
        referrer: Option<Pubkey>,
        events: Option<broadcast::Sender<StatusUpdate>>,
    ) -> Result<RegistrationOutcome> {
        let owner = accounts.owner;
        if self.state(&owner) == RegistrationState::Registered {
            return Ok(RegistrationOutcome::existing());
        }
        if self.check(accounts).await? == RegistrationState::Registered {
            return Ok(RegistrationOutcome::existing());
        }

        let request = self.program.build_register_transaction(accounts, referrer)?;
        self.set_state(&owner, RegistrationState::Registering);
        info!(%owner, ?referrer, "registering user record");

        let mut tracker = TransactionStatusTracker::new(StakeAction::Register);
        if let Some(events) = events {
            tracker = tracker.with_events(events);
        }

        let signature = match self
            .program
            .send_and_confirm_accepting(request, &tracker, already_registered)
            .await
        {
            Ok(Settlement::Landed(signature)) => Some(signature),
            // Another session registered first.
            Ok(Settlement::Accepted(_)) => {
                debug!(%owner, "record already exists");
                None
            },
            Err(e) => {
                self.set_state(&owner, RegistrationState::NotRegistered);
                return Err(e);
            },
        };

        self.settle(accounts).await?;
        self.set_state(&owner, RegistrationState::Registered);
        info!(%owner, ?signature, "user record registered");

        Ok(RegistrationOutcome {
            state: RegistrationState::Registered,
            signature,
        })
    }

    /// Reads after a confirmed write may lag; re-check a bounded number of times.
    async fn settle(&self, accounts: &StakeAccounts) -> Result<()> {
        let attempts = self.settle.settle_attempts.max(1);
        for attempt in 1..=attempts {
            match self.lookup(accounts).await {
                Ok(true) => return Ok(()),
                Ok(false) => debug!(owner = %accounts.owner, attempt, "record not visible yet"),
                Err(e) => {
                    self.set_state(&accounts.owner, RegistrationState::Unknown);
                    return Err(e);
                },
            }
            if attempt < attempts {
                tokio::time::sleep(self.settle.settle_delay()).await;
            }
        }

        warn!(owner = %accounts.owner, attempts, "registration confirmed but record not visible");
        self.set_state(&accounts.owner, RegistrationState::Unknown);
        Err(StakeSdkError::RegistrationNotVisible(accounts.owner))
    }
}

fn already_registered(error: &StakeSdkError) -> bool {
    matches!(error, StakeSdkError::ProgramError { code, .. } if is_already_registered(*code))
}
