#![allow(dead_code)]

use async_trait::async_trait;
use solana_sdk::account::Account;
use solana_sdk::hash::Hash;
use solana_sdk::instruction::InstructionError;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};
use solana_sdk::transaction::{Transaction, TransactionError};
use spl_token::solana_program::program_option::COption;
use spl_token::solana_program::program_pack::Pack;
use stakekit_interface::{GlobalState, StakingInstruction, StakingProgramError, UserInfo};
use stakekit_sdk::core::connection::{
    ConnectionError, ConnectionResult, LatestBlockhash, SignatureState, SolConnection,
};
use stakekit_sdk::types::StakeLogEntry;
use stakekit_sdk::{
    KeypairSigner, SignerError, StakeAccounts, StakeClientConfig, StakingClient,
    TransactionLogSink, WalletSigner,
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

pub const GET_ACCOUNT: &str = "get_account";
pub const GET_TOKEN_BALANCE: &str = "get_token_balance";
pub const GET_LATEST_BLOCKHASH: &str = "get_latest_blockhash";
pub const SEND_TRANSACTION: &str = "send_transaction";
pub const CONFIRM_TRANSACTION: &str = "confirm_transaction";

/// Blocks between a blockhash being issued and its expiry.
pub const BLOCKHASH_WINDOW: u64 = 150;

/// Something the ledger observed, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEvent {
    Read { address: Pubkey, found: bool },
    Sent { signature: Signature, actions: Vec<&'static str> },
}

/// How `confirm_transaction` answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmMode {
    /// Report the outcome on the first poll
    Immediate,
    /// Never land; the chain advances `blocks_per_poll` per status query
    Never { blocks_per_poll: u64 },
}

struct LedgerState {
    accounts: HashMap<Pubkey, Account>,
    token_balances: HashMap<Pubkey, u64>,
    outcomes: HashMap<Signature, Result<(), TransactionError>>,
    hidden_reads: HashMap<Pubkey, u32>,
    visibility_lag: u32,
    block_height: u64,
    confirm_mode: ConfirmMode,
    journal: Vec<LedgerEvent>,
    sent: Vec<Transaction>,
}

/// In-memory stand-in for an RPC endpoint in front of the staking program.
///
/// Executes register, stake, unstake and claim against its own account map,
/// counts calls per RPC method and can inject failures.
pub struct MockLedger {
    pub program_id: Pubkey,
    pub token_mint: Pubkey,
    pub decimals: u8,
    state: Mutex<LedgerState>,
    calls: Mutex<HashMap<&'static str, usize>>,
    faults: Mutex<HashMap<&'static str, VecDeque<ConnectionError>>>,
    latency: Mutex<Option<Duration>>,
}

impl MockLedger {
    pub fn new(decimals: u8) -> Arc<Self> {
        let program_id = Pubkey::new_unique();
        let token_mint = Pubkey::new_unique();

        let mut accounts = HashMap::new();
        accounts.insert(token_mint, mint_account(decimals));

        let ledger = Self {
            program_id,
            token_mint,
            decimals,
            state: Mutex::new(LedgerState {
                accounts,
                token_balances: HashMap::new(),
                outcomes: HashMap::new(),
                hidden_reads: HashMap::new(),
                visibility_lag: 0,
                block_height: 1_000,
                confirm_mode: ConfirmMode::Immediate,
                journal: Vec::new(),
                sent: Vec::new(),
            }),
            calls: Mutex::new(HashMap::new()),
            faults: Mutex::new(HashMap::new()),
            latency: Mutex::new(None),
        };
        ledger.install_global_state();
        Arc::new(ledger)
    }

    fn install_global_state(&self) {
        let accounts = StakeAccounts::derive(&self.program_id, &self.token_mint, &Pubkey::default())
            .unwrap();
        let global = GlobalState {
            authority: Pubkey::new_unique().to_bytes(),
            token_mint: self.token_mint.to_bytes(),
            vault: accounts.vault.to_bytes(),
            reward_rate_bps: 1_200,
            lock_period_secs: 0,
            total_staked: 0,
            total_users: 0,
            bump: 255,
        };
        let mut state = self.state.lock().unwrap();
        state
            .accounts
            .insert(accounts.global_state, program_account(self.program_id, global.encode().unwrap()));
    }

    pub fn accounts_for(&self, owner: &Pubkey) -> StakeAccounts {
        StakeAccounts::derive(&self.program_id, &self.token_mint, owner).unwrap()
    }

    pub fn config(&self) -> StakeClientConfig {
        StakeClientConfig::new("http://mock.invalid", self.program_id, self.token_mint)
    }

    //=========================================================================
    // Setup
    //=========================================================================

    /// Create the owner's token account holding `amount` base units.
    pub fn fund(&self, owner: &Pubkey, amount: u64) {
        let token_account = self.accounts_for(owner).owner_token_account;
        let mut state = self.state.lock().unwrap();
        state.accounts.insert(token_account, token_account_stub());
        state.token_balances.insert(token_account, amount);
    }

    /// Create a user record directly, as if registered earlier.
    pub fn register(&self, owner: &Pubkey, staked_amount: u64, pending_rewards: u64) {
        let user_info = self.accounts_for(owner).user_info;
        let mut info = UserInfo::new(owner, None, 255);
        info.staked_amount = staked_amount;
        info.pending_rewards = pending_rewards;
        let mut state = self.state.lock().unwrap();
        state
            .accounts
            .insert(user_info, program_account(self.program_id, info.encode().unwrap()));
    }

    pub fn set_staked(&self, owner: &Pubkey, staked_amount: u64) {
        self.update_user(owner, |info| info.staked_amount = staked_amount);
    }

    pub fn set_pending_rewards(&self, owner: &Pubkey, pending_rewards: u64) {
        self.update_user(owner, |info| info.pending_rewards = pending_rewards);
    }

    fn update_user(&self, owner: &Pubkey, f: impl FnOnce(&mut UserInfo)) {
        let user_info = self.accounts_for(owner).user_info;
        let mut state = self.state.lock().unwrap();
        let account = state.accounts.get_mut(&user_info).expect("user not registered");
        let mut info = UserInfo::decode(&account.data).unwrap();
        f(&mut info);
        account.data = info.encode().unwrap();
    }

    /// Queue `error` for the next call to `method`.
    pub fn fail_next(&self, method: &'static str, error: ConnectionError) {
        self.faults
            .lock()
            .unwrap()
            .entry(method)
            .or_default()
            .push_back(error);
    }

    /// The next `reads` reads of `address` report it missing.
    pub fn hide_reads(&self, address: Pubkey, reads: u32) {
        self.state.lock().unwrap().hidden_reads.insert(address, reads);
    }

    /// Freshly registered user records stay invisible for `reads` reads.
    pub fn set_visibility_lag(&self, reads: u32) {
        self.state.lock().unwrap().visibility_lag = reads;
    }

    pub fn set_confirm_mode(&self, mode: ConfirmMode) {
        self.state.lock().unwrap().confirm_mode = mode;
    }

    /// Delay every token balance query.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = Some(latency);
    }

    //=========================================================================
    // Inspection
    //=========================================================================

    pub fn calls(&self, method: &str) -> usize {
        self.calls.lock().unwrap().get(method).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    pub fn token_balance(&self, owner: &Pubkey) -> Option<u64> {
        let token_account = self.accounts_for(owner).owner_token_account;
        self.state.lock().unwrap().token_balances.get(&token_account).copied()
    }

    pub fn user_info(&self, owner: &Pubkey) -> Option<UserInfo> {
        let user_info = self.accounts_for(owner).user_info;
        let state = self.state.lock().unwrap();
        state
            .accounts
            .get(&user_info)
            .map(|account| UserInfo::decode(&account.data).unwrap())
    }

    pub fn journal(&self) -> Vec<LedgerEvent> {
        self.state.lock().unwrap().journal.clone()
    }

    /// Program actions of every transaction sent, in order.
    pub fn sent_actions(&self) -> Vec<Vec<&'static str>> {
        self.journal()
            .into_iter()
            .filter_map(|event| match event {
                LedgerEvent::Sent { actions, .. } => Some(actions),
                _ => None,
            })
            .collect()
    }

    pub fn sent(&self) -> Vec<Transaction> {
        self.state.lock().unwrap().sent.clone()
    }

    //=========================================================================
    // Execution
    //=========================================================================

    fn begin(&self, method: &'static str) -> ConnectionResult<()> {
        *self.calls.lock().unwrap().entry(method).or_default() += 1;
        match self
            .faults
            .lock()
            .unwrap()
            .get_mut(method)
            .and_then(|queue| queue.pop_front())
        {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn execute(&self, state: &mut LedgerState, tx: &Transaction) -> (Vec<&'static str>, Result<(), TransactionError>) {
        let keys = &tx.message.account_keys;
        let mut accounts = state.accounts.clone();
        let mut balances = state.token_balances.clone();
        let mut actions = Vec::new();
        let mut registered = Vec::new();

        for (index, ix) in tx.message.instructions.iter().enumerate() {
            let program = keys[ix.program_id_index as usize];
            let metas: Vec<Pubkey> = ix.accounts.iter().map(|i| keys[*i as usize]).collect();
            let fail = |code: u32| {
                TransactionError::InstructionError(index as u8, InstructionError::Custom(code))
            };

            if program == spl_associated_token_account::id() {
                actions.push("create_token_account");
                let token_account = metas[1];
                accounts.entry(token_account).or_insert_with(token_account_stub);
                balances.entry(token_account).or_insert(0);
                continue;
            }
            if program != self.program_id {
                return (actions, Err(TransactionError::InvalidProgramForExecution));
            }

            let Ok(instruction) = StakingInstruction::unpack(&ix.data) else {
                return (actions, Err(TransactionError::InstructionError(index as u8, InstructionError::InvalidInstructionData)));
            };

            match instruction {
                StakingInstruction::Register { referrer } => {
                    actions.push("register");
                    let (user_info, owner) = (metas[0], metas[1]);
                    if accounts.contains_key(&user_info) {
                        return (actions, Err(fail(StakingProgramError::AlreadyRegistered.code())));
                    }
                    let info = UserInfo::new(&owner, referrer.as_ref(), 255);
                    accounts.insert(user_info, program_account(self.program_id, info.encode().unwrap()));
                    registered.push(user_info);
                },
                StakingInstruction::Stake { amount } => {
                    actions.push("stake");
                    let (user_info, token_account) = (metas[1], metas[3]);
                    let Some(mut info) = read_user(&accounts, &user_info) else {
                        return (actions, Err(fail(StakingProgramError::NotRegistered.code())));
                    };
                    let balance = balances.get(&token_account).copied().unwrap_or(0);
                    if balance < amount {
                        // spl-token InsufficientFunds
                        return (actions, Err(fail(1)));
                    }
                    balances.insert(token_account, balance - amount);
                    info.staked_amount += amount;
                    write_user(&mut accounts, &user_info, &info);
                },
                StakingInstruction::Unstake { amount } => {
                    actions.push("unstake");
                    let (user_info, token_account) = (metas[1], metas[3]);
                    let Some(mut info) = read_user(&accounts, &user_info) else {
                        return (actions, Err(fail(StakingProgramError::NotRegistered.code())));
                    };
                    if info.staked_amount < amount {
                        return (actions, Err(fail(StakingProgramError::InsufficientStake.code())));
                    }
                    if !accounts.contains_key(&token_account) {
                        return (actions, Err(TransactionError::InstructionError(index as u8, InstructionError::UninitializedAccount)));
                    }
                    info.staked_amount -= amount;
                    *balances.entry(token_account).or_insert(0) += amount;
                    write_user(&mut accounts, &user_info, &info);
                },
                StakingInstruction::Claim => {
                    actions.push("claim");
                    let (user_info, token_account) = (metas[1], metas[3]);
                    let Some(mut info) = read_user(&accounts, &user_info) else {
                        return (actions, Err(fail(StakingProgramError::NotRegistered.code())));
                    };
                    if info.pending_rewards == 0 {
                        return (actions, Err(fail(StakingProgramError::NoRewards.code())));
                    }
                    *balances.entry(token_account).or_insert(0) += info.pending_rewards;
                    info.pending_rewards = 0;
                    write_user(&mut accounts, &user_info, &info);
                },
            }
        }

        state.accounts = accounts;
        state.token_balances = balances;
        for user_info in registered {
            if state.visibility_lag > 0 {
                let lag = state.visibility_lag;
                state.hidden_reads.insert(user_info, lag);
            }
        }
        (actions, Ok(()))
    }
}

#[async_trait]
impl SolConnection for MockLedger {
    async fn get_account(&self, pubkey: &Pubkey) -> ConnectionResult<Option<Account>> {
        self.begin(GET_ACCOUNT)?;
        let mut state = self.state.lock().unwrap();
        let hidden = match state.hidden_reads.get_mut(pubkey) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            },
            _ => false,
        };
        let account = if hidden {
            None
        } else {
            state.accounts.get(pubkey).cloned()
        };
        state.journal.push(LedgerEvent::Read {
            address: *pubkey,
            found: account.is_some(),
        });
        Ok(account)
    }

    async fn get_token_balance(&self, token_account: &Pubkey) -> ConnectionResult<Option<u64>> {
        self.begin(GET_TOKEN_BALANCE)?;
        let latency = *self.latency.lock().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        Ok(self.state.lock().unwrap().token_balances.get(token_account).copied())
    }

    async fn get_latest_blockhash(&self) -> ConnectionResult<LatestBlockhash> {
        self.begin(GET_LATEST_BLOCKHASH)?;
        let state = self.state.lock().unwrap();
        Ok(LatestBlockhash {
            blockhash: Hash::new_unique(),
            last_valid_block_height: state.block_height + BLOCKHASH_WINDOW,
        })
    }

    async fn send_transaction(&self, tx: &Transaction) -> ConnectionResult<Signature> {
        self.begin(SEND_TRANSACTION)?;
        if tx.verify().is_err() {
            return Err(ConnectionError::InvalidRequest("signature verification failed".into()));
        }
        let signature = tx.signatures[0];

        let mut state = self.state.lock().unwrap();
        let (actions, outcome) = self.execute(&mut state, tx);
        state.outcomes.insert(signature, outcome);
        state.sent.push(tx.clone());
        state.journal.push(LedgerEvent::Sent { signature, actions });
        Ok(signature)
    }

    async fn confirm_transaction(
        &self,
        signature: &Signature,
        _blockhash: &Hash,
        _last_valid_block_height: u64,
    ) -> ConnectionResult<SignatureState> {
        self.begin(CONFIRM_TRANSACTION)?;
        let mut state = self.state.lock().unwrap();
        match state.confirm_mode {
            ConfirmMode::Never { blocks_per_poll } => {
                state.block_height += blocks_per_poll;
                Ok(SignatureState::Pending {
                    block_height: state.block_height,
                })
            },
            ConfirmMode::Immediate => match state.outcomes.get(signature) {
                Some(Ok(())) => Ok(SignatureState::Confirmed),
                Some(Err(e)) => Ok(SignatureState::Failed(e.clone())),
                None => Ok(SignatureState::Pending {
                    block_height: state.block_height,
                }),
            },
        }
    }
}

fn program_account(owner: Pubkey, data: Vec<u8>) -> Account {
    Account {
        lamports: 1_000_000,
        data,
        owner,
        executable: false,
        rent_epoch: 0,
    }
}

fn token_account_stub() -> Account {
    program_account(spl_token::id(), vec![0u8; spl_token::state::Account::LEN])
}

fn mint_account(decimals: u8) -> Account {
    let mint = spl_token::state::Mint {
        mint_authority: COption::None,
        supply: u64::MAX / 2,
        decimals,
        is_initialized: true,
        freeze_authority: COption::None,
    };
    let mut data = vec![0u8; spl_token::state::Mint::LEN];
    spl_token::state::Mint::pack(mint, &mut data).unwrap();
    program_account(spl_token::id(), data)
}

fn read_user(accounts: &HashMap<Pubkey, Account>, address: &Pubkey) -> Option<UserInfo> {
    accounts
        .get(address)
        .and_then(|account| UserInfo::decode(&account.data).ok())
}

fn write_user(accounts: &mut HashMap<Pubkey, Account>, address: &Pubkey, info: &UserInfo) {
    if let Some(account) = accounts.get_mut(address) {
        account.data = info.encode().unwrap();
    }
}

//=============================================================================
// Signers & sinks
//=============================================================================

/// A wallet whose user declines every request.
pub struct CancellingSigner {
    pub pubkey: Pubkey,
}

#[async_trait]
impl WalletSigner for CancellingSigner {
    fn pubkey(&self) -> Pubkey {
        self.pubkey
    }

    async fn sign_transaction(&self, _tx: Transaction) -> Result<Transaction, SignerError> {
        Err(SignerError::Cancelled)
    }
}

/// Forwards every entry to a channel.
pub struct RecordingLogSink {
    tx: mpsc::UnboundedSender<StakeLogEntry>,
}

impl RecordingLogSink {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<StakeLogEntry>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

#[async_trait]
impl TransactionLogSink for RecordingLogSink {
    async fn record(&self, entry: StakeLogEntry) -> Result<(), stakekit_sdk::basic::history::SinkError> {
        self.tx.send(entry)?;
        Ok(())
    }
}

/// Always fails.
pub struct FailingLogSink;

#[async_trait]
impl TransactionLogSink for FailingLogSink {
    async fn record(&self, _entry: StakeLogEntry) -> Result<(), stakekit_sdk::basic::history::SinkError> {
        Err("log service unavailable".into())
    }
}

//=============================================================================
// Fixtures
//=============================================================================

/// Honors `RUST_LOG`; safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub struct TestContext {
    pub ledger: Arc<MockLedger>,
    pub owner: Pubkey,
    pub client: StakingClient,
}

/// A client for a fresh keypair on a fresh ledger.
pub fn setup(decimals: u8) -> TestContext {
    setup_with(decimals, |_| {})
}

pub fn setup_with(decimals: u8, tweak: impl FnOnce(&mut StakeClientConfig)) -> TestContext {
    init_tracing();
    let ledger = MockLedger::new(decimals);
    let keypair = Keypair::new();
    let owner = keypair.pubkey();
    let mut config = ledger.config();
    tweak(&mut config);

    let client = StakingClient::new(
        ledger.clone(),
        Arc::new(KeypairSigner::new(keypair)),
        config,
    )
    .unwrap();

    TestContext {
        ledger,
        owner,
        client,
    }
}
