use crate::core::connection::SolConnection;
use crate::core::retry::RetryScheduler;
use crate::error::{Result, StakeSdkError};
use solana_sdk::pubkey::Pubkey;
use spl_token::solana_program::program_pack::Pack;
use stakekit_interface::{GlobalState, ProgramAddress, SeedLayout, UserInfo};

//=============================================================================
// PDA Derivation Helpers
//=============================================================================

/// Derive the GlobalState PDA
pub fn derive_global_state_pda(program_id: &Pubkey) -> Result<ProgramAddress> {
    Ok(SeedLayout::GlobalState.derive(program_id)?)
}

/// Derive the UserInfo PDA for `owner`
pub fn derive_user_info_pda(program_id: &Pubkey, owner: &Pubkey) -> Result<ProgramAddress> {
    Ok(SeedLayout::UserInfo { owner: *owner }.derive(program_id)?)
}

/// Derive the Vault PDA for `token_mint`
pub fn derive_vault_pda(program_id: &Pubkey, token_mint: &Pubkey) -> Result<ProgramAddress> {
    Ok(SeedLayout::Vault {
        token_mint: *token_mint,
    }
    .derive(program_id)?)
}

/// The owner's associated token account for `token_mint`
pub fn owner_token_account(owner: &Pubkey, token_mint: &Pubkey) -> Pubkey {
    spl_associated_token_account::get_associated_token_address(owner, token_mint)
}

//=============================================================================
// Base-unit Scaling
//=============================================================================

/// Convert a human decimal amount ("1.5") into base units, flooring any
/// digits beyond `decimals`.
///
/// Rejects signs, exponents, empty input, overflow and amounts that floor to
/// zero.
pub fn ui_amount_to_base_units(amount: &str, decimals: u8) -> Result<u64> {
    let invalid = |reason: &str| StakeSdkError::InvalidAmount(format!("{amount:?}: {reason}"));
    let trimmed = amount.trim();

    if trimmed.is_empty() {
        return Err(invalid("empty"));
    }
    if trimmed.starts_with('-') {
        return Err(invalid("must be positive"));
    }

    let (whole, fraction) = match trimmed.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (trimmed, ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid("no digits"));
    }
    if !whole.bytes().all(|b| b.is_ascii_digit()) || !fraction.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(invalid("not a decimal number"));
    }

    let scale = 10u64
        .checked_pow(decimals as u32)
        .ok_or_else(|| invalid("decimals out of range"))?;

    let whole_units = if whole.is_empty() {
        0
    } else {
        whole
            .parse::<u64>()
            .ok()
            .and_then(|w| w.checked_mul(scale))
            .ok_or_else(|| invalid("too large"))?
    };

    // Floor: digits past the mint's precision are dropped, never rounded up.
    let kept = &fraction[..fraction.len().min(decimals as usize)];
    let fraction_units = if kept.is_empty() {
        0
    } else {
        let padding = 10u64.pow((decimals as usize - kept.len()) as u32);
        kept.parse::<u64>().map_err(|_| invalid("bad fraction"))? * padding
    };

    let total = whole_units
        .checked_add(fraction_units)
        .ok_or_else(|| invalid("too large"))?;
    if total == 0 {
        return Err(invalid("must be greater than zero at this token's precision"));
    }
    Ok(total)
}

/// Render base units as an exact decimal string, trimming trailing zeros.
pub fn format_base_units(amount: u64, decimals: u8) -> String {
    if decimals == 0 {
        return amount.to_string();
    }
    let digits = format!("{:0>width$}", amount, width = decimals as usize + 1);
    let (whole, fraction) = digits.split_at(digits.len() - decimals as usize);
    let fraction = fraction.trim_end_matches('0');
    if fraction.is_empty() {
        whole.to_string()
    } else {
        format!("{whole}.{fraction}")
    }
}

//=============================================================================
// Account Fetching & Parsing
//=============================================================================

/// Fetch raw account data, `None` if the account does not exist
pub async fn fetch_account_data(
    connection: &dyn SolConnection,
    retry: &RetryScheduler,
    address: &Pubkey,
) -> Result<Option<Vec<u8>>> {
    let account = retry
        .run("get_account", || connection.get_account(address))
        .await?;
    Ok(account.map(|a| a.data))
}

/// Fetch and decode the user record at `user_info`, checking it belongs to `owner`
pub async fn fetch_user_info(
    connection: &dyn SolConnection,
    retry: &RetryScheduler,
    user_info: &Pubkey,
    owner: &Pubkey,
) -> Result<Option<UserInfo>> {
    match fetch_account_data(connection, retry, user_info).await? {
        Some(data) => Ok(Some(UserInfo::decode_for(&data, owner)?)),
        None => Ok(None),
    }
}

/// Fetch and decode the program's GlobalState
pub async fn fetch_global_state(
    connection: &dyn SolConnection,
    retry: &RetryScheduler,
    global_state: &Pubkey,
) -> Result<GlobalState> {
    let data = fetch_account_data(connection, retry, global_state)
        .await?
        .ok_or(StakeSdkError::AccountNotFound(*global_state))?;
    Ok(GlobalState::decode(&data)?)
}

/// Read `decimals` from an SPL mint account
pub async fn fetch_mint_decimals(
    connection: &dyn SolConnection,
    retry: &RetryScheduler,
    mint: &Pubkey,
) -> Result<u8> {
    let data = fetch_account_data(connection, retry, mint)
        .await?
        .ok_or(StakeSdkError::AccountNotFound(*mint))?;
    parse_mint_decimals(&data)
}

pub fn parse_mint_decimals(data: &[u8]) -> Result<u8> {
    let len = spl_token::state::Mint::LEN;
    if data.len() < len {
        return Err(StakeSdkError::Other(format!(
            "mint account too small ({} bytes)",
            data.len()
        )));
    }
    let mint = spl_token::state::Mint::unpack(&data[..len])
        .map_err(|e| StakeSdkError::Other(format!("invalid mint account: {e}")))?;
    Ok(mint.decimals)
}
