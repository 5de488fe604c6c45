//! Canonical PDA seed table.
//!
//! Every address the SDK computes goes through [`SeedLayout`]. A seed string
//! that drifts from the program's by a single byte yields a valid-looking
//! address that simply holds no account, so the layouts below are pinned and
//! versioned together with the account schemas in [`crate::state`].
//!
//! | Layout        | Seeds                      |
//! |---------------|----------------------------|
//! | `GlobalState` | `["global_state"]`         |
//! | `UserInfo`    | `["user_info", owner]`     |
//! | `Vault`       | `["vault", token_mint]`    |

use crate::error::AddressDerivationError;
use solana_program::pubkey::{Pubkey, MAX_SEEDS, MAX_SEED_LEN};

/// Bumped whenever a seed string or layout changes.
pub const SEED_LAYOUT_VERSION: u8 = 1;

pub const GLOBAL_STATE_SEED: &[u8] = b"global_state";
pub const USER_INFO_SEED: &[u8] = b"user_info";
pub const VAULT_SEED: &[u8] = b"vault";

/// A derived program address together with its bump seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramAddress {
    pub address: Pubkey,
    pub bump: u8,
}

/// The logical accounts the program derives, keyed by their variable inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedLayout {
    GlobalState,
    UserInfo { owner: Pubkey },
    Vault { token_mint: Pubkey },
}

impl SeedLayout {
    /// Seed parts for this layout, in program order.
    pub fn seeds(&self) -> Vec<&[u8]> {
        match self {
            SeedLayout::GlobalState => vec![GLOBAL_STATE_SEED],
            SeedLayout::UserInfo { owner } => vec![USER_INFO_SEED, owner.as_ref()],
            SeedLayout::Vault { token_mint } => vec![VAULT_SEED, token_mint.as_ref()],
        }
    }

    /// Derive this layout's address for `program_id`.
    pub fn derive(&self, program_id: &Pubkey) -> Result<ProgramAddress, AddressDerivationError> {
        derive(program_id, &self.seeds())
    }
}

/// Derive a program address from raw seed parts.
///
/// Pure and deterministic: the only failures are seed-shape violations and the
/// (practically unreachable) case where no bump yields an off-curve point.
pub fn derive(
    program_id: &Pubkey,
    seeds: &[&[u8]],
) -> Result<ProgramAddress, AddressDerivationError> {
    // One slot is reserved for the bump.
    if seeds.len() >= MAX_SEEDS {
        return Err(AddressDerivationError::TooManySeeds(seeds.len()));
    }
    if let Some((index, seed)) = seeds
        .iter()
        .enumerate()
        .find(|(_, seed)| seed.len() > MAX_SEED_LEN)
    {
        return Err(AddressDerivationError::SeedTooLong {
            index,
            len: seed.len(),
        });
    }

    Pubkey::try_find_program_address(seeds, program_id)
        .map(|(address, bump)| ProgramAddress { address, bump })
        .ok_or(AddressDerivationError::NoViableBump(*program_id))
}
