//! StakeKit Program Interface
//!
//! Client-side description of the external staking program. Everything the
//! SDK needs to agree with the program on lives here: PDA seeds, instruction
//! encoding, account layouts and custom error codes.

pub mod error;
pub mod instruction;
pub mod seeds;
pub mod state;

pub use error::{AddressDerivationError, InterfaceError, StakingProgramError};
pub use instruction::{InstructionDiscriminator, StakingInstruction};
pub use seeds::{derive, ProgramAddress, SeedLayout, SEED_LAYOUT_VERSION};
pub use state::{AccountDiscriminator, GlobalState, UserInfo};

/// Compute an Anchor-style 8-byte discriminator: `sha256("<namespace>:<name>")[..8]`.
pub(crate) fn discriminator(namespace: &str, name: &str) -> [u8; 8] {
    let preimage = format!("{namespace}:{name}");
    let hash = solana_program::hash::hash(preimage.as_bytes());
    let mut out = [0u8; 8];
    out.copy_from_slice(&hash.to_bytes()[..8]);
    out
}
