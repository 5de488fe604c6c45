//! StakeKit Instruction Definitions
//!
//! Anchor wire format: `[discriminator (8 bytes)][borsh args]`, where the
//! discriminator is `sha256("global:<instruction name>")[..8]`.

use crate::error::InterfaceError;
use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::pubkey::Pubkey;

/// Instruction discriminators of the staking program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstructionDiscriminator {
    Register,
    Stake,
    Unstake,
    Claim,
}

impl InstructionDiscriminator {
    pub const ALL: [InstructionDiscriminator; 4] = [
        InstructionDiscriminator::Register,
        InstructionDiscriminator::Stake,
        InstructionDiscriminator::Unstake,
        InstructionDiscriminator::Claim,
    ];

    pub fn name(self) -> &'static str {
        match self {
            InstructionDiscriminator::Register => "register",
            InstructionDiscriminator::Stake => "stake",
            InstructionDiscriminator::Unstake => "unstake",
            InstructionDiscriminator::Claim => "claim",
        }
    }

    pub fn bytes(self) -> [u8; 8] {
        crate::discriminator("global", self.name())
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.bytes() == bytes)
    }
}

#[derive(BorshSerialize, BorshDeserialize)]
struct RegisterArgs {
    referrer: Option<[u8; 32]>,
}

#[derive(BorshSerialize, BorshDeserialize)]
struct AmountArgs {
    amount: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StakingInstruction {
    /// Create the caller's user record.
    ///
    /// Accounts:
    /// 0. `[writable]` UserInfo PDA (["user_info", owner])
    /// 1. `[writable, signer]` Owner (pays for the record)
    /// 2. `[]` GlobalState PDA (["global_state"])
    /// 3. `[]` System program
    Register {
        /// Optional referrer wallet
        referrer: Option<Pubkey>,
    },

    /// Move `amount` base units from the owner's token account into the vault.
    ///
    /// Accounts:
    /// 0. `[writable]` GlobalState PDA
    /// 1. `[writable]` UserInfo PDA
    /// 2. `[signer]` Owner
    /// 3. `[writable]` Owner token account
    /// 4. `[writable]` Vault PDA (["vault", mint])
    /// 5. `[]` Token mint
    /// 6. `[]` Token program
    Stake { amount: u64 },

    /// Return `amount` base units from the vault. Same accounts as `Stake`.
    Unstake { amount: u64 },

    /// Pay out pending rewards. Same accounts as `Stake`.
    Claim,
}

impl StakingInstruction {
    pub fn discriminator(&self) -> InstructionDiscriminator {
        match self {
            StakingInstruction::Register { .. } => InstructionDiscriminator::Register,
            StakingInstruction::Stake { .. } => InstructionDiscriminator::Stake,
            StakingInstruction::Unstake { .. } => InstructionDiscriminator::Unstake,
            StakingInstruction::Claim => InstructionDiscriminator::Claim,
        }
    }

    /// Encode into instruction data.
    pub fn pack(&self) -> Result<Vec<u8>, InterfaceError> {
        let mut data = self.discriminator().bytes().to_vec();
        match self {
            StakingInstruction::Register { referrer } => borsh::to_writer(
                &mut data,
                &RegisterArgs {
                    referrer: referrer.map(|r| r.to_bytes()),
                },
            ),
            StakingInstruction::Stake { amount } | StakingInstruction::Unstake { amount } => {
                borsh::to_writer(&mut data, &AmountArgs { amount: *amount })
            },
            StakingInstruction::Claim => Ok(()),
        }
        .map_err(|e| InterfaceError::Encode {
            what: "instruction",
            reason: e.to_string(),
        })?;
        Ok(data)
    }

    /// Decode instruction data produced by [`StakingInstruction::pack`].
    pub fn unpack(input: &[u8]) -> Result<Self, InterfaceError> {
        if input.len() < 8 {
            return Err(InterfaceError::InstructionTooShort { len: input.len() });
        }
        let (head, mut rest) = input.split_at(8);
        let discriminator =
            InstructionDiscriminator::from_bytes(head).ok_or(InterfaceError::UnknownInstruction)?;
        let malformed = |e: std::io::Error| InterfaceError::MalformedInstruction(e.to_string());

        Ok(match discriminator {
            InstructionDiscriminator::Register => {
                let args = RegisterArgs::deserialize(&mut rest).map_err(malformed)?;
                StakingInstruction::Register {
                    referrer: args.referrer.map(Pubkey::new_from_array),
                }
            },
            InstructionDiscriminator::Stake => StakingInstruction::Stake {
                amount: AmountArgs::deserialize(&mut rest).map_err(malformed)?.amount,
            },
            InstructionDiscriminator::Unstake => StakingInstruction::Unstake {
                amount: AmountArgs::deserialize(&mut rest).map_err(malformed)?.amount,
            },
            InstructionDiscriminator::Claim => StakingInstruction::Claim,
        })
    }
}
