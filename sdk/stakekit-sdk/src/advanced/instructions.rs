use crate::error::Result;
use crate::types::StakeAccounts;
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::system_program;
use stakekit_interface::StakingInstruction;

pub fn register(accounts: &StakeAccounts, referrer: Option<Pubkey>) -> Result<Instruction> {
    let instruction = StakingInstruction::Register { referrer };

    let metas = vec![
        AccountMeta::new(accounts.user_info, false),
        AccountMeta::new(accounts.owner, true),
        AccountMeta::new_readonly(accounts.global_state, false),
        AccountMeta::new_readonly(system_program::id(), false),
    ];

    Ok(Instruction {
        program_id: accounts.program_id,
        accounts: metas,
        data: instruction.pack()?,
    })
}

pub fn stake(accounts: &StakeAccounts, amount: u64) -> Result<Instruction> {
    token_movement(accounts, StakingInstruction::Stake { amount })
}

pub fn unstake(accounts: &StakeAccounts, amount: u64) -> Result<Instruction> {
    token_movement(accounts, StakingInstruction::Unstake { amount })
}

pub fn claim(accounts: &StakeAccounts) -> Result<Instruction> {
    token_movement(accounts, StakingInstruction::Claim)
}

/// Stake, unstake and claim share one account list.
fn token_movement(accounts: &StakeAccounts, instruction: StakingInstruction) -> Result<Instruction> {
    let metas = vec![
        AccountMeta::new(accounts.global_state, false),
        AccountMeta::new(accounts.user_info, false),
        AccountMeta::new_readonly(accounts.owner, true),
        AccountMeta::new(accounts.owner_token_account, false),
        AccountMeta::new(accounts.vault, false),
        AccountMeta::new_readonly(accounts.token_mint, false),
        AccountMeta::new_readonly(spl_token::id(), false),
    ];

    Ok(Instruction {
        program_id: accounts.program_id,
        accounts: metas,
        data: instruction.pack()?,
    })
}

/// Create the owner's associated token account if it is missing. A no-op on
/// chain when it already exists.
pub fn create_owner_token_account(accounts: &StakeAccounts) -> Instruction {
    spl_associated_token_account::instruction::create_associated_token_account_idempotent(
        &accounts.owner,
        &accounts.owner,
        &accounts.token_mint,
        &spl_token::id(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use stakekit_interface::InstructionDiscriminator;

    fn accounts() -> StakeAccounts {
        StakeAccounts::derive(
            &Pubkey::new_unique(),
            &Pubkey::new_unique(),
            &Pubkey::new_unique(),
        )
        .unwrap()
    }

    #[test]
    fn test_stake_instruction_accounts() {
        let accounts = accounts();
        let ix = stake(&accounts, 4_000).unwrap();

        assert_eq!(ix.program_id, accounts.program_id);
        assert_eq!(ix.accounts.len(), 7);
        assert_eq!(ix.accounts[1].pubkey, accounts.user_info);
        assert!(ix.accounts[2].is_signer);
        assert_eq!(ix.accounts[2].pubkey, accounts.owner);
        assert_eq!(ix.accounts[4].pubkey, accounts.vault);
        assert!(ix.accounts[4].is_writable);
        assert_eq!(
            StakingInstruction::unpack(&ix.data).unwrap(),
            StakingInstruction::Stake { amount: 4_000 }
        );
    }

    #[test]
    fn test_register_instruction_carries_referrer() {
        let accounts = accounts();
        let referrer = Pubkey::new_unique();
        let ix = register(&accounts, Some(referrer)).unwrap();

        assert_eq!(ix.accounts[0].pubkey, accounts.user_info);
        assert!(ix.accounts[1].is_signer && ix.accounts[1].is_writable);
        assert_eq!(&ix.data[..8], &InstructionDiscriminator::Register.bytes());
        assert_eq!(
            StakingInstruction::unpack(&ix.data).unwrap(),
            StakingInstruction::Register {
                referrer: Some(referrer)
            }
        );
    }

    #[test]
    fn test_create_token_account_targets_owner_ata() {
        let accounts = accounts();
        let ix = create_owner_token_account(&accounts);
        assert_eq!(ix.program_id, spl_associated_token_account::id());
        assert_eq!(ix.accounts[1].pubkey, accounts.owner_token_account);
    }
}
