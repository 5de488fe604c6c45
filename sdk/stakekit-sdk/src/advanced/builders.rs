use crate::core::connection::LatestBlockhash;
use crate::types::StakeAction;
use solana_sdk::instruction::Instruction;
use solana_sdk::message::Message;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::transaction::Transaction;

/// An unsigned transaction waiting for its blockhash.
///
/// The blockhash is attached by [`TransactionRequest::into_transaction`] at
/// the send boundary, so a request can sit between build and send without
/// going stale. Turning it into a transaction consumes it: a submitted
/// request is never reused.
#[derive(Debug, Clone)]
pub struct TransactionRequest {
    action: StakeAction,
    fee_payer: Pubkey,
    instructions: Vec<Instruction>,
}

impl TransactionRequest {
    pub fn builder(action: StakeAction, fee_payer: Pubkey) -> TransactionRequestBuilder {
        TransactionRequestBuilder {
            action,
            fee_payer,
            instructions: Vec::new(),
        }
    }

    pub fn action(&self) -> StakeAction {
        self.action
    }

    pub fn fee_payer(&self) -> &Pubkey {
        &self.fee_payer
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Freeze the request against `blockhash`, ready for signing.
    pub fn into_transaction(self, blockhash: &LatestBlockhash) -> Transaction {
        let message = Message::new_with_blockhash(
            &self.instructions,
            Some(&self.fee_payer),
            &blockhash.blockhash,
        );
        Transaction::new_unsigned(message)
    }
}

/// Ordered instruction list builder.
pub struct TransactionRequestBuilder {
    action: StakeAction,
    fee_payer: Pubkey,
    instructions: Vec<Instruction>,
}

impl TransactionRequestBuilder {
    pub fn add_instruction(mut self, ix: Instruction) -> Self {
        self.instructions.push(ix);
        self
    }

    pub fn add_instruction_if(self, condition: bool, ix: impl FnOnce() -> Instruction) -> Self {
        if condition {
            self.add_instruction(ix())
        } else {
            self
        }
    }

    pub fn build(self) -> TransactionRequest {
        TransactionRequest {
            action: self.action,
            fee_payer: self.fee_payer,
            instructions: self.instructions,
        }
    }
}
