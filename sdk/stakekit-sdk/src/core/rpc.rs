//! [`SolConnection`] backed by the nonblocking Solana JSON-RPC client.

use crate::core::connection::{
    ConnectionError, ConnectionResult, LatestBlockhash, SignatureState, SolConnection,
};
use async_trait::async_trait;
use solana_client::client_error::{ClientError, ClientErrorKind};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::RpcSendTransactionConfig;
use solana_client::rpc_request::{RpcError, RpcResponseErrorData};
use solana_sdk::account::Account;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::Transaction;
use tracing::debug;

/// JSON-RPC code used by several providers for throttled requests.
const RPC_RATE_LIMITED: i64 = 429;
/// "Node is unhealthy" / "behind" server errors.
const RPC_NODE_UNHEALTHY: i64 = -32005;

pub struct RpcConnection {
    client: RpcClient,
    commitment: CommitmentConfig,
}

impl RpcConnection {
    pub fn new(rpc_url: impl Into<String>, commitment: CommitmentConfig) -> Self {
        Self {
            client: RpcClient::new_with_commitment(rpc_url.into(), commitment),
            commitment,
        }
    }

    pub fn from_client(client: RpcClient) -> Self {
        let commitment = client.commitment();
        Self { client, commitment }
    }
}

#[async_trait]
impl SolConnection for RpcConnection {
    async fn get_account(&self, pubkey: &Pubkey) -> ConnectionResult<Option<Account>> {
        self.client
            .get_account_with_commitment(pubkey, self.commitment)
            .await
            .map(|response| response.value)
            .map_err(map_client_error)
    }

    async fn get_token_balance(&self, token_account: &Pubkey) -> ConnectionResult<Option<u64>> {
        match self
            .client
            .get_token_account_balance_with_commitment(token_account, self.commitment)
            .await
        {
            Ok(response) => response
                .value
                .amount
                .parse::<u64>()
                .map(Some)
                .map_err(|e| ConnectionError::Other(format!("bad token amount: {e}"))),
            Err(err) if is_missing_account(&err) => Ok(None),
            Err(err) => Err(map_client_error(err)),
        }
    }

    async fn get_latest_blockhash(&self) -> ConnectionResult<LatestBlockhash> {
        let (blockhash, last_valid_block_height) = self
            .client
            .get_latest_blockhash_with_commitment(self.commitment)
            .await
            .map_err(map_client_error)?;
        Ok(LatestBlockhash {
            blockhash,
            last_valid_block_height,
        })
    }

    async fn send_transaction(&self, tx: &Transaction) -> ConnectionResult<Signature> {
        // Program errors are read from the signature status, where the
        // custom error code survives intact.
        let config = RpcSendTransactionConfig {
            skip_preflight: true,
            preflight_commitment: Some(self.commitment.commitment),
            ..RpcSendTransactionConfig::default()
        };
        self.client
            .send_transaction_with_config(tx, config)
            .await
            .map_err(map_client_error)
    }

    async fn confirm_transaction(
        &self,
        signature: &Signature,
        _blockhash: &Hash,
        _last_valid_block_height: u64,
    ) -> ConnectionResult<SignatureState> {
        let status = self
            .client
            .get_signature_status_with_commitment(signature, self.commitment)
            .await
            .map_err(map_client_error)?;

        match status {
            Some(Ok(())) => Ok(SignatureState::Confirmed),
            Some(Err(err)) => Ok(SignatureState::Failed(err)),
            None => {
                let block_height = self
                    .client
                    .get_block_height_with_commitment(self.commitment)
                    .await
                    .map_err(map_client_error)?;
                debug!(%signature, block_height, "signature pending");
                Ok(SignatureState::Pending { block_height })
            },
        }
    }
}

fn is_missing_account(err: &ClientError) -> bool {
    err.to_string().contains("could not find account")
}

/// Map client errors onto the SDK's transient/terminal split.
pub(crate) fn map_client_error(err: ClientError) -> ConnectionError {
    match err.kind() {
        ClientErrorKind::Reqwest(e) if e.status().map(|s| s.as_u16()) == Some(429) => {
            ConnectionError::RateLimited
        },
        ClientErrorKind::Reqwest(e) if e.is_timeout() => ConnectionError::Timeout,
        ClientErrorKind::Reqwest(_) | ClientErrorKind::Io(_) => {
            ConnectionError::Unavailable(err.to_string())
        },
        ClientErrorKind::RpcError(RpcError::RpcResponseError {
            code,
            message,
            data,
            ..
        }) => match (*code, data) {
            (RPC_RATE_LIMITED, _) => ConnectionError::RateLimited,
            (RPC_NODE_UNHEALTHY, _) => ConnectionError::Unavailable(message.clone()),
            (_, RpcResponseErrorData::SendTransactionPreflightFailure(_)) => {
                ConnectionError::Preflight(message.clone())
            },
            _ if message.contains("Blockhash not found") => ConnectionError::BlockhashNotFound,
            _ => ConnectionError::InvalidRequest(message.clone()),
        },
        ClientErrorKind::RpcError(RpcError::ParseError(message)) => {
            ConnectionError::InvalidRequest(message.clone())
        },
        ClientErrorKind::TransactionError(e) => ConnectionError::TransactionRejected(e.clone()),
        _ => ConnectionError::Other(err.to_string()),
    }
}
