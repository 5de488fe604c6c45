//! Hand-off of confirmed actions to an external transaction log.

use crate::types::StakeLogEntry;
use async_trait::async_trait;
use std::error::Error;
use std::sync::Arc;
use tracing::{info, warn};

pub type SinkError = Box<dyn Error + Send + Sync>;

/// Receives one entry per confirmed stake, unstake or claim.
#[async_trait]
pub trait TransactionLogSink: Send + Sync {
    async fn record(&self, entry: StakeLogEntry) -> Result<(), SinkError>;
}

/// Discards every entry.
pub struct NoopLogSink;

#[async_trait]
impl TransactionLogSink for NoopLogSink {
    async fn record(&self, _entry: StakeLogEntry) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Writes entries to the `tracing` log.
pub struct TracingLogSink;

#[async_trait]
impl TransactionLogSink for TracingLogSink {
    async fn record(&self, entry: StakeLogEntry) -> Result<(), SinkError> {
        info!(
            owner = %entry.owner,
            action = %entry.action,
            amount = entry.amount,
            signature = %entry.signature,
            timestamp = entry.timestamp,
            "staking transaction"
        );
        Ok(())
    }
}

/// Fire and forget. The sink runs on its own task; its failure is logged and
/// never reaches the caller.
pub fn emit(sink: Arc<dyn TransactionLogSink>, entry: StakeLogEntry) {
    tokio::spawn(async move {
        let signature = entry.signature;
        if let Err(e) = sink.record(entry).await {
            warn!(%signature, error = %e, "failed to record transaction log entry");
        }
    });
}
