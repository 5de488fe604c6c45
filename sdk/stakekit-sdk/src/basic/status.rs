//! Per-transaction status tracking for program operations and UI observers.

use crate::types::StakeAction;
use solana_sdk::signature::Signature;
use std::fmt;
use tokio::sync::{broadcast, watch};
use tracing::warn;

/// Why a transaction ended in `Failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The wallet declined to sign
    Cancelled,
    /// The blockhash expired before confirmation
    Expired,
    /// Polling budget ran out; the outcome is unknown
    TimedOut,
    /// Program custom error code
    Program(u32),
    /// Any other on-chain or RPC rejection
    Rejected(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Cancelled => write!(f, "cancelled"),
            FailureReason::Expired => write!(f, "expired"),
            FailureReason::TimedOut => write!(f, "timed out"),
            FailureReason::Program(code) => write!(f, "program error {code}"),
            FailureReason::Rejected(reason) => write!(f, "{reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionStatus {
    Building,
    AwaitingSignature,
    Submitted(Signature),
    Confirmed(Signature),
    Failed(FailureReason),
}

impl TransactionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Confirmed(_) | TransactionStatus::Failed(_)
        )
    }

    pub fn signature(&self) -> Option<&Signature> {
        match self {
            TransactionStatus::Submitted(sig) | TransactionStatus::Confirmed(sig) => Some(sig),
            _ => None,
        }
    }

    fn can_advance_to(&self, next: &TransactionStatus) -> bool {
        use TransactionStatus::*;
        match (self, next) {
            (_, Failed(_)) => !self.is_terminal(),
            (Building, AwaitingSignature) => true,
            (AwaitingSignature, Submitted(_)) => true,
            (Submitted(a), Confirmed(b)) => a == b,
            _ => false,
        }
    }
}

/// A status change broadcast to every observer of a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub action: StakeAction,
    pub status: TransactionStatus,
}

/// Lifecycle of one transaction:
/// `Building -> AwaitingSignature -> Submitted -> Confirmed`, with `Failed`
/// reachable from any non-terminal state. Terminal states are final; a
/// tracker is created per transaction and dropped afterwards.
pub struct TransactionStatusTracker {
    action: StakeAction,
    status: watch::Sender<TransactionStatus>,
    events: Option<broadcast::Sender<StatusUpdate>>,
}

impl TransactionStatusTracker {
    pub fn new(action: StakeAction) -> Self {
        let (status, _) = watch::channel(TransactionStatus::Building);
        Self {
            action,
            status,
            events: None,
        }
    }

    /// Also publish every transition to `events`.
    pub fn with_events(mut self, events: broadcast::Sender<StatusUpdate>) -> Self {
        let _ = events.send(StatusUpdate {
            action: self.action,
            status: TransactionStatus::Building,
        });
        self.events = Some(events);
        self
    }

    pub fn action(&self) -> StakeAction {
        self.action
    }

    pub fn current(&self) -> TransactionStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<TransactionStatus> {
        self.status.subscribe()
    }

    /// Move to `next`. Illegal transitions are logged and ignored.
    pub fn advance(&self, next: TransactionStatus) -> bool {
        let current = self.current();
        if !current.can_advance_to(&next) {
            warn!(
                action = %self.action,
                from = ?current,
                to = ?next,
                "ignoring illegal status transition"
            );
            return false;
        }

        self.status.send_replace(next.clone());
        if let Some(events) = &self.events {
            // No subscribers is fine.
            let _ = events.send(StatusUpdate {
                action: self.action,
                status: next,
            });
        }
        true
    }

    pub fn fail(&self, reason: FailureReason) -> bool {
        self.advance(TransactionStatus::Failed(reason))
    }
}
