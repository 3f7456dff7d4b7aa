//! Payment status states and the operator-facing read model.

use chargekit_lib::{Reference, Signature};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Lifecycle states of a payment request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    /// Request rendered, no reference assigned yet.
    New,
    /// Reference assigned; waiting for a matching transaction to appear.
    Pending,
    /// A signature referencing the request was located on the ledger.
    Confirmed,
    /// The transaction's transfers satisfy the request.
    Valid,
    /// The transaction definitively does not satisfy the request, or failed
    /// on chain.
    Invalid,
    /// Confirmation depth reached the configured threshold or the ledger
    /// marked the transaction finalized.
    Finalized,
}

impl PaymentStatus {
    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finalized | Self::Invalid)
    }

    /// Check if the payment is still in progress.
    pub fn is_in_progress(&self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed | Self::Valid)
    }

    /// Check if the payment completed successfully.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Finalized)
    }
}

/// Point-in-time view of the lifecycle, safe to hand to a UI.
///
/// Snapshots are produced by the lifecycle's single writer; subscribers only
/// ever read them.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PaymentSnapshot {
    /// Current state.
    pub status: PaymentStatus,
    /// Assigned reference, present from `Pending` onward.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<Reference>,
    /// Observed signature, present from `Confirmed` onward.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<Signature>,
    /// Confirmation depth, meaningful from `Valid` onward.
    pub confirmations: u64,
    /// `confirmations / required_confirmations`, clamped to `0.0..=1.0`.
    pub progress: f64,
    /// Current shareable encoding of the request.
    pub url: String,
    /// Diagnostic reason when the status is `Invalid`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invalid_reason: Option<String>,
}

/// Callback invoked on every observable change.
pub type SnapshotCallback = Arc<dyn Fn(&PaymentSnapshot) + Send + Sync>;
