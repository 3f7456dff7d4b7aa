//! Ledger gateway contract.
//!
//! The remote ledger RPC endpoint is an external collaborator; this module
//! pins down the only four operations the lifecycle engine consumes from it
//! and the error taxonomy the retry policy is built on.
//!
//! `NotFound` and `IncompleteMetadata` are legitimate steady-state answers
//! from an eventually-consistent ledger index and are retried silently.
//! `Invalid` and `TransactionFailed` are definitive verdicts and terminate
//! the payment attempt.

use crate::{Address, PaymentRequest, Reference};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// The unique identifier of a transaction accepted by the ledger.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature(pub String);

impl Signature {
    /// Create a signature from a string.
    pub fn new(sig: impl Into<String>) -> Self {
        Self(sig.into())
    }

    /// Get the signature as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Signature {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Signature {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for Signature {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Consistency tier requested when querying the ledger.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    /// The transaction was voted on by a supermajority.
    Confirmed,
    /// The transaction is rooted and cannot be rolled back.
    Finalized,
}

/// Confirmation progress reported for a known signature.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureStatus {
    /// Blocks produced after the transaction's inclusion.
    pub confirmations: u64,
    /// True once the ledger marks the transaction finalized, regardless of
    /// the confirmation count.
    pub finalized: bool,
}

/// Errors returned by a [`LedgerGateway`].
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// No matching transaction exists yet. Expected while the buyer has not
    /// paid, or while the RPC node has not indexed the signature.
    #[error("no matching transaction found")]
    NotFound,
    /// The transaction exists but its metadata has not fully propagated.
    #[error("transaction metadata not yet available")]
    IncompleteMetadata,
    /// Network or RPC failure.
    #[error("ledger unreachable: {0}")]
    Unreachable(String),
    /// The wallet or user rejected the send.
    #[error("send declined: {0}")]
    Declined(String),
    /// The transaction executed on chain but errored.
    #[error("transaction failed on chain: {0}")]
    TransactionFailed(String),
    /// Definitive verdict: the transaction's effects do not satisfy the
    /// request. Never retried.
    #[error("transaction does not satisfy the request: {0}")]
    Invalid(String),
}

impl GatewayError {
    /// Whether the operation may succeed on a later attempt.
    ///
    /// `Invalid` and `TransactionFailed` are verdicts about a specific
    /// transaction; retrying cannot change them. Everything else is a
    /// transient condition of the ledger or the network.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Invalid(_) | Self::TransactionFailed(_))
    }

    /// Whether this is an expected steady-state answer while waiting for
    /// ledger consistency, to be retried without logging noise.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::NotFound | Self::IncompleteMetadata)
    }
}

/// Result alias for gateway operations.
pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// The four operations the lifecycle engine consumes from the ledger.
///
/// Implementations wrap a concrete RPC client. The gateway is read-mostly
/// and shared across polling loops behind an `Arc`; implementations must be
/// safe to call concurrently even though the engine only ever keeps one
/// network call in flight per loop.
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Return the earliest transaction signature referencing `reference`,
    /// optionally restricted to signatures after `until`.
    ///
    /// Fails with [`GatewayError::NotFound`] while no such transaction
    /// exists; that is the expected answer until the buyer pays.
    async fn locate_by_reference(
        &self,
        reference: &Reference,
        until: Option<&Signature>,
        commitment: Commitment,
    ) -> GatewayResult<Signature>;

    /// Fetch confirmation progress for a signature.
    ///
    /// Fails with [`GatewayError::NotFound`] while the RPC node has not
    /// indexed the signature, and with [`GatewayError::TransactionFailed`]
    /// if the transaction executed but errored on chain.
    async fn fetch_status(&self, signature: &Signature) -> GatewayResult<SignatureStatus>;

    /// Construct and broadcast a transaction satisfying `request`, paid for
    /// by `from`.
    ///
    /// Fails with [`GatewayError::Declined`] when the wallet rejects the
    /// transaction and [`GatewayError::Unreachable`] on network failure.
    async fn build_and_send(
        &self,
        from: &Address,
        request: &PaymentRequest,
    ) -> GatewayResult<Signature>;

    /// Inspect the transaction's actual transfers and confirm they satisfy
    /// the expected recipient, amount, token, and reference carried by
    /// `expected`.
    ///
    /// Fails with [`GatewayError::NotFound`] or
    /// [`GatewayError::IncompleteMetadata`] while data is still propagating
    /// (retryable), or with [`GatewayError::Invalid`] as a definitive,
    /// non-retryable verdict.
    async fn validate(
        &self,
        signature: &Signature,
        expected: &PaymentRequest,
        commitment: Commitment,
    ) -> GatewayResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(GatewayError::NotFound.is_retryable());
        assert!(GatewayError::IncompleteMetadata.is_retryable());
        assert!(GatewayError::Unreachable("timeout".into()).is_retryable());
        assert!(GatewayError::Declined("user cancelled".into()).is_retryable());
        assert!(!GatewayError::Invalid("wrong recipient".into()).is_retryable());
        assert!(!GatewayError::TransactionFailed("out of funds".into()).is_retryable());
    }

    #[test]
    fn test_pending_classification() {
        assert!(GatewayError::NotFound.is_pending());
        assert!(GatewayError::IncompleteMetadata.is_pending());
        assert!(!GatewayError::Unreachable("down".into()).is_pending());
        assert!(!GatewayError::Invalid("mismatch".into()).is_pending());
    }

    #[test]
    fn test_commitment_serialization() {
        assert_eq!(
            serde_json::to_string(&Commitment::Confirmed).unwrap(),
            "\"confirmed\""
        );
        assert_eq!(
            serde_json::to_string(&Commitment::Finalized).unwrap(),
            "\"finalized\""
        );
    }

    #[test]
    fn test_error_display() {
        let err = GatewayError::Invalid("recipient mismatch".into());
        assert!(err.to_string().contains("recipient mismatch"));
    }
}
