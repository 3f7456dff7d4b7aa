//! Chargekit terminal engine.
//!
//! This crate drives a single payment request from creation to a terminal
//! state. A [`PaymentLifecycle`] owns the request state, assigns the
//! correlation reference, and runs the polling loops against a
//! [`chargekit_lib::LedgerGateway`]:
//!
//! ```text
//! New --commit--> Pending --located--> Confirmed --valid--> Valid --depth--> Finalized
//!                                          \--mismatch--> Invalid
//! ```
//!
//! The UI is a read-only subscriber: it registers a callback with
//! [`PaymentLifecycle::on_change`] and renders [`PaymentSnapshot`]s; all
//! writes go through the lifecycle's own methods.

pub mod config;
pub mod lifecycle;
pub mod status;

pub use config::TerminalConfig;
pub use lifecycle::PaymentLifecycle;
pub use status::{PaymentSnapshot, PaymentStatus, SnapshotCallback};

/// Result type for terminal operations.
pub type Result<T> = std::result::Result<T, LifecycleError>;

/// Errors surfaced by lifecycle operations.
///
/// Everything that happens on the ledger side is handled inside the polling
/// loops (retried or translated into the `Invalid` state); these errors only
/// cover misuse of the lifecycle itself.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    /// Commit requires an amount greater than zero.
    #[error("amount must be present and greater than zero")]
    AmountRequired,
    /// Commit was called while a payment is already in progress.
    #[error("a payment is already in progress; reset first")]
    AlreadyCommitted,
}
