//! Terminal configuration.

use chargekit_lib::{Address, Commitment, TokenId};
use std::time::Duration;

/// Fixed configuration of a terminal instance.
///
/// Everything here is decided by the operator before the first payment and
/// never changes while a lifecycle is running. The polling cadences exist so
/// tests can run the engine at full speed; production uses the defaults.
#[derive(Clone, Debug)]
pub struct TerminalConfig {
    /// Address payments are collected into.
    pub recipient: Address,
    /// Merchant display name embedded in every link.
    pub label: Option<String>,
    /// Token payments are denominated in. `None` means native currency.
    pub token: Option<TokenId>,
    /// Confirmation depth at which a valid payment counts as finalized.
    pub required_confirmations: u64,
    /// Consistency tier used for locate and validate queries.
    pub commitment: Commitment,
    /// Cadence of locate-by-reference polling while `Pending`.
    pub locate_interval: Duration,
    /// Retry delay after a retryable validation failure while `Confirmed`.
    pub validate_retry: Duration,
    /// Cadence of confirmation-depth polling while `Valid`.
    pub status_interval: Duration,
    /// Backoff after a declined or failed send attempt while `Pending`.
    pub send_retry: Duration,
}

impl TerminalConfig {
    /// Configuration with production cadences: 250ms polls, 5s send backoff,
    /// 32 required confirmations, `confirmed` commitment.
    pub fn new(recipient: Address) -> Self {
        Self {
            recipient,
            label: None,
            token: None,
            required_confirmations: 32,
            commitment: Commitment::Confirmed,
            locate_interval: Duration::from_millis(250),
            validate_retry: Duration::from_millis(250),
            status_interval: Duration::from_millis(250),
            send_retry: Duration::from_secs(5),
        }
    }

    /// Set the merchant label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the payment token.
    pub fn with_token(mut self, token: TokenId) -> Self {
        self.token = Some(token);
        self
    }

    /// Set the finality threshold.
    pub fn with_required_confirmations(mut self, required: u64) -> Self {
        self.required_confirmations = required.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TerminalConfig::new("R1".into());
        assert_eq!(config.required_confirmations, 32);
        assert_eq!(config.commitment, Commitment::Confirmed);
        assert_eq!(config.locate_interval, Duration::from_millis(250));
        assert_eq!(config.send_retry, Duration::from_secs(5));
        assert!(config.label.is_none());
        assert!(config.token.is_none());
    }

    #[test]
    fn test_required_confirmations_floor() {
        let config = TerminalConfig::new("R1".into()).with_required_confirmations(0);
        assert_eq!(config.required_confirmations, 1);
    }
}
