//! Chargekit library.
//!
//! Stateless building blocks for the Chargekit merchant terminal:
//!
//! - **Request codec** ([`uri`]): encode a payment request into a shareable
//!   link and decode any of the historical link dialects back into fields.
//! - **Reference keys** ([`reference`]): one-time correlation keys used to
//!   locate a payment transaction on the ledger.
//! - **Ledger gateway** ([`gateway`]): the trait contract for the external
//!   RPC collaborator (locate, status, send, validate).
//!
//! The stateful lifecycle engine that drives a request from creation to a
//! terminal state lives in the `chargekit-terminal` crate.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub mod gateway;
pub mod reference;
pub mod uri;

pub use gateway::{Commitment, GatewayError, LedgerGateway, Signature, SignatureStatus};
pub use reference::Reference;

/// A ledger account address (recipient or payer).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address(pub String);

impl Address {
    /// Create a new address from a string.
    pub fn new(addr: impl Into<String>) -> Self {
        Self(addr.into())
    }

    /// Get the address as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Address {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for Address {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a fungible token. Absent means the ledger's native currency.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenId(pub String);

impl TokenId {
    /// Create a new token identifier from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the token identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TokenId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TokenId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for TokenId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TokenId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An immutable description of what is owed.
///
/// The amount is optional: an absent amount means the payer chooses how much
/// to send. If present it must be non-negative. The reference is assigned
/// once by the lifecycle engine and never changes for the life of a request.
///
/// Monetary values use [`rust_decimal::Decimal`] so that the encoded string
/// representation round-trips exactly with no binary-float rounding.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PaymentRequest {
    /// The address payment should be sent to.
    pub recipient: Address,
    /// Amount owed. `None` means the payer picks the amount.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Decimal>,
    /// Token to pay in. `None` means the native currency.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<TokenId>,
    /// One-time correlation key, assigned when the request is committed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<Reference>,
    /// Merchant display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Free-text message shown to the payer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// On-chain note attached to the transaction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
}

impl PaymentRequest {
    /// Create a request with only a recipient; all other fields absent.
    pub fn new(recipient: Address) -> Self {
        Self {
            recipient,
            amount: None,
            token: None,
            reference: None,
            label: None,
            message: None,
            memo: None,
        }
    }

    /// Set the amount.
    pub fn with_amount(mut self, amount: Decimal) -> Self {
        self.amount = Some(amount);
        self
    }

    /// Set the token.
    pub fn with_token(mut self, token: TokenId) -> Self {
        self.token = Some(token);
        self
    }

    /// Set the reference.
    pub fn with_reference(mut self, reference: Reference) -> Self {
        self.reference = Some(reference);
        self
    }

    /// Set the label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Set the memo.
    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = Some(memo.into());
        self
    }
}

/// The partial field set recovered by decoding a link.
///
/// Every field is optional, including the recipient: decoding degrades
/// field-by-field instead of failing the whole link. The split-payout and
/// postback fields only ever appear in legacy obfuscated links and are never
/// written into newly encoded ones.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DecodedRequest {
    /// Recipient address, if present and well-formed.
    pub recipient: Option<Address>,
    /// Amount, if present and parseable as a non-negative decimal.
    pub amount: Option<Decimal>,
    /// Token identifier (`spl-token` field).
    pub token: Option<TokenId>,
    /// Correlation reference.
    pub reference: Option<Reference>,
    /// Merchant display name.
    pub label: Option<String>,
    /// Free-text message.
    pub message: Option<String>,
    /// On-chain memo.
    pub memo: Option<String>,
    /// Secondary payout recipient (legacy links only).
    pub split_recipient: Option<Address>,
    /// Primary payout percentage (legacy links only).
    pub split_percent: Option<Decimal>,
    /// Secondary payout percentage (legacy links only).
    pub split_percent_secondary: Option<Decimal>,
    /// Postback correlation secret (legacy links only).
    pub postback_secret: Option<String>,
}

impl DecodedRequest {
    /// True when no field at all was recovered.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Promote to a full [`PaymentRequest`] if a recipient was recovered.
    ///
    /// The legacy split/postback fields are dropped; they describe payout
    /// routing, not the request itself.
    pub fn into_request(self) -> Option<PaymentRequest> {
        Some(PaymentRequest {
            recipient: self.recipient?,
            amount: self.amount,
            token: self.token,
            reference: self.reference,
            label: self.label,
            message: self.message,
            memo: self.memo,
        })
    }
}
