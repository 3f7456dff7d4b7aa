//! Payment link codec.
//!
//! This module encodes a [`PaymentRequest`] into a shareable link and decodes
//! any of the historical link dialects back into request fields:
//!
//! 1. **Named token**: the opaque token carried as an `id=<token>` query
//!    parameter.
//! 2. **Path token**: the opaque token appearing after the fixed `/charges/`
//!    marker segment.
//! 3. **Bare token**: the opaque token as the entire query string.
//! 4. **Plain query**: named fields (`recipient`, `amount`, ...).
//!
//! The opaque token is the full plain query string passed through base64.
//! Dialects are detected by structural inspection in exactly the order
//! above; [`decode_location`] is the only place that decision is made.
//!
//! Decoding is deterministic and never fails: a malformed token degrades to
//! "no fields recovered" and a field that does not parse degrades to absent,
//! in both cases leaving a diagnostic in the log.

use crate::{Address, DecodedRequest, PaymentRequest, Reference, TokenId};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rust_decimal::Decimal;
use std::str::FromStr;
use tracing::warn;

/// Fixed marker segment introducing a path-carried token.
pub const CHARGES_MARKER: &str = "/charges/";

const FIELD_RECIPIENT: &str = "recipient";
const FIELD_AMOUNT: &str = "amount";
const FIELD_TOKEN: &str = "spl-token";
const FIELD_REFERENCE: &str = "reference";
const FIELD_LABEL: &str = "label";
const FIELD_MESSAGE: &str = "message";
const FIELD_MEMO: &str = "memo";
const FIELD_ID: &str = "id";
// Legacy split-payout fields; decoded for compatibility, never encoded.
const FIELD_SPLIT_RECIPIENT: &str = "recipient1";
const FIELD_SPLIT_PERCENT: &str = "percent";
const FIELD_SPLIT_PERCENT_SECONDARY: &str = "percent1";
const FIELD_POSTBACK_SECRET: &str = "secret";

const KNOWN_FIELDS: [&str; 12] = [
    FIELD_RECIPIENT,
    FIELD_AMOUNT,
    FIELD_TOKEN,
    FIELD_REFERENCE,
    FIELD_LABEL,
    FIELD_MESSAGE,
    FIELD_MEMO,
    FIELD_ID,
    FIELD_SPLIT_RECIPIENT,
    FIELD_SPLIT_PERCENT,
    FIELD_SPLIT_PERCENT_SECONDARY,
    FIELD_POSTBACK_SECRET,
];

/// Encode a request as a plain named query string, `?` included.
///
/// One entry per present field; absent fields are omitted entirely rather
/// than written as empty values. The amount is rendered through `Decimal`'s
/// display, which preserves the request's exact decimal representation
/// (`12.50` stays `12.50`).
pub fn encode_url(request: &PaymentRequest) -> String {
    format!("?{}", encode_query(request))
}

/// Encode a request in the legacy obfuscated form: the plain query string
/// passed through base64 and carried as the entire query string.
pub fn encode_legacy_url(request: &PaymentRequest) -> String {
    format!("?{}", BASE64.encode(encode_query(request)))
}

fn encode_query(request: &PaymentRequest) -> String {
    let mut pairs: Vec<(&str, String)> = Vec::with_capacity(7);
    pairs.push((FIELD_RECIPIENT, percent_encode(request.recipient.as_str())));
    if let Some(amount) = &request.amount {
        pairs.push((FIELD_AMOUNT, percent_encode(&amount.to_string())));
    }
    if let Some(token) = &request.token {
        pairs.push((FIELD_TOKEN, percent_encode(token.as_str())));
    }
    if let Some(reference) = &request.reference {
        pairs.push((FIELD_REFERENCE, percent_encode(reference.as_str())));
    }
    if let Some(label) = &request.label {
        pairs.push((FIELD_LABEL, percent_encode(label)));
    }
    if let Some(message) = &request.message {
        pairs.push((FIELD_MESSAGE, percent_encode(message)));
    }
    if let Some(memo) = &request.memo {
        pairs.push((FIELD_MEMO, percent_encode(memo)));
    }
    pairs
        .into_iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Decode the addressable location of a payment link.
///
/// `path` and `query` are the scheme-independent parts of the location; a
/// leading `?` on the query is tolerated. Dialect precedence:
///
/// 1. an `id=<token>` parameter anywhere in the query,
/// 2. a token following the [`CHARGES_MARKER`] segment in the path (or, for
///    tolerance with historical links, in the query),
/// 3. a query consisting of exactly one unnamed token,
/// 4. named fields parsed directly.
pub fn decode_location(path: &str, query: &str) -> DecodedRequest {
    let query = query.strip_prefix('?').unwrap_or(query);
    let segments: Vec<&str> = query.split('&').filter(|s| !s.is_empty()).collect();

    if let Some(token) = segments
        .iter()
        .find_map(|s| s.strip_prefix(FIELD_ID).and_then(|r| r.strip_prefix('=')))
    {
        return decode_opaque_token(token);
    }

    if let Some(token) = marker_token(path).or_else(|| marker_token(query)) {
        return decode_opaque_token(token);
    }

    if let Some(token) = single_opaque_token(&segments) {
        return decode_opaque_token(token);
    }

    parse_fields(&segments)
}

/// Extract the token following the `/charges/` marker, if present.
///
/// Everything after the marker is the token: `/` is base64 alphabet, so the
/// token cannot be cut at further slashes.
fn marker_token(location: &str) -> Option<&str> {
    let (_, rest) = location.split_once(CHARGES_MARKER)?;
    (!rest.is_empty()).then_some(rest)
}

/// A query is a bare opaque token when it holds exactly one segment that has
/// no `key=value` structure (trailing `=` is base64 padding, not a field
/// separator) and is not itself a known field name.
fn single_opaque_token<'a>(segments: &[&'a str]) -> Option<&'a str> {
    let [segment] = segments else { return None };
    let base = segment.trim_end_matches('=');
    if base.is_empty() || base.contains('=') || KNOWN_FIELDS.contains(&base) {
        return None;
    }
    Some(segment)
}

/// Reverse the base64 transform and parse the recovered inner query string.
///
/// A malformed token degrades to an empty field set; the whole point of the
/// codec is that a bad link never takes the terminal down.
fn decode_opaque_token(token: &str) -> DecodedRequest {
    // Tokens may arrive percent-escaped; `+` stays significant in base64.
    let unescaped = percent_decode_lossy(token, false);
    let bytes = match BASE64.decode(unescaped.as_bytes()) {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(%err, "malformed opaque token in payment link");
            return DecodedRequest::default();
        }
    };
    match String::from_utf8(bytes) {
        Ok(inner) => {
            let segments: Vec<&str> = inner.split('&').filter(|s| !s.is_empty()).collect();
            parse_fields(&segments)
        }
        Err(err) => {
            warn!(%err, "opaque token did not decode to text");
            DecodedRequest::default()
        }
    }
}

fn parse_fields(segments: &[&str]) -> DecodedRequest {
    let mut decoded = DecodedRequest::default();
    for segment in segments {
        let Some((key, value)) = segment.split_once('=') else {
            continue;
        };
        let value = percent_decode_lossy(value, true);
        match key {
            FIELD_RECIPIENT => decoded.recipient = non_empty(value).map(Address::from),
            FIELD_AMOUNT => decoded.amount = parse_amount(&value),
            FIELD_TOKEN => decoded.token = non_empty(value).map(TokenId::from),
            FIELD_REFERENCE => decoded.reference = non_empty(value).map(Reference::from),
            FIELD_LABEL => decoded.label = non_empty(value),
            FIELD_MESSAGE => decoded.message = non_empty(value),
            FIELD_MEMO => decoded.memo = non_empty(value),
            FIELD_SPLIT_RECIPIENT => {
                decoded.split_recipient = non_empty(value).map(Address::from)
            }
            FIELD_SPLIT_PERCENT => decoded.split_percent = parse_decimal(key, &value),
            FIELD_SPLIT_PERCENT_SECONDARY => {
                decoded.split_percent_secondary = parse_decimal(key, &value)
            }
            FIELD_POSTBACK_SECRET => decoded.postback_secret = non_empty(value),
            _ => {}
        }
    }
    decoded
}

/// A monetary amount: must parse and must be non-negative, otherwise the
/// field degrades to absent.
fn parse_amount(value: &str) -> Option<Decimal> {
    let amount = parse_decimal(FIELD_AMOUNT, value)?;
    if amount.is_sign_negative() {
        warn!(%value, "negative amount in payment link ignored");
        return None;
    }
    Some(amount)
}

fn parse_decimal(field: &str, value: &str) -> Option<Decimal> {
    if value.is_empty() {
        return None;
    }
    match Decimal::from_str(value) {
        Ok(parsed) => Some(parsed),
        Err(err) => {
            warn!(field, %value, %err, "unparsable decimal field in payment link");
            None
        }
    }
}

fn non_empty(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}

/// Percent-encode a value so it is opaque-safe inside a query string.
fn percent_encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char)
            }
            _ => {
                out.push('%');
                out.push_str(&format!("{byte:02X}"));
            }
        }
    }
    out
}

/// Best-effort percent decoding: a malformed escape passes through verbatim
/// instead of aborting, and invalid UTF-8 is replaced rather than rejected.
///
/// `plus_as_space` applies query-field semantics (`+` means space); it is
/// off when unescaping opaque tokens, where `+` is base64 alphabet.
fn percent_decode_lossy(value: &str, plus_as_space: bool) -> String {
    fn hex_val(byte: u8) -> Option<u8> {
        (byte as char).to_digit(16).map(|d| d as u8)
    }

    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let hi = bytes.get(i + 1).copied().and_then(hex_val);
                let lo = bytes.get(i + 2).copied().and_then(hex_val);
                match (hi, lo) {
                    (Some(hi), Some(lo)) => {
                        out.push(hi << 4 | lo);
                        i += 3;
                    }
                    _ => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            b'+' if plus_as_space => {
                out.push(b' ');
                i += 1;
            }
            byte => {
                out.push(byte);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}
