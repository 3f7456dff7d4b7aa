//! Property-based tests for chargekit-lib
//!
//! These tests use proptest to verify codec invariants across a wide range
//! of inputs, plus the reference uniqueness requirement.

mod codec_properties {
    use chargekit_lib::uri::{decode_location, encode_legacy_url, encode_url};
    use chargekit_lib::{PaymentRequest, Reference, TokenId};
    use proptest::option;
    use proptest::prelude::*;
    use rust_decimal::Decimal;

    fn arb_request() -> impl Strategy<Value = PaymentRequest> {
        (
            "[A-Za-z0-9]{1,44}",
            option::of(0u64..10_000_000_000u64),
            option::of("[A-Za-z0-9]{1,44}"),
            option::of("[a-f0-9]{64}"),
            option::of(".{0,40}"),
            option::of(".{0,40}"),
            option::of(".{0,40}"),
        )
            .prop_map(
                |(recipient, cents, token, reference, label, message, memo)| PaymentRequest {
                    recipient: recipient.into(),
                    // two-decimal monetary amounts, e.g. 1250 -> 12.50
                    amount: cents.map(|c| Decimal::new(c as i64, 2)),
                    token: token.map(TokenId::new),
                    reference: reference.map(Reference::new),
                    label: label.filter(|s| !s.is_empty()),
                    message: message.filter(|s| !s.is_empty()),
                    memo: memo.filter(|s| !s.is_empty()),
                },
            )
    }

    proptest! {
        /// decode(encode(request)) recovers every field, plain dialect.
        #[test]
        fn plain_dialect_round_trips(request in arb_request()) {
            let decoded = decode_location("", &encode_url(&request));
            prop_assert_eq!(decoded.recipient.as_ref(), Some(&request.recipient));
            prop_assert_eq!(decoded.amount, request.amount);
            prop_assert_eq!(decoded.token, request.token);
            prop_assert_eq!(decoded.reference, request.reference);
            prop_assert_eq!(decoded.label, request.label);
            prop_assert_eq!(decoded.message, request.message);
            prop_assert_eq!(decoded.memo, request.memo);
        }

        /// decode(encode(request)) recovers every field, legacy token dialect.
        #[test]
        fn legacy_dialect_round_trips(request in arb_request()) {
            let decoded = decode_location("", &encode_legacy_url(&request));
            prop_assert_eq!(decoded.recipient.as_ref(), Some(&request.recipient));
            prop_assert_eq!(decoded.amount, request.amount);
            prop_assert_eq!(decoded.label, request.label);
            prop_assert_eq!(decoded.message, request.message);
            prop_assert_eq!(decoded.memo, request.memo);
        }

        /// The legacy token also round-trips when carried as a path suffix.
        #[test]
        fn path_dialect_round_trips(request in arb_request()) {
            let url = encode_legacy_url(&request);
            let token = url.strip_prefix('?').unwrap();
            let decoded = decode_location(&format!("/charges/{token}"), "");
            prop_assert_eq!(decoded.recipient.as_ref(), Some(&request.recipient));
            prop_assert_eq!(decoded.amount, request.amount);
        }

        /// The exact decimal representation of the amount survives encoding.
        #[test]
        fn amount_scale_is_preserved(cents in 0u64..10_000_000_000u64) {
            let amount = Decimal::new(cents as i64, 2);
            let request = PaymentRequest::new("R1".into()).with_amount(amount);
            let decoded = decode_location("", &encode_url(&request));
            prop_assert_eq!(decoded.amount.unwrap().to_string(), amount.to_string());
        }

        /// Decoding arbitrary garbage never panics and never invents a
        /// recipient out of nothing.
        #[test]
        fn decode_never_panics(path in ".{0,80}", query in ".{0,80}") {
            let _ = decode_location(&path, &query);
        }
    }
}

mod reference_properties {
    use chargekit_lib::Reference;
    use std::collections::HashSet;

    /// Generating many references yields all-distinct values.
    #[test]
    fn references_are_unique() {
        let mut seen = HashSet::new();
        for _ in 0..10_000 {
            assert!(seen.insert(Reference::generate()), "reference collision");
        }
    }
}
