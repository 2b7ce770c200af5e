use crate::{CustomerSequenceId, ParseError};
use proptest::prelude::*;

fn id(s: &str) -> CustomerSequenceId {
    CustomerSequenceId::parse(s).unwrap()
}

fn next(s: &str) -> String {
    id(s).next().to_string()
}

#[test]
fn seed_is_canonical_first_id() {
    assert_eq!(CustomerSequenceId::seed().to_string(), "A-000a01");
}

#[test]
fn suffix_increments_within_letter() {
    assert_eq!(next("A-000a01"), "A-000a02");
    assert_eq!(next("A-000a05"), "A-000a06");
    assert_eq!(next("A-000a98"), "A-000a99");
}

#[test]
fn suffix_wraps_into_letter() {
    assert_eq!(next("A-000a99"), "A-000b01");
}

#[test]
fn letter_wraps_into_block() {
    assert_eq!(next("A-000z99"), "A-001a01");
}

#[test]
fn block_wraps_into_prefix() {
    assert_eq!(next("A-999z99"), "B-000a01");
}

#[test]
fn prefix_carries_past_single_letter() {
    assert_eq!(next("Z-999z99"), "AA-000a01");
    assert_eq!(next("AZ-999z99"), "BA-000a01");
    assert_eq!(next("ZZ-999z99"), "AAA-000a01");
}

#[test]
fn suffix_zero_rolls_to_one() {
    // `00` is parseable but never issued; its successor is the first suffix.
    assert_eq!(next("A-000a00"), "A-000a01");
}

#[test]
fn parse_rejects_non_canonical_tokens() {
    assert_eq!(
        CustomerSequenceId::parse("garbage"),
        Err(ParseError::MissingSeparator)
    );
    assert_eq!(
        CustomerSequenceId::parse("a-000a01"),
        Err(ParseError::InvalidPrefix {
            byte: Some(b'a'),
            index: 0
        })
    );
    assert_eq!(
        CustomerSequenceId::parse("-000a01"),
        Err(ParseError::InvalidPrefix {
            byte: None,
            index: 0
        })
    );
    assert_eq!(
        CustomerSequenceId::parse("A-00a01"),
        Err(ParseError::InvalidBodyLen { len: 5 })
    );
    assert_eq!(
        CustomerSequenceId::parse("A-0x0a01"),
        Err(ParseError::InvalidDigit {
            byte: b'x',
            index: 3
        })
    );
    assert_eq!(
        CustomerSequenceId::parse("A-000A01"),
        Err(ParseError::InvalidLetter { byte: b'A' })
    );
    assert!(CustomerSequenceId::parse("A-000a01 ").is_err());
    assert!(CustomerSequenceId::parse("").is_err());
}

#[test]
fn next_after_falls_back_to_seed() {
    let seed = CustomerSequenceId::seed();
    assert_eq!(CustomerSequenceId::next_after(None), seed);
    assert_eq!(CustomerSequenceId::next_after(Some("garbage")), seed);
    assert_eq!(CustomerSequenceId::next_after(Some("a-000a01")), seed);
    assert_eq!(
        CustomerSequenceId::next_after(Some("A-000a05")).to_string(),
        "A-000a06"
    );
}

#[test]
fn ordering_follows_field_precedence() {
    assert!(id("A-000a99") < id("A-000b01"));
    assert!(id("A-000z99") < id("A-001a01"));
    assert!(id("A-999z99") < id("B-000a01"));
    assert!(id("Z-999z99") < id("AA-000a01"));
}

#[test]
fn ordinal_projection_matches_successor() {
    let mut walked = CustomerSequenceId::seed();
    for n in 0..(99 * 26 * 2) {
        assert_eq!(CustomerSequenceId::from_ordinal(n), walked, "ordinal {n}");
        assert_eq!(walked.ordinal(), Some(n));
        walked = walked.next();
    }
}

#[test]
fn ordinal_projection_boundaries() {
    let per_block = 99 * 26;
    let per_prefix = per_block * 1000;
    assert_eq!(CustomerSequenceId::from_ordinal(0).to_string(), "A-000a01");
    assert_eq!(CustomerSequenceId::from_ordinal(98).to_string(), "A-000a99");
    assert_eq!(CustomerSequenceId::from_ordinal(99).to_string(), "A-000b01");
    assert_eq!(
        CustomerSequenceId::from_ordinal(per_block).to_string(),
        "A-001a01"
    );
    assert_eq!(
        CustomerSequenceId::from_ordinal(per_prefix).to_string(),
        "B-000a01"
    );
    assert_eq!(
        CustomerSequenceId::from_ordinal(per_prefix * 26).to_string(),
        "AA-000a01"
    );
}

#[test]
fn ordinal_extremes_do_not_overflow() {
    let last = CustomerSequenceId::from_ordinal(u64::MAX);
    assert_eq!(last.ordinal(), Some(u64::MAX));
    assert_eq!(last.next().ordinal(), None);
}

#[cfg(feature = "serde")]
#[test]
fn serde_uses_canonical_string() {
    let id = id("AB-042k17");
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, "\"AB-042k17\"");
    let back: CustomerSequenceId = serde_json::from_str(&json).unwrap();
    assert_eq!(back, id);
    assert!(serde_json::from_str::<CustomerSequenceId>("\"nope\"").is_err());
}

fn canonical_token() -> impl Strategy<Value = String> {
    ("[A-Z]{1,3}", 0_u16..=999, b'a'..=b'z', 1_u8..=99).prop_map(|(prefix, block, letter, suffix)| {
        format!("{prefix}-{block:03}{}{suffix:02}", letter as char)
    })
}

proptest! {
    #[test]
    fn render_round_trips(token in canonical_token()) {
        let parsed = CustomerSequenceId::parse(&token).unwrap();
        prop_assert_eq!(parsed.to_string(), token.clone());
        prop_assert_eq!(CustomerSequenceId::parse(&parsed.to_string()).unwrap(), parsed);
    }

    #[test]
    fn next_is_strictly_greater(token in canonical_token()) {
        let current = CustomerSequenceId::parse(&token).unwrap();
        let next = current.next();
        prop_assert!(next > current, "{} !> {}", next, current);
    }

    #[test]
    fn from_ordinal_is_monotonic(n in 0_u64..u64::MAX) {
        let a = CustomerSequenceId::from_ordinal(n);
        let b = CustomerSequenceId::from_ordinal(n + 1);
        prop_assert!(a < b);
        prop_assert_eq!(a.next(), b);
    }
}
