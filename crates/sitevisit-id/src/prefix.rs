use crate::error::ParseError;
use core::{cmp::Ordering, fmt};

const RADIX: u64 = 26;

/// The leading `A`, `B`, ..., `Z`, `AA`, `AB`, ... segment of an ID.
///
/// The letters form a bijective base-26 numeral: there is no zero digit, so
/// `Z` is followed by `AA` rather than `BA`. Ordering follows the numeral's
/// value, which means shorter prefixes always sort before longer ones.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Prefix(String);

impl Prefix {
    /// The first prefix, `A`.
    pub fn first() -> Self {
        Self(String::from("A"))
    }

    /// Validates `s` as a prefix. `offset` is added to reported byte indexes
    /// so errors point into the whole token rather than the prefix alone.
    pub(crate) fn parse(s: &str, offset: usize) -> Result<Self, ParseError> {
        if s.is_empty() {
            return Err(ParseError::InvalidPrefix {
                byte: None,
                index: offset,
            });
        }
        if let Some((i, b)) = s.bytes().enumerate().find(|(_, b)| !b.is_ascii_uppercase()) {
            return Err(ParseError::InvalidPrefix {
                byte: Some(b),
                index: offset + i,
            });
        }
        Ok(Self(String::from(s)))
    }

    /// Returns the prefix letters.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Advances to the next prefix in place.
    ///
    /// Scans from the last letter backwards: every `Z` passed becomes `A`, the
    /// first letter below `Z` is bumped by one and the scan stops. If every
    /// letter was `Z`, a new leading `A` is prepended.
    pub fn increment(&mut self) {
        let mut letters = core::mem::take(&mut self.0).into_bytes();
        let mut carry = true;
        for b in letters.iter_mut().rev() {
            if *b < b'Z' {
                *b += 1;
                carry = false;
                break;
            }
            *b = b'A';
        }
        if carry {
            letters.insert(0, b'A');
        }
        // Still A..=Z only.
        self.0 = letters.into_iter().map(char::from).collect();
    }

    /// Zero-based position of this prefix in the sequence `A`, `B`, ... `Z`,
    /// `AA`, ..., or `None` if it does not fit in a `u64`.
    pub fn ordinal(&self) -> Option<u64> {
        let mut value = 0_u64;
        for b in self.0.bytes() {
            value = value
                .checked_mul(RADIX)?
                .checked_add(u64::from(b - b'A') + 1)?;
        }
        Some(value - 1)
    }

    /// Inverse of [`Prefix::ordinal`].
    pub fn from_ordinal(ordinal: u64) -> Self {
        let mut buf = Vec::with_capacity(4);
        // Work in u128 so `u64::MAX + 1` does not overflow.
        let mut k = u128::from(ordinal) + 1;
        while k > 0 {
            k -= 1;
            buf.push(b'A' + (k % u128::from(RADIX)) as u8);
            k /= u128::from(RADIX);
        }
        buf.reverse();
        // All bytes are in A..=Z.
        Self(buf.into_iter().map(char::from).collect())
    }
}

impl Ord for Prefix {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .len()
            .cmp(&other.0.len())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for Prefix {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefix(s: &str) -> Prefix {
        Prefix::parse(s, 0).unwrap()
    }

    fn incremented(s: &str) -> String {
        let mut p = prefix(s);
        p.increment();
        p.as_str().to_owned()
    }

    #[test]
    fn increment_bumps_last_letter() {
        assert_eq!(incremented("A"), "B");
        assert_eq!(incremented("AB"), "AC");
    }

    #[test]
    fn increment_carries_through_z() {
        assert_eq!(incremented("AZ"), "BA");
        assert_eq!(incremented("AZZ"), "BAA");
    }

    #[test]
    fn increment_grows_after_all_z() {
        assert_eq!(incremented("Z"), "AA");
        assert_eq!(incremented("ZZ"), "AAA");
    }

    #[test]
    fn increment_walks_the_ordinal_sequence() {
        let mut p = Prefix::first();
        for n in 1..=20_000 {
            p.increment();
            assert_eq!(p, Prefix::from_ordinal(n), "step {n}");
        }
    }

    #[test]
    fn ordering_is_by_length_then_letters() {
        assert!(prefix("Z") < prefix("AA"));
        assert!(prefix("AZ") < prefix("BA"));
        assert!(prefix("ZZ") < prefix("AAA"));
    }

    #[test]
    fn ordinal_round_trips() {
        for (s, n) in [("A", 0), ("Z", 25), ("AA", 26), ("AZ", 51), ("ZZ", 701), ("AAA", 702)] {
            assert_eq!(prefix(s).ordinal(), Some(n), "ordinal of {s}");
            assert_eq!(Prefix::from_ordinal(n).as_str(), s);
        }
    }

    #[test]
    fn ordinal_overflows_to_none() {
        let long = "Z".repeat(20);
        assert_eq!(prefix(&long).ordinal(), None);
    }

    #[test]
    fn parse_rejects_lowercase_and_empty() {
        assert_eq!(
            Prefix::parse("aB", 0),
            Err(ParseError::InvalidPrefix {
                byte: Some(b'a'),
                index: 0
            })
        );
        assert_eq!(
            Prefix::parse("", 0),
            Err(ParseError::InvalidPrefix {
                byte: None,
                index: 0
            })
        );
    }
}
