use crate::{error::ParseError, prefix::Prefix};
use core::{cmp::Ordering, fmt, str::FromStr};

const SEPARATOR: char = '-';
const BODY_LEN: usize = 6;
const MAX_BLOCK: u16 = 999;
const MAX_SUFFIX: u8 = 99;

const SUFFIX_RADIX: u64 = MAX_SUFFIX as u64;
const LETTER_RADIX: u64 = 26;
const BLOCK_RADIX: u64 = MAX_BLOCK as u64 + 1;

/// A customer sequence ID in canonical `{prefix}-{block}{letter}{suffix}`
/// form, e.g. `A-000a01`.
///
/// The four fields carry into each other lowest first: the two-digit
/// `suffix` (01-99) rolls into the `letter` (a-z), which rolls into the
/// three-digit `block` (000-999), which rolls into the bijective base-26
/// [`Prefix`]. The derived ordering follows the same precedence, so every
/// value returned by [`CustomerSequenceId::next`] compares strictly greater
/// than its input.
///
/// IDs are always rendered verbatim through [`fmt::Display`]; the textual
/// form is the only form that should ever be stored or shown.
///
/// # Example
///
/// ```
/// use sitevisit_id::CustomerSequenceId;
///
/// let id: CustomerSequenceId = "A-000z99".parse().unwrap();
/// assert_eq!(id.next().to_string(), "A-001a01");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CustomerSequenceId {
    prefix: Prefix,
    block: u16,
    letter: u8,
    suffix: u8,
}

impl CustomerSequenceId {
    /// The fixed first ID, `A-000a01`.
    pub fn seed() -> Self {
        Self {
            prefix: Prefix::first(),
            block: 0,
            letter: b'a',
            suffix: 1,
        }
    }

    /// Parses a token in canonical form.
    ///
    /// The prefix must be one or more `A`-`Z`, followed by `-`, exactly three
    /// digits, one `a`-`z` letter and exactly two digits. Anything else is
    /// rejected.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] describing the first segment that is not in
    /// canonical shape.
    pub fn parse(token: &str) -> Result<Self, ParseError> {
        let (prefix, body) = token
            .split_once(SEPARATOR)
            .ok_or(ParseError::MissingSeparator)?;
        let prefix = Prefix::parse(prefix, 0)?;

        let body = body.as_bytes();
        if body.len() != BODY_LEN {
            return Err(ParseError::InvalidBodyLen { len: body.len() });
        }
        let offset = prefix.as_str().len() + 1;

        let digit = |i: usize| -> Result<u8, ParseError> {
            let byte = body[i];
            if byte.is_ascii_digit() {
                Ok(byte - b'0')
            } else {
                Err(ParseError::InvalidDigit {
                    byte,
                    index: offset + i,
                })
            }
        };

        let block = u16::from(digit(0)?) * 100 + u16::from(digit(1)?) * 10 + u16::from(digit(2)?);
        let letter = body[3];
        if !letter.is_ascii_lowercase() {
            return Err(ParseError::InvalidLetter { byte: letter });
        }
        let suffix = digit(4)? * 10 + digit(5)?;

        Ok(Self {
            prefix,
            block,
            letter,
            suffix,
        })
    }

    /// Returns the successor of this ID.
    ///
    /// Carry precedence, lowest first:
    ///
    /// 1. `suffix` increments; past 99 it resets to 01 and carries.
    /// 2. `letter` increments; past `z` it resets to `a` and carries.
    /// 3. `block` increments; past 999 it resets to 000 and carries.
    /// 4. `prefix` increments as a bijective base-26 numeral (`Z` -> `AA`).
    ///
    /// # Example
    ///
    /// ```
    /// use sitevisit_id::CustomerSequenceId;
    ///
    /// let id: CustomerSequenceId = "Z-999z99".parse().unwrap();
    /// assert_eq!(id.next().to_string(), "AA-000a01");
    /// ```
    #[must_use]
    pub fn next(&self) -> Self {
        let mut next = self.clone();
        if next.suffix < MAX_SUFFIX {
            next.suffix += 1;
            return next;
        }
        next.suffix = 1;

        if next.letter < b'z' {
            next.letter += 1;
            return next;
        }
        next.letter = b'a';

        if next.block < MAX_BLOCK {
            next.block += 1;
            return next;
        }
        next.block = 0;

        next.prefix.increment();
        next
    }

    /// Returns the successor of `latest`, or the seed when there is no usable
    /// previous ID.
    ///
    /// A `latest` that does not parse is treated exactly like `None`.
    pub fn next_after(latest: Option<&str>) -> Self {
        latest
            .and_then(|token| Self::parse(token).ok())
            .map_or_else(Self::seed, |id| id.next())
    }

    /// Maps a counter value onto the ID sequence arithmetically.
    ///
    /// Ordinal 0 is the seed and each increment of the ordinal is one
    /// successor step, so `from_ordinal(n).next() == from_ordinal(n + 1)`.
    /// The digits are computed directly in mixed radix (99 suffixes, 26
    /// letters, 1000 blocks, then the prefix) without walking the sequence.
    pub fn from_ordinal(ordinal: u64) -> Self {
        let suffix = (ordinal % SUFFIX_RADIX) as u8 + 1;
        let rest = ordinal / SUFFIX_RADIX;
        let letter = b'a' + (rest % LETTER_RADIX) as u8;
        let rest = rest / LETTER_RADIX;
        let block = (rest % BLOCK_RADIX) as u16;
        let rest = rest / BLOCK_RADIX;

        Self {
            prefix: Prefix::from_ordinal(rest),
            block,
            letter,
            suffix,
        }
    }

    /// Inverse of [`CustomerSequenceId::from_ordinal`].
    ///
    /// Returns `None` when the suffix is `00` (parseable, but never issued)
    /// or the ID lies beyond `u64` range.
    pub fn ordinal(&self) -> Option<u64> {
        let suffix = u64::from(self.suffix.checked_sub(1)?);
        let letter = u64::from(self.letter - b'a');
        self.prefix
            .ordinal()?
            .checked_mul(BLOCK_RADIX)?
            .checked_add(u64::from(self.block))?
            .checked_mul(LETTER_RADIX)?
            .checked_add(letter)?
            .checked_mul(SUFFIX_RADIX)?
            .checked_add(suffix)
    }

    pub fn prefix(&self) -> &Prefix {
        &self.prefix
    }

    pub const fn block(&self) -> u16 {
        self.block
    }

    pub const fn letter(&self) -> char {
        self.letter as char
    }

    pub const fn suffix(&self) -> u8 {
        self.suffix
    }
}

impl Default for CustomerSequenceId {
    fn default() -> Self {
        Self::seed()
    }
}

impl Ord for CustomerSequenceId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.prefix
            .cmp(&other.prefix)
            .then(self.block.cmp(&other.block))
            .then(self.letter.cmp(&other.letter))
            .then(self.suffix.cmp(&other.suffix))
    }
}

impl PartialOrd for CustomerSequenceId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for CustomerSequenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{SEPARATOR}{:03}{}{:02}",
            self.prefix, self.block, self.letter as char, self.suffix
        )
    }
}

impl FromStr for CustomerSequenceId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<&str> for CustomerSequenceId {
    type Error = ParseError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}
