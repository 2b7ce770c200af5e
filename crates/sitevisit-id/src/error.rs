use core::fmt;

/// A result type defaulting to [`ParseError`].
pub type Result<T, E = ParseError> = core::result::Result<T, E>;

/// Reasons a token failed to parse as a [`CustomerSequenceId`].
///
/// Every variant means the token is not in canonical form. Callers issuing new
/// IDs are expected to treat any of these the same way as "no previous ID" and
/// start again from [`CustomerSequenceId::seed`].
///
/// [`CustomerSequenceId`]: crate::CustomerSequenceId
/// [`CustomerSequenceId::seed`]: crate::CustomerSequenceId::seed
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum ParseError {
    /// The `-` separating the prefix from the body is missing.
    MissingSeparator,
    /// The prefix is empty or contains something other than `A`-`Z`.
    InvalidPrefix { byte: Option<u8>, index: usize },
    /// The body after the separator is not exactly six bytes long.
    InvalidBodyLen { len: usize },
    /// A byte in the block or suffix position is not an ASCII digit.
    InvalidDigit { byte: u8, index: usize },
    /// The byte in the letter position is not `a`-`z`.
    InvalidLetter { byte: u8 },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSeparator => write!(f, "missing '-' separator"),
            Self::InvalidPrefix { byte: None, .. } => write!(f, "empty prefix"),
            Self::InvalidPrefix {
                byte: Some(byte),
                index,
            } => write!(f, "invalid prefix byte {byte:#04x} at {index}"),
            Self::InvalidBodyLen { len } => write!(f, "invalid body length: {len}"),
            Self::InvalidDigit { byte, index } => {
                write!(f, "invalid digit {byte:#04x} at {index}")
            }
            Self::InvalidLetter { byte } => write!(f, "invalid letter {byte:#04x}"),
        }
    }
}

impl core::error::Error for ParseError {}
