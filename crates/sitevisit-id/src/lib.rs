#![doc = include_str!("../README.md")]

mod error;
mod id;
mod prefix;
#[cfg(feature = "serde")]
mod serde;
#[cfg(test)]
mod tests;

pub use crate::error::*;
pub use crate::id::*;
pub use crate::prefix::*;
