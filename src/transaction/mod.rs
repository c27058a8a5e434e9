/// Transaction builder module for constructing Staeon transactions
pub mod builder;
/// Canonical signing message construction
pub mod canonical;

pub use builder::{SignedInput, SpendInput, Transaction, TransactionBuilder, TransactionError};
pub use canonical::{Output, canonicalize};

use crate::types::Amount;

/// Fee applied when a spend request does not name one.
pub const DEFAULT_FEE: Amount = Amount::from_minor_units(1_000_000); // 0.01
