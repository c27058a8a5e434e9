//! Canonical signing message construction.
//!
//! Every verifying node rebuilds the signed payload from a transaction's
//! `outputs` field, so the message rendered here must be identical for any
//! submission order of the same outputs. The message depends only on the
//! multiset of (address, amount) pairs and the timestamp.

use super::builder::TransactionError;
use crate::types::{Address, Amount};

use itertools::Itertools;
use serde::Serialize;
use serde::ser::{SerializeSeq, Serializer};

/// A spend destination and the amount sent to it.
///
/// Duplicate addresses across outputs are legal and never merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Output {
	pub address: Address,
	pub amount: Amount,
}

impl Output {
	pub fn new(address: Address, amount: Amount) -> Self {
		Self { address, amount }
	}
}

// Wire form is the positional pair [address, amountString].
impl Serialize for Output {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		let mut seq = serializer.serialize_seq(Some(2))?;
		seq.serialize_element(&self.address)?;
		seq.serialize_element(&self.amount)?;
		seq.end()
	}
}

/// Render the outputs and timestamp into the total spend amount and the
/// canonical message.
///
/// Outputs are ordered by address (stable, so identical addresses keep
/// their relative submission order), rendered as `<address>,<amount>`,
/// joined with `;`, and the timestamp is appended as the final segment.
/// An empty output list is legal; the message is then just the timestamp.
pub fn canonicalize(
	outputs: &[Output],
	timestamp: &str,
) -> Result<(Amount, String), TransactionError> {
	let mut ordered: Vec<&Output> = outputs.iter().collect();
	ordered.sort_by(|a, b| a.address.cmp(&b.address));

	let message = ordered
		.iter()
		.map(|output| format!("{},{}", output.address, output.amount))
		.chain(std::iter::once(timestamp.to_string()))
		.join(";");

	let total = Amount::checked_sum(outputs.iter().map(|o| o.amount))
		.ok_or(TransactionError::AmountOverflow)?;

	Ok((total, message))
}
