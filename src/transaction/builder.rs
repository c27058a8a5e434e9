//! Staeon transaction builder
//!
//! This module provides a builder pattern for assembling and signing spend
//! transactions. Building is pure: no network or storage access, and the
//! same inputs, outputs, fee, change address and timestamp always produce
//! the same transaction.

use super::DEFAULT_FEE;
use super::canonical::{Output, canonicalize};
use crate::types::{Address, Amount};
use crate::wallet::keys::{KeyError, KeyPair, MessageSigner};

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde::ser::{SerializeSeq, Serializer};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransactionError {
	#[error("{0}: not enough balance")]
	InsufficientInputBalance(Address),

	#[error("outputs plus fee ({required}) exceed inputs ({available})")]
	InsufficientFunds {
		required: Amount,
		available: Amount,
	},

	#[error("amount overflow")]
	AmountOverflow,

	#[error("no change address provided")]
	MissingChangeAddress,

	#[error(transparent)]
	Signing(#[from] KeyError),
}

/// An input selected for spending, before signing.
#[derive(Debug, Clone)]
pub struct SpendInput {
	pub key: KeyPair,
	pub amount: Amount,
	/// Ledger balance observed for this address, when the scanner supplied
	/// one. Checked against `amount` at build time.
	pub known_balance: Option<Amount>,
}

impl SpendInput {
	pub fn new(key: KeyPair, amount: Amount) -> Self {
		Self {
			key,
			amount,
			known_balance: None,
		}
	}

	pub fn with_known_balance(key: KeyPair, amount: Amount, balance: Amount) -> Self {
		Self {
			key,
			amount,
			known_balance: Some(balance),
		}
	}
}

/// A spent input after signing: its address, amount and signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedInput {
	pub address: Address,
	pub amount: Amount,
	pub signature: String,
}

// Wire form is the positional triple [address, amountString, signature].
impl Serialize for SignedInput {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		let mut seq = serializer.serialize_seq(Some(3))?;
		seq.serialize_element(&self.address)?;
		seq.serialize_element(&self.amount)?;
		seq.serialize_element(&self.signature)?;
		seq.end()
	}
}

/// A fully signed spend transaction, ready for broadcast.
///
/// `outputs` holds the caller's outputs in submission order plus the one
/// change output the builder appends. Immutable after construction.
#[derive(Debug, Clone, Serialize)]
pub struct Transaction {
	pub inputs: Vec<SignedInput>,
	pub outputs: Vec<Output>,
	pub timestamp: String,
}

/// Builder for assembling signed Staeon transactions
pub struct TransactionBuilder {
	inputs: Vec<SpendInput>,
	outputs: Vec<Output>,
	fee: Option<Amount>,
	change_address: Option<Address>,
	timestamp: Option<String>,
}

impl TransactionBuilder {
	/// Creates a new transaction builder
	pub fn new() -> Self {
		Self {
			inputs: Vec::new(),
			outputs: Vec::new(),
			fee: None,
			change_address: None,
			timestamp: None,
		}
	}

	/// Sets the inputs to spend
	pub fn with_inputs(mut self, inputs: Vec<SpendInput>) -> Self {
		self.inputs = inputs;
		self
	}

	/// Sets the outputs to pay
	pub fn with_outputs(mut self, outputs: Vec<Output>) -> Self {
		self.outputs = outputs;
		self
	}

	/// Sets the fee; defaults to [`DEFAULT_FEE`] when unset
	pub fn with_fee(mut self, fee: Amount) -> Self {
		self.fee = Some(fee);
		self
	}

	/// Sets the address receiving the leftover value
	pub fn with_change_address(mut self, address: Address) -> Self {
		self.change_address = Some(address);
		self
	}

	/// Pins the transaction timestamp instead of capturing now-UTC.
	/// The timestamp is part of the signed payload, so pinning it makes
	/// builds reproducible.
	pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
		self.timestamp = Some(timestamp.into());
		self
	}

	/// Signs the inputs and assembles the final transaction.
	///
	/// Each input signs `address + amount + message`, where `message` is
	/// the canonical rendering of the pre-change outputs and timestamp.
	/// The fee and the appended change output stay outside every signed
	/// payload; deployed verifiers reconstruct exactly this boundary.
	pub fn build(self, signer: &dyn MessageSigner) -> Result<Transaction, TransactionError> {
		let timestamp = self.timestamp.unwrap_or_else(current_timestamp);
		let change_address = self
			.change_address
			.ok_or(TransactionError::MissingChangeAddress)?;
		let fee = self.fee.unwrap_or(DEFAULT_FEE);

		let (total_out, message) = canonicalize(&self.outputs, &timestamp)?;
		log::debug!(
			"Signing {} inputs against canonical message {:?}",
			self.inputs.len(),
			message
		);

		let mut signed = Vec::with_capacity(self.inputs.len());
		let mut total_in = Amount::ZERO;
		for input in &self.inputs {
			if let Some(balance) = input.known_balance {
				if input.amount > balance {
					return Err(TransactionError::InsufficientInputBalance(
						input.key.address.clone(),
					));
				}
			}

			let payload = format!("{}{}{}", input.key.address, input.amount, message);
			let signature = signer.sign(&payload, &input.key)?;

			signed.push(SignedInput {
				address: input.key.address.clone(),
				amount: input.amount,
				signature,
			});
			total_in = total_in
				.checked_add(input.amount)
				.ok_or(TransactionError::AmountOverflow)?;
		}

		let required = total_out
			.checked_add(fee)
			.ok_or(TransactionError::AmountOverflow)?;
		if required > total_in {
			return Err(TransactionError::InsufficientFunds {
				required,
				available: total_in,
			});
		}

		let change = total_in
			.checked_sub(required)
			.ok_or(TransactionError::AmountOverflow)?;

		let mut outputs = self.outputs;
		outputs.push(Output::new(change_address, change));

		Ok(Transaction {
			inputs: signed,
			outputs,
			timestamp,
		})
	}
}

impl Default for TransactionBuilder {
	fn default() -> Self {
		Self::new()
	}
}

/// Current instant in the fixed wire format: ISO-8601, millisecond
/// precision, `Z` suffix.
fn current_timestamp() -> String {
	Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::wallet::keys::{AddressDeriver, SeededKeyring};
	use crate::wallet::types::ChainKind;

	const TS: &str = "2018-05-01T00:00:00.000Z";

	fn keyring() -> SeededKeyring {
		SeededKeyring::from_hex_seed(
			"2e347e236daa04faad881f1dc5dc3b8a9b4e8e4429e9d0728aad78ada199b66b",
		)
		.unwrap()
	}

	fn funded_input(kr: &SeededKeyring, index: u32, balance: &str) -> SpendInput {
		let key = kr.derive(ChainKind::Deposit, index).unwrap();
		let balance: Amount = balance.parse().unwrap();
		SpendInput::with_known_balance(key, balance, balance)
	}

	fn amt(s: &str) -> Amount {
		s.parse().unwrap()
	}

	#[test]
	fn change_makes_conservation_an_equality() {
		let kr = keyring();
		let change_addr = kr.derive(ChainKind::Change, 0).unwrap().address;
		let dest = Address::from("stn1destination");

		let tx = TransactionBuilder::new()
			.with_inputs(vec![funded_input(&kr, 0, "10")])
			.with_outputs(vec![Output::new(dest, amt("3"))])
			.with_fee(amt("0.01"))
			.with_change_address(change_addr.clone())
			.with_timestamp(TS)
			.build(&kr)
			.unwrap();

		let change = tx.outputs.last().unwrap();
		assert_eq!(change.address, change_addr);
		assert_eq!(change.amount, amt("6.99"));

		let total_out = Amount::checked_sum(tx.outputs.iter().map(|o| o.amount)).unwrap();
		let total_in = Amount::checked_sum(tx.inputs.iter().map(|i| i.amount)).unwrap();
		assert_eq!(total_out.checked_add(amt("0.01")).unwrap(), total_in);
	}

	#[test]
	fn insufficient_funds_is_a_typed_failure() {
		let kr = keyring();
		let result = TransactionBuilder::new()
			.with_inputs(vec![funded_input(&kr, 0, "2")])
			.with_outputs(vec![Output::new(Address::from("stn1dest"), amt("3"))])
			.with_fee(amt("0.01"))
			.with_change_address(Address::from("stn1change"))
			.with_timestamp(TS)
			.build(&kr);

		assert!(matches!(
			result,
			Err(TransactionError::InsufficientFunds { .. })
		));
	}

	#[test]
	fn overdrawn_input_names_its_address() {
		let kr = keyring();
		let key = kr.derive(ChainKind::Deposit, 0).unwrap();
		let address = key.address.clone();
		let input = SpendInput::with_known_balance(key, amt("5"), amt("2"));

		let result = TransactionBuilder::new()
			.with_inputs(vec![input])
			.with_outputs(vec![])
			.with_change_address(Address::from("stn1change"))
			.with_timestamp(TS)
			.build(&kr);

		match result {
			Err(TransactionError::InsufficientInputBalance(a)) => assert_eq!(a, address),
			other => panic!("expected InsufficientInputBalance, got {:?}", other.err()),
		}
	}

	#[test]
	fn build_is_deterministic_under_pinned_timestamp() {
		let kr = keyring();
		let build = || {
			TransactionBuilder::new()
				.with_inputs(vec![funded_input(&kr, 0, "10")])
				.with_outputs(vec![
					Output::new(Address::from("stn1b"), amt("1")),
					Output::new(Address::from("stn1a"), amt("2.5")),
				])
				.with_change_address(Address::from("stn1change"))
				.with_timestamp(TS)
				.build(&kr)
				.unwrap()
		};

		let first = build();
		let second = build();
		assert_eq!(first.inputs, second.inputs);
		assert_eq!(first.outputs, second.outputs);
		assert_eq!(first.timestamp, second.timestamp);
	}

	#[test]
	fn signatures_cover_only_pre_change_outputs() {
		let kr = keyring();
		let key = kr.derive(ChainKind::Deposit, 0).unwrap();
		let outputs = vec![Output::new(Address::from("stn1dest"), amt("3"))];

		let tx = TransactionBuilder::new()
			.with_inputs(vec![SpendInput::with_known_balance(
				key.clone(),
				amt("10"),
				amt("10"),
			)])
			.with_outputs(outputs.clone())
			.with_fee(amt("0.01"))
			.with_change_address(Address::from("stn1change"))
			.with_timestamp(TS)
			.build(&kr)
			.unwrap();

		// A verifier rebuilds the payload from the outputs minus the
		// trailing change entry.
		let pre_change = &tx.outputs[..tx.outputs.len() - 1];
		let (_, message) = canonicalize(pre_change, &tx.timestamp).unwrap();
		let payload = format!("{}{}{}", key.address, amt("10"), message);
		let expected = kr.sign(&payload, &key).unwrap();
		assert_eq!(tx.inputs[0].signature, expected);
	}

	#[test]
	fn default_fee_applies_when_unset() {
		let kr = keyring();
		let tx = TransactionBuilder::new()
			.with_inputs(vec![funded_input(&kr, 0, "1")])
			.with_outputs(vec![])
			.with_change_address(Address::from("stn1change"))
			.with_timestamp(TS)
			.build(&kr)
			.unwrap();

		// Only the change output exists; it absorbs everything but the fee.
		assert_eq!(tx.outputs.len(), 1);
		assert_eq!(tx.outputs[0].amount, amt("0.99"));
	}

	#[test]
	fn wire_json_uses_positional_arrays() {
		let kr = keyring();
		let key = kr.derive(ChainKind::Deposit, 0).unwrap();
		let address = key.address.clone();

		let tx = TransactionBuilder::new()
			.with_inputs(vec![SpendInput::with_known_balance(
				key,
				amt("2.5"),
				amt("2.5"),
			)])
			.with_outputs(vec![Output::new(Address::from("stn1dest"), amt("1"))])
			.with_fee(amt("0.5"))
			.with_change_address(Address::from("stn1change"))
			.with_timestamp(TS)
			.build(&kr)
			.unwrap();

		let value = serde_json::to_value(&tx).unwrap();
		let signature = tx.inputs[0].signature.clone();
		assert_eq!(
			value,
			serde_json::json!({
				"inputs": [[address.as_str(), "2.5", signature]],
				"outputs": [["stn1dest", "1"], ["stn1change", "1"]],
				"timestamp": TS,
			})
		);
	}
}
