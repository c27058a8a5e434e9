use crate::node::NodeError;
use crate::transaction::SpendInput;
use crate::types::{Address, Amount};
use crate::wallet::keys::{KeyError, KeyPair};

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// The two derivation chains a wallet scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChainKind {
	Deposit,
	Change,
}

impl ChainKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			ChainKind::Deposit => "deposit",
			ChainKind::Change => "change",
		}
	}

	/// Settings key under which this chain's override list is persisted.
	pub fn settings_key(&self) -> String {
		format!("{}_cheats", self.as_str())
	}
}

impl fmt::Display for ChainKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Position of a derived address within a chain, e.g. `deposit_3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AddressTag {
	pub chain: ChainKind,
	pub index: u32,
}

impl AddressTag {
	pub fn new(chain: ChainKind, index: u32) -> Self {
		Self { chain, index }
	}
}

impl fmt::Display for AddressTag {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}_{}", self.chain, self.index)
	}
}

/// One scanned address: its position, key material and ledger balance.
#[derive(Debug, Clone)]
pub struct ScanRecord {
	pub chain: ChainKind,
	pub index: u32,
	pub address: Address,
	pub key_pair: KeyPair,
	pub balance: Amount,
}

impl ScanRecord {
	pub fn tag(&self) -> AddressTag {
		AddressTag::new(self.chain, self.index)
	}
}

/// Scan results for one session, keyed by address position.
///
/// Populated only by the scanner's event handler and append-only within a
/// scan run.
#[derive(Debug, Clone, Default)]
pub struct BalanceMap {
	records: BTreeMap<AddressTag, ScanRecord>,
}

impl BalanceMap {
	pub fn new() -> Self {
		Self::default()
	}

	pub(crate) fn insert(&mut self, record: ScanRecord) {
		self.records.insert(record.tag(), record);
	}

	pub fn get(&self, tag: &AddressTag) -> Option<&ScanRecord> {
		self.records.get(tag)
	}

	pub fn len(&self) -> usize {
		self.records.len()
	}

	pub fn is_empty(&self) -> bool {
		self.records.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = &ScanRecord> {
		self.records.values()
	}

	/// Indices recorded for this chain, in ascending order.
	pub fn indices(&self) -> impl Iterator<Item = u32> + '_ {
		self.records.keys().map(|tag| tag.index)
	}

	/// First index past every recorded position; the next fresh address.
	pub fn next_unused_index(&self) -> u32 {
		self.indices().max().map(|i| i + 1).unwrap_or(0)
	}

	/// Total discovered balance across all records.
	pub fn total_balance(&self) -> Amount {
		self.iter().fold(Amount::ZERO, |acc, r| {
			acc.checked_add(r.balance).unwrap_or(acc)
		})
	}

	/// Funded records converted to spend inputs, full balance each.
	pub fn spendable_inputs(&self) -> Vec<SpendInput> {
		self.iter()
			.filter(|r| !r.balance.is_zero())
			.map(|r| SpendInput::with_known_balance(r.key_pair.clone(), r.balance, r.balance))
			.collect()
	}
}

/// Persisted cache of indices known to have held balance ("cheats").
///
/// Wire form is a comma-joined list of decimal indices.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverrideList {
	indices: BTreeSet<u32>,
}

impl OverrideList {
	pub fn new() -> Self {
		Self::default()
	}

	/// Parse the comma-joined settings value. Empty input yields an empty
	/// list.
	pub fn parse(value: &str) -> Result<Self, ScanError> {
		let mut indices = BTreeSet::new();
		for part in value.split(',') {
			let part = part.trim();
			if part.is_empty() {
				continue;
			}
			let index = part
				.parse()
				.map_err(|_| ScanError::InvalidOverride(value.to_string()))?;
			indices.insert(index);
		}
		Ok(Self { indices })
	}

	/// Comma-joined decimal form, ascending.
	pub fn to_setting(&self) -> String {
		use itertools::Itertools;
		self.indices.iter().join(",")
	}

	/// Insert an index, returning whether it was new.
	pub fn insert(&mut self, index: u32) -> bool {
		self.indices.insert(index)
	}

	pub fn contains(&self, index: u32) -> bool {
		self.indices.contains(&index)
	}

	pub fn max_index(&self) -> Option<u32> {
		self.indices.iter().next_back().copied()
	}

	pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
		self.indices.iter().copied()
	}

	pub fn len(&self) -> usize {
		self.indices.len()
	}

	pub fn is_empty(&self) -> bool {
		self.indices.is_empty()
	}
}

impl FromIterator<u32> for OverrideList {
	fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
		Self {
			indices: iter.into_iter().collect(),
		}
	}
}

/// Error types for balance discovery
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
	#[error("balance query failed for {address}: {source}")]
	NetworkFailure {
		address: Address,
		source: NodeError,
	},

	#[error("balance query for {address} timed out after {attempts} attempts")]
	ScanTimeout { address: Address, attempts: u32 },

	#[error("scan cancelled")]
	Cancelled,

	#[error(transparent)]
	Key(#[from] KeyError),

	#[error("invalid override list: {0}")]
	InvalidOverride(String),

	#[error("failed to persist override list: {0}")]
	Persistence(String),

	#[error("scan incomplete: {0}")]
	Incomplete(String),
}
