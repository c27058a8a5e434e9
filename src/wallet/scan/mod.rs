//! Balance Discovery Module
//!
//! This module provides all the core logic and services for discovering which
//! derived addresses hold funds on the ledger. It is composed of several
//! submodules, each responsible for a specific aspect of the scan process:
//!
//! - `scanner`: The main entry point and coordinator for balance discovery. It picks the strategy and owns the balance map.
//! - `strategies`: Contains the pluggable scan strategies (sequential gap-limit walk, override fast path) and their configuration.
//! - `events`: Defines the event types and event handling traits used for decoupled communication between scan components.
//! - `progress`: Tracks queried indices, funded counts, and provides statistics and validation.
//! - `persistence`: Repository traits and implementations for the per-chain override list.
//! - `cancel`: Cancellation primitives observed at batch boundaries and in-flight queries.
//!
//! The scanner coordinates the process by selecting a strategy per chain, dispatching events, and collecting records. Progress tracking is integrated to ensure observable, validated discovery.

/// Cancellation primitives for in-flight scans
pub mod cancel;
/// Event system for decoupled communication during scans
pub mod events;
/// Override list persistence
pub mod persistence;
/// Tracks scan progress and statistics
pub mod progress;
/// Main coordinator for balance discovery
pub mod scanner;
/// Pluggable scan strategies
pub mod strategies;

pub use scanner::*;

#[cfg(test)]
pub(crate) mod testing {
	use crate::node::{LedgerQuery, NodeError};
	use crate::types::{Address, Amount};
	use crate::wallet::scan::events::{ScanEvent, ScanEventHandler};
	use crate::wallet::types::{BalanceMap, OverrideList, ScanError};

	use std::collections::{HashMap, HashSet};
	use std::sync::{Arc, Mutex};

	/// A ledger fake answering balance queries from a script.
	///
	/// Unknown addresses answer zero; addresses marked failing answer a
	/// node error. Every query is logged for assertions about coverage.
	pub(crate) struct ScriptedLedger {
		balances: HashMap<Address, Amount>,
		failing: HashSet<Address>,
		queried: Mutex<Vec<Address>>,
	}

	impl ScriptedLedger {
		pub fn new() -> Self {
			Self {
				balances: HashMap::new(),
				failing: HashSet::new(),
				queried: Mutex::new(Vec::new()),
			}
		}

		pub fn fund(&mut self, address: Address, balance: &str) {
			self.balances
				.insert(address, balance.parse().expect("scripted balance"));
		}

		pub fn fail(&mut self, address: Address) {
			self.failing.insert(address);
		}

		pub fn queried(&self) -> Vec<Address> {
			self.queried.lock().unwrap().clone()
		}
	}

	#[async_trait::async_trait]
	impl LedgerQuery for ScriptedLedger {
		async fn balance(&self, address: &Address) -> Result<Amount, NodeError> {
			self.queried.lock().unwrap().push(address.clone());
			if self.failing.contains(address) {
				return Err(NodeError::Rejected("scripted failure".to_string()));
			}
			Ok(self.balances.get(address).copied().unwrap_or(Amount::ZERO))
		}
	}

	/// Handler that collects records and persisted override lists.
	pub(crate) struct CollectingHandler {
		pub balances: Arc<Mutex<BalanceMap>>,
		pub saved: Arc<Mutex<Vec<OverrideList>>>,
	}

	#[async_trait::async_trait]
	impl ScanEventHandler for CollectingHandler {
		async fn handle(&mut self, event: &ScanEvent) -> Result<(), ScanError> {
			match event {
				ScanEvent::AddressChecked { record } => {
					self.balances.lock().unwrap().insert(record.clone());
				}
				ScanEvent::OverridesExtended { overrides, .. } => {
					self.saved.lock().unwrap().push(overrides.clone());
				}
				_ => {}
			}
			Ok(())
		}

		fn name(&self) -> &'static str {
			"CollectingHandler"
		}
	}
}
