use crate::node::LedgerQuery;
use crate::types::{Address, Amount};
use crate::wallet::keys::{AddressDeriver, KeyPair};
use crate::wallet::scan::cancel::CancelToken;
use crate::wallet::scan::events::{EventDispatcher, ScanEvent};
use crate::wallet::scan::progress::ScanProgressTracker;
use crate::wallet::types::{ChainKind, OverrideList, ScanError, ScanRecord};

use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Trait for different balance discovery strategies
#[async_trait::async_trait]
pub trait ScanStrategy: Send + Sync {
	/// Execute the scan strategy
	async fn scan(
		&mut self,
		dispatcher: &mut EventDispatcher,
		tracker: &mut ScanProgressTracker,
	) -> Result<(), ScanError>;

	/// Get the name of this strategy
	fn name(&self) -> &'static str;
}

/// Configuration for scan strategies
#[derive(Debug, Clone)]
pub struct ScanConfig {
	/// Addresses derived and queried per batch
	pub batch_size: u32,
	/// Timeout applied to each individual balance query attempt
	pub request_timeout: Duration,
	/// Extra attempts after a timed-out query before giving up
	pub max_retries: u32,
}

impl Default for ScanConfig {
	fn default() -> Self {
		Self {
			batch_size: 5,
			request_timeout: Duration::from_secs(10),
			max_retries: 2,
		}
	}
}

/// Query one address, bounded by the configured timeout and retry count
/// and raced against cancellation.
async fn query_balance(
	ledger: &dyn LedgerQuery,
	address: &Address,
	config: &ScanConfig,
	cancel: &CancelToken,
) -> Result<Amount, ScanError> {
	for attempt in 0..=config.max_retries {
		tokio::select! {
			_ = cancel.cancelled() => return Err(ScanError::Cancelled),
			outcome = tokio::time::timeout(config.request_timeout, ledger.balance(address)) => {
				match outcome {
					Ok(Ok(balance)) => return Ok(balance),
					Ok(Err(source)) => {
						return Err(ScanError::NetworkFailure {
							address: address.clone(),
							source,
						});
					}
					Err(_) => {
						warn!(
							"Balance query attempt {} timed out for {}",
							attempt + 1,
							address
						);
					}
				}
			}
		}
	}

	Err(ScanError::ScanTimeout {
		address: address.clone(),
		attempts: config.max_retries + 1,
	})
}

/// Derive the given indices and query their balances concurrently.
///
/// This is the fan-out / fan-in barrier: every query for the batch is
/// issued at once and the caller resumes only after all have settled.
/// The first failed query aborts the whole batch.
async fn query_indices(
	ledger: &dyn LedgerQuery,
	deriver: &dyn AddressDeriver,
	chain: ChainKind,
	indices: &[u32],
	config: &ScanConfig,
	cancel: &CancelToken,
) -> Result<Vec<(u32, KeyPair, Amount)>, ScanError> {
	let mut batch = Vec::with_capacity(indices.len());
	for &index in indices {
		batch.push((index, deriver.derive(chain, index)?));
	}

	let queries = batch
		.iter()
		.map(|(_, key_pair)| query_balance(ledger, &key_pair.address, config, cancel));
	let results = join_all(queries).await;

	batch
		.into_iter()
		.zip(results)
		.map(|((index, key_pair), result)| result.map(|balance| (index, key_pair, balance)))
		.collect()
}

/// Strategy that walks the chain from index zero in fixed-size batches.
///
/// The walk advances while each batch contributes balance and halts at
/// the first batch that contributes nothing (the gap limit).
pub struct SequentialScan {
	ledger: Arc<dyn LedgerQuery>,
	deriver: Arc<dyn AddressDeriver>,
	chain: ChainKind,
	config: ScanConfig,
	cancel: CancelToken,
}

impl SequentialScan {
	pub fn new(
		ledger: Arc<dyn LedgerQuery>,
		deriver: Arc<dyn AddressDeriver>,
		chain: ChainKind,
		config: ScanConfig,
		cancel: CancelToken,
	) -> Self {
		Self {
			ledger,
			deriver,
			chain,
			config,
			cancel,
		}
	}
}

#[async_trait::async_trait]
impl ScanStrategy for SequentialScan {
	async fn scan(
		&mut self,
		dispatcher: &mut EventDispatcher,
		tracker: &mut ScanProgressTracker,
	) -> Result<(), ScanError> {
		let mut start: u32 = 0;

		loop {
			if self.cancel.is_cancelled() {
				return Err(ScanError::Cancelled);
			}

			let indices: Vec<u32> = (start..start + self.config.batch_size).collect();
			debug!("Scanning {} batch starting at index {}", self.chain, start);

			let results = match query_indices(
				self.ledger.as_ref(),
				self.deriver.as_ref(),
				self.chain,
				&indices,
				&self.config,
				&self.cancel,
			)
			.await
			{
				Ok(results) => results,
				Err(e) => {
					dispatcher
						.dispatch(&ScanEvent::ScanFailed {
							chain: self.chain,
							error: e.to_string(),
						})
						.await?;
					return Err(e);
				}
			};

			let mut aggregate = Amount::ZERO;
			for (index, key_pair, balance) in results {
				aggregate = aggregate.saturating_add(balance);
				tracker.record_queried(index, !balance.is_zero());
				dispatcher
					.dispatch(&ScanEvent::AddressChecked {
						record: ScanRecord {
							chain: self.chain,
							index,
							address: key_pair.address.clone(),
							key_pair,
							balance,
						},
					})
					.await?;
			}

			tracker.record_batch();
			dispatcher
				.dispatch(&ScanEvent::BatchCompleted {
					chain: self.chain,
					start_index: start,
					aggregate,
				})
				.await?;

			if aggregate.is_zero() {
				info!(
					"Batch at index {} contributed nothing, {} scan complete",
					start, self.chain
				);
				break;
			}
			start += self.config.batch_size;
		}

		dispatcher
			.dispatch(&ScanEvent::ScanCompleted {
				chain: self.chain,
				funded: tracker.get_stats().funded,
			})
			.await?;

		Ok(())
	}

	fn name(&self) -> &'static str {
		"SequentialScan"
	}
}

/// Strategy that re-checks indices known funded from a prior session,
/// then probes trailing batches for addresses funded since.
///
/// Known indices always enter the balance map, even when drained; probe
/// indices enter it only when funded, and each funded probe extends the
/// persisted override list.
pub struct OverrideScan {
	ledger: Arc<dyn LedgerQuery>,
	deriver: Arc<dyn AddressDeriver>,
	chain: ChainKind,
	config: ScanConfig,
	cancel: CancelToken,
	overrides: OverrideList,
}

impl OverrideScan {
	pub fn new(
		ledger: Arc<dyn LedgerQuery>,
		deriver: Arc<dyn AddressDeriver>,
		chain: ChainKind,
		config: ScanConfig,
		cancel: CancelToken,
		overrides: OverrideList,
	) -> Self {
		Self {
			ledger,
			deriver,
			chain,
			config,
			cancel,
			overrides,
		}
	}
}

#[async_trait::async_trait]
impl ScanStrategy for OverrideScan {
	async fn scan(
		&mut self,
		dispatcher: &mut EventDispatcher,
		tracker: &mut ScanProgressTracker,
	) -> Result<(), ScanError> {
		let mut overrides = self.overrides.clone();

		if self.cancel.is_cancelled() {
			return Err(ScanError::Cancelled);
		}

		// Known-funded indices first, one barrier.
		let known: Vec<u32> = overrides.iter().collect();
		if !known.is_empty() {
			debug!(
				"Re-checking {} known {} indices: {}",
				known.len(),
				self.chain,
				overrides.to_setting()
			);

			let results = match query_indices(
				self.ledger.as_ref(),
				self.deriver.as_ref(),
				self.chain,
				&known,
				&self.config,
				&self.cancel,
			)
			.await
			{
				Ok(results) => results,
				Err(e) => {
					dispatcher
						.dispatch(&ScanEvent::ScanFailed {
							chain: self.chain,
							error: e.to_string(),
						})
						.await?;
					return Err(e);
				}
			};

			for (index, key_pair, balance) in results {
				tracker.record_queried(index, !balance.is_zero());
				dispatcher
					.dispatch(&ScanEvent::AddressChecked {
						record: ScanRecord {
							chain: self.chain,
							index,
							address: key_pair.address.clone(),
							key_pair,
							balance,
						},
					})
					.await?;
			}
			tracker.record_batch();
		}

		// Trailing probes past the last known index.
		let mut next = overrides.max_index().map(|m| m + 1).unwrap_or(0);
		loop {
			if self.cancel.is_cancelled() {
				return Err(ScanError::Cancelled);
			}

			let indices: Vec<u32> = (next..next + self.config.batch_size).collect();
			debug!("Probing {} batch starting at index {}", self.chain, next);

			let results = match query_indices(
				self.ledger.as_ref(),
				self.deriver.as_ref(),
				self.chain,
				&indices,
				&self.config,
				&self.cancel,
			)
			.await
			{
				Ok(results) => results,
				Err(e) => {
					dispatcher
						.dispatch(&ScanEvent::ScanFailed {
							chain: self.chain,
							error: e.to_string(),
						})
						.await?;
					return Err(e);
				}
			};

			let mut aggregate = Amount::ZERO;
			let mut extended = false;
			for (index, key_pair, balance) in results {
				aggregate = aggregate.saturating_add(balance);
				tracker.record_queried(index, !balance.is_zero());
				if balance.is_zero() {
					continue;
				}
				extended |= overrides.insert(index);
				dispatcher
					.dispatch(&ScanEvent::AddressChecked {
						record: ScanRecord {
							chain: self.chain,
							index,
							address: key_pair.address.clone(),
							key_pair,
							balance,
						},
					})
					.await?;
			}

			tracker.record_batch();
			dispatcher
				.dispatch(&ScanEvent::BatchCompleted {
					chain: self.chain,
					start_index: next,
					aggregate,
				})
				.await?;

			if aggregate.is_zero() {
				break;
			}

			if extended {
				info!(
					"Probe found new funded {} indices, override list is now {}",
					self.chain,
					overrides.to_setting()
				);
				dispatcher
					.dispatch(&ScanEvent::OverridesExtended {
						chain: self.chain,
						overrides: overrides.clone(),
					})
					.await?;
			}
			next += self.config.batch_size;
		}

		dispatcher
			.dispatch(&ScanEvent::ScanCompleted {
				chain: self.chain,
				funded: tracker.get_stats().funded,
			})
			.await?;

		Ok(())
	}

	fn name(&self) -> &'static str {
		"OverrideScan"
	}
}
