//! Balance scanner and integration point for all scan services.
//!
//! This module defines the `BalanceScanner`, which coordinates balance
//! discovery for a wallet. It selects a scan strategy per chain, wires the
//! event dispatcher, collects discovered records into a `BalanceMap`, and
//! persists extended override lists.
//!
//! The scanner is responsible for:
//! - Choosing between the sequential walk and the override fast path,
//!   based on whether a persisted override list exists for the chain
//! - Owning the map that strategies populate through events
//! - Validating scan completeness before handing the map to the caller
//! - Running the deposit and change chains concurrently; they share no
//!   scanner state
//!
//! All scan state lives in values owned here and threaded through the
//! strategy call; nothing is module-global.

use crate::node::LedgerQuery;
use crate::wallet::keys::AddressDeriver;
use crate::wallet::scan::{
    cancel::CancelToken,
    events::{EventDispatcher, ScanEvent, ScanEventHandler},
    persistence::OverrideRepository,
    progress::ScanProgressTracker,
    strategies::{OverrideScan, ScanConfig, ScanStrategy, SequentialScan},
};
use crate::wallet::types::{BalanceMap, ChainKind, ScanError};

use std::sync::{Arc, Mutex};
use tracing::{debug, error, info};

/// Coordinator for balance discovery across both wallet chains.
pub struct BalanceScanner {
    ledger: Arc<dyn LedgerQuery>,
    deriver: Arc<dyn AddressDeriver>,
    repository: Arc<dyn OverrideRepository>,
    config: ScanConfig,
}

impl BalanceScanner {
    pub fn new(
        ledger: Arc<dyn LedgerQuery>,
        deriver: Arc<dyn AddressDeriver>,
        repository: Arc<dyn OverrideRepository>,
        config: ScanConfig,
    ) -> Self {
        Self {
            ledger,
            deriver,
            repository,
            config,
        }
    }

    /// Discover funded addresses on one chain.
    ///
    /// Loads the chain's persisted override list to pick the strategy:
    /// a non-empty list selects the override fast path, anything else the
    /// sequential walk from index zero. Returns the populated balance map
    /// once the strategy halts.
    pub async fn scan_chain(
        &self,
        chain: ChainKind,
        cancel: CancelToken,
    ) -> Result<BalanceMap, ScanError> {
        let overrides = self.repository.load(chain).await?;

        let (mut strategy, require_contiguous): (Box<dyn ScanStrategy>, bool) = match overrides {
            Some(list) if !list.is_empty() => (
                Box::new(OverrideScan::new(
                    self.ledger.clone(),
                    self.deriver.clone(),
                    chain,
                    self.config.clone(),
                    cancel,
                    list,
                )),
                false,
            ),
            _ => (
                Box::new(SequentialScan::new(
                    self.ledger.clone(),
                    self.deriver.clone(),
                    chain,
                    self.config.clone(),
                    cancel,
                )),
                true,
            ),
        };

        info!("Scanning {} chain with {}", chain, strategy.name());

        let balances = Arc::new(Mutex::new(BalanceMap::new()));
        let handler = RecordingEventHandler {
            balances: balances.clone(),
            repository: self.repository.clone(),
        };

        let mut dispatcher = EventDispatcher::new();
        dispatcher.register_handler(Box::new(handler));

        let mut tracker = ScanProgressTracker::new();
        strategy.scan(&mut dispatcher, &mut tracker).await?;

        tracker.log_progress();
        tracker
            .validate_completion(require_contiguous)
            .map_err(ScanError::Incomplete)?;

        let map = balances.lock().unwrap().clone();
        info!(
            "{} scan finished with {} records, {} spendable",
            chain,
            map.len(),
            map.spendable_inputs().len()
        );
        Ok(map)
    }

    /// Scan the deposit and change chains concurrently.
    ///
    /// The chains touch disjoint balance maps and share no state, so the
    /// two scans make progress independently; the first failure aborts
    /// both.
    pub async fn scan_all(
        &self,
        cancel: CancelToken,
    ) -> Result<(BalanceMap, BalanceMap), ScanError> {
        tokio::try_join!(
            self.scan_chain(ChainKind::Deposit, cancel.clone()),
            self.scan_chain(ChainKind::Change, cancel)
        )
    }
}

/// Event handler that owns the scan's mutable state.
///
/// Collects checked addresses into the balance map and persists the
/// override list when a probe extends it. Only this handler writes the
/// map; strategies stay pure walkers.
struct RecordingEventHandler {
    balances: Arc<Mutex<BalanceMap>>,
    repository: Arc<dyn OverrideRepository>,
}

#[async_trait::async_trait]
impl ScanEventHandler for RecordingEventHandler {
    async fn handle(&mut self, event: &ScanEvent) -> Result<(), ScanError> {
        match event {
            ScanEvent::AddressChecked { record } => {
                self.balances.lock().unwrap().insert(record.clone());
            }
            ScanEvent::OverridesExtended { chain, overrides } => {
                self.repository.save(*chain, overrides).await?;
            }
            ScanEvent::BatchCompleted {
                chain,
                start_index,
                aggregate,
            } => {
                debug!(
                    "{} batch at index {} settled with aggregate {}",
                    chain, start_index, aggregate
                );
            }
            ScanEvent::ScanCompleted { chain, funded } => {
                info!("{} scan completed with {} funded addresses", chain, funded);
            }
            ScanEvent::ScanFailed { chain, error } => {
                error!("{} scan failed: {}", chain, error);
            }
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "RecordingEventHandler"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::keys::SeededKeyring;
    use crate::wallet::scan::persistence::MemoryOverrideRepository;
    use crate::wallet::scan::testing::ScriptedLedger;
    use crate::wallet::types::OverrideList;

    const SEED: &str = "2e347e236daa04faad881f1dc5dc3b8a9b4e8e4429e9d0728aad78ada199b66b";

    fn keyring() -> Arc<SeededKeyring> {
        Arc::new(SeededKeyring::from_hex_seed(SEED).unwrap())
    }

    fn scanner(
        ledger: ScriptedLedger,
        repository: MemoryOverrideRepository,
    ) -> (BalanceScanner, Arc<MemoryOverrideRepository>) {
        let repository = Arc::new(repository);
        let scanner = BalanceScanner::new(
            Arc::new(ledger),
            keyring(),
            repository.clone(),
            ScanConfig::default(),
        );
        (scanner, repository)
    }

    #[tokio::test]
    async fn fresh_wallet_walks_sequentially() {
        let kr = keyring();
        let mut ledger = ScriptedLedger::new();
        ledger.fund(kr.derive(ChainKind::Deposit, 0).unwrap().address, "5");
        ledger.fund(kr.derive(ChainKind::Deposit, 6).unwrap().address, "1.5");

        let (scanner, _) = scanner(ledger, MemoryOverrideRepository::new());
        let map = scanner
            .scan_chain(ChainKind::Deposit, CancelToken::never())
            .await
            .unwrap();

        // Batches 0-4, 5-9 funded; 10-14 empty stops the walk.
        assert_eq!(map.len(), 15);
        assert_eq!(map.spendable_inputs().len(), 2);
        assert_eq!(map.total_balance(), "6.5".parse().unwrap());
    }

    #[tokio::test]
    async fn known_wallet_takes_the_override_path() {
        let kr = keyring();
        let mut ledger = ScriptedLedger::new();
        ledger.fund(kr.derive(ChainKind::Deposit, 2).unwrap().address, "4");
        ledger.fund(kr.derive(ChainKind::Deposit, 7).unwrap().address, "1");

        let overrides: OverrideList = [2, 7].into_iter().collect();
        let (scanner, _) = scanner(
            ledger,
            MemoryOverrideRepository::seeded(ChainKind::Deposit, overrides),
        );

        let map = scanner
            .scan_chain(ChainKind::Deposit, CancelToken::never())
            .await
            .unwrap();

        assert_eq!(map.indices().collect::<Vec<_>>(), vec![2, 7]);
        assert_eq!(map.total_balance(), "5".parse().unwrap());
    }

    #[tokio::test]
    async fn probe_extensions_reach_the_repository() {
        let kr = keyring();
        let mut ledger = ScriptedLedger::new();
        ledger.fund(kr.derive(ChainKind::Deposit, 2).unwrap().address, "4");
        ledger.fund(kr.derive(ChainKind::Deposit, 5).unwrap().address, "3");

        let overrides: OverrideList = [2].into_iter().collect();
        let (scanner, repository) = scanner(
            ledger,
            MemoryOverrideRepository::seeded(ChainKind::Deposit, overrides),
        );

        scanner
            .scan_chain(ChainKind::Deposit, CancelToken::never())
            .await
            .unwrap();

        let persisted = repository
            .load(ChainKind::Deposit)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(persisted.to_setting(), "2,5");
    }

    #[tokio::test]
    async fn chains_scan_independently() {
        let kr = keyring();
        let mut ledger = ScriptedLedger::new();
        ledger.fund(kr.derive(ChainKind::Deposit, 0).unwrap().address, "5");
        ledger.fund(kr.derive(ChainKind::Change, 1).unwrap().address, "2");

        let (scanner, _) = scanner(ledger, MemoryOverrideRepository::new());
        let (deposits, change) = scanner.scan_all(CancelToken::never()).await.unwrap();

        assert_eq!(deposits.total_balance(), "5".parse().unwrap());
        assert_eq!(change.total_balance(), "2".parse().unwrap());
        assert!(deposits.iter().all(|r| r.chain == ChainKind::Deposit));
        assert!(change.iter().all(|r| r.chain == ChainKind::Change));
    }
}
