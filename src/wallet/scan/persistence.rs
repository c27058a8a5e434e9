//! Override list persistence.
//!
//! The per-chain override list is the only scan state that survives a
//! session. It is pushed to a ledger node under the `<chain>_cheats`
//! settings key and handed back to the wallet in the settings map at the
//! next session start. Repository traits abstract the storage so scans
//! can run against an in-memory implementation in tests.

use crate::node::StaeonNodeClient;
use crate::wallet::types::{ChainKind, OverrideList, ScanError};

use std::collections::HashMap;
use std::sync::Mutex;
use tracing::info;

/// Repository for override list persistence
#[async_trait::async_trait]
pub trait OverrideRepository: Send + Sync {
    async fn load(&self, chain: ChainKind) -> Result<Option<OverrideList>, ScanError>;
    async fn save(&self, chain: ChainKind, overrides: &OverrideList) -> Result<(), ScanError>;
}

/// Node-backed implementation of OverrideRepository.
///
/// Saves push the settings key to a ledger node. Loads read the session
/// settings map captured at startup; the node interface only exposes a
/// write endpoint for settings.
pub struct NodeSettingsRepository {
    client: StaeonNodeClient,
    session_settings: HashMap<String, String>,
}

impl NodeSettingsRepository {
    pub fn new(client: StaeonNodeClient, session_settings: HashMap<String, String>) -> Self {
        Self {
            client,
            session_settings,
        }
    }
}

#[async_trait::async_trait]
impl OverrideRepository for NodeSettingsRepository {
    async fn load(&self, chain: ChainKind) -> Result<Option<OverrideList>, ScanError> {
        match self.session_settings.get(&chain.settings_key()) {
            Some(value) => OverrideList::parse(value).map(Some),
            None => Ok(None),
        }
    }

    async fn save(&self, chain: ChainKind, overrides: &OverrideList) -> Result<(), ScanError> {
        self.client
            .push_settings(&chain.settings_key(), &overrides.to_setting())
            .await
            .map_err(|e| ScanError::Persistence(e.to_string()))?;

        info!(
            "Persisted {} override indices for the {} chain",
            overrides.len(),
            chain
        );
        Ok(())
    }
}

/// In-memory implementation of OverrideRepository for tests and offline
/// sessions
#[derive(Default)]
pub struct MemoryOverrideRepository {
    entries: Mutex<HashMap<ChainKind, OverrideList>>,
}

impl MemoryOverrideRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// A repository pre-seeded with one chain's override list.
    pub fn seeded(chain: ChainKind, overrides: OverrideList) -> Self {
        let repo = Self::new();
        repo.entries.lock().unwrap().insert(chain, overrides);
        repo
    }
}

#[async_trait::async_trait]
impl OverrideRepository for MemoryOverrideRepository {
    async fn load(&self, chain: ChainKind) -> Result<Option<OverrideList>, ScanError> {
        Ok(self.entries.lock().unwrap().get(&chain).cloned())
    }

    async fn save(&self, chain: ChainKind, overrides: &OverrideList) -> Result<(), ScanError> {
        self.entries.lock().unwrap().insert(chain, overrides.clone());
        Ok(())
    }
}
