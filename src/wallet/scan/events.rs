//! Event system for balance discovery.
//!
//! Scan strategies emit events as addresses are checked and batches
//! complete; registered handlers collect records into the balance map and
//! persist extended override lists. The event layer keeps the batch-walk
//! logic free of state mutation, which is what makes the strategies
//! testable in isolation.

use crate::types::Amount;
use crate::wallet::types::{ChainKind, OverrideList, ScanError, ScanRecord};

/// Events that occur during a balance scan
pub enum ScanEvent {
    /// An address was queried and its record is ready for the map
    AddressChecked { record: ScanRecord },
    /// A batch barrier completed with the given aggregate balance
    BatchCompleted {
        chain: ChainKind,
        start_index: u32,
        aggregate: Amount,
    },
    /// The override list grew and should be persisted
    OverridesExtended {
        chain: ChainKind,
        overrides: OverrideList,
    },
    /// The scan for a chain finished
    ScanCompleted { chain: ChainKind, funded: usize },
    /// A scan failed and is aborting
    ScanFailed { chain: ChainKind, error: String },
}

/// Trait for handling scan events.
#[async_trait::async_trait]
pub trait ScanEventHandler: Send + Sync {
    /// Handle a scan event.
    ///
    /// Called for every event dispatched by a scan strategy.
    async fn handle(&mut self, event: &ScanEvent) -> Result<(), ScanError>;

    /// Get the name of this handler for logging and diagnostics.
    fn name(&self) -> &'static str;
}

/// Event dispatcher that manages multiple event handlers.
///
/// Handlers are called in registration order. Errors from handlers are
/// logged but do not stop other handlers from running.
pub struct EventDispatcher {
    handlers: Vec<Box<dyn ScanEventHandler>>,
}

impl EventDispatcher {
    /// Create a new, empty event dispatcher.
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Register a new event handler.
    pub fn register_handler(&mut self, handler: Box<dyn ScanEventHandler>) {
        self.handlers.push(handler);
    }

    /// Dispatch an event to all registered handlers.
    pub async fn dispatch(&mut self, event: &ScanEvent) -> Result<(), ScanError> {
        for handler in &mut self.handlers {
            if let Err(e) = handler.handle(event).await {
                tracing::error!("Handler {} failed to process event: {}", handler.name(), e);
                // Continue processing with other handlers
            }
        }
        Ok(())
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
