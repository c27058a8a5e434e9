//! Progress tracking for balance discovery.
//!
//! The tracker records which indices a scan has queried, counts funded
//! addresses and completed batches, and validates completeness. Sequential
//! scans are expected to cover a contiguous index range; the gap check
//! catches a walk that skipped part of it.

use std::collections::HashSet;
use tracing::{info, warn};

/// Service for tracking scan progress for one chain
#[derive(Debug, Clone)]
pub struct ScanProgressTracker {
    /// Track all indices we've queried
    queried_indices: HashSet<u32>,
    /// The highest index we've queried
    highest_queried_index: u32,
    /// Track if we've queried anything at all
    has_queried: bool,
    /// Addresses found holding balance
    funded: usize,
    /// Batch barriers completed
    batches_completed: usize,
}

impl ScanProgressTracker {
    pub fn new() -> Self {
        Self {
            queried_indices: HashSet::new(),
            highest_queried_index: 0,
            has_queried: false,
            funded: 0,
            batches_completed: 0,
        }
    }

    /// Record that an index was queried, and whether it held balance
    pub fn record_queried(&mut self, index: u32, funded: bool) {
        self.highest_queried_index = self.highest_queried_index.max(index);
        self.has_queried = true;
        self.queried_indices.insert(index);
        if funded {
            self.funded += 1;
        }
    }

    /// Record a completed batch barrier
    pub fn record_batch(&mut self) {
        self.batches_completed += 1;
    }

    /// Check for gaps in queried indices
    ///
    /// Returns a list of (start, end) pairs for missing index ranges.
    pub fn check_for_gaps(&self) -> Vec<(u32, u32)> {
        let mut gaps = Vec::new();

        if self.queried_indices.len() <= 1 {
            return gaps;
        }

        let mut sorted_indices: Vec<u32> = self.queried_indices.iter().copied().collect();
        sorted_indices.sort();

        for window in sorted_indices.windows(2) {
            if window[1] - window[0] > 1 {
                gaps.push((window[0], window[1]));
            }
        }

        gaps
    }

    /// Get scan statistics as a ScanStats struct
    pub fn get_stats(&self) -> ScanStats {
        ScanStats {
            indices_queried: self.queried_indices.len(),
            highest_queried_index: self.highest_queried_index,
            funded: self.funded,
            batches_completed: self.batches_completed,
            gaps: self.check_for_gaps(),
        }
    }

    /// Validate completion, returning an error if nothing was queried.
    ///
    /// Sequential scans pass `require_contiguous` and fail on index gaps;
    /// override scans query a sparse set by design and only log them.
    pub fn validate_completion(&self, require_contiguous: bool) -> Result<(), String> {
        if !self.has_queried {
            return Err("scan completed without querying any address".to_string());
        }

        let gaps = self.check_for_gaps();
        if !gaps.is_empty() {
            if require_contiguous {
                return Err(format!(
                    "scan left {} gaps in the queried index range",
                    gaps.len()
                ));
            }
            for (start, end) in &gaps {
                warn!("Gap between queried indices {} and {}", start, end);
            }
        }

        Ok(())
    }

    /// Log a progress summary
    pub fn log_progress(&self) {
        if self.has_queried {
            info!("Scan progress: {}", self.get_stats().summary());
        }
    }
}

impl Default for ScanProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics about a scan run
#[derive(Debug, Clone)]
pub struct ScanStats {
    pub indices_queried: usize,
    pub highest_queried_index: u32,
    pub funded: usize,
    pub batches_completed: usize,
    pub gaps: Vec<(u32, u32)>,
}

impl ScanStats {
    /// Get a human-readable summary of the scan statistics
    pub fn summary(&self) -> String {
        format!(
            "{} addresses queried up to index {}, {} funded, {} batches{}",
            self.indices_queried,
            self.highest_queried_index,
            self.funded,
            self.batches_completed,
            if self.gaps.is_empty() {
                String::new()
            } else {
                format!(" ({} gaps)", self.gaps.len())
            }
        )
    }
}
