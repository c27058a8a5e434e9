//! Ledger node integration module
//!
//! This module provides the client and types for talking to Staeon ledger
//! nodes over plain HTTP: balance lookups, transaction broadcast, and
//! wallet settings persistence.

/// HTTP client for interacting with ledger nodes
mod client;
/// Type definitions and errors for node communication
mod types;

pub use client::{LedgerQuery, StaeonNodeClient};
pub use types::*;
