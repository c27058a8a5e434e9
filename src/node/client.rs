//!
//! HTTP client for Staeon ledger nodes.
//!
//! This module provides an async client for the node-side wallet API:
//! plain-text balance lookups, transaction broadcast, and settings
//! persistence. Each request targets a random node from the configured
//! set, so no single node sees the whole address sequence. All methods
//! are async and designed for use with Tokio.

use super::types::NodeError;
use crate::transaction::Transaction;
use crate::types::{Address, Amount};
use async_trait::async_trait;
use backoff::{ExponentialBackoff, future::retry};
use rand::Rng;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};

/// Staeon ledger node client
#[derive(Clone)]
pub struct StaeonNodeClient {
	/// The underlying HTTP client.
	http_client: Client,
	/// Base URLs of the known node set, scheme included.
	nodes: Vec<String>,
	/// Upper bound on the total time spent retrying one balance lookup.
	retry_budget: Duration,
}

impl StaeonNodeClient {
	/// Create a new node client over a known set of node base URLs.
	///
	/// # Panics
	/// Panics if `nodes` is empty or the HTTP client cannot be built.
	pub fn new(nodes: Vec<String>) -> Self {
		assert!(!nodes.is_empty(), "at least one ledger node is required");

		let http_client = Client::builder()
			.timeout(Duration::from_secs(30))
			.build()
			.expect("Failed to create HTTP client");

		Self {
			http_client,
			nodes,
			retry_budget: Duration::from_secs(10),
		}
	}

	/// Pick a node for the next request.
	fn pick_node(&self) -> &str {
		let idx = rand::rng().random_range(0..self.nodes.len());
		&self.nodes[idx]
	}

	fn retry_policy(&self) -> ExponentialBackoff {
		ExponentialBackoff {
			max_elapsed_time: Some(self.retry_budget),
			..ExponentialBackoff::default()
		}
	}

	/// Fetch the ledger balance of a single address.
	///
	/// Issues `GET <node>/staeon/ledger?address=<address>` and parses the
	/// plain numeric response body. The request is retried with bounded
	/// exponential backoff; each attempt targets a freshly picked node.
	///
	/// # Errors
	/// Returns `NodeError` once the retry budget is exhausted or the
	/// response body is not a valid amount.
	pub async fn fetch_balance(&self, address: &Address) -> Result<Amount, NodeError> {
		let text = retry(self.retry_policy(), || async {
			let url = format!("{}/staeon/ledger", self.pick_node());
			debug!("Fetching balance for {} from {}", address, url);

			let response = self
				.http_client
				.get(&url)
				.query(&[("address", address.as_str())])
				.send()
				.await
				.map_err(backoff::Error::transient)?;

			let response = response
				.error_for_status()
				.map_err(backoff::Error::transient)?;

			response.text().await.map_err(backoff::Error::transient)
		})
		.await
		.map_err(NodeError::Http)?;

		parse_balance_text(&text)
	}

	/// Broadcast a signed transaction.
	///
	/// Issues `POST <node>/staeon/transaction/` with the JSON-serialized
	/// transaction in the `tx` form field. Broadcast is never retried;
	/// resubmitting a spend is the caller's decision.
	///
	/// # Returns
	/// The node's response body on acceptance.
	pub async fn broadcast(&self, tx: &Transaction) -> Result<String, NodeError> {
		let url = format!("{}/staeon/transaction/", self.pick_node());
		let body = serde_json::to_string(tx)?;

		info!("Broadcasting transaction to {}", url);

		let response = self
			.http_client
			.post(&url)
			.form(&[("tx", body.as_str())])
			.send()
			.await?;

		if !response.status().is_success() {
			let status = response.status();
			let detail = response.text().await.unwrap_or_default();
			return Err(NodeError::Rejected(format!("{}: {}", status, detail)));
		}

		Ok(response.text().await?)
	}

	/// Persist a wallet settings entry on the node.
	///
	/// Issues `POST <node>/wallet/update_settings` form-encoded. Used for
	/// the per-chain override list under the `<chain>_cheats` key.
	pub async fn push_settings(&self, key: &str, value: &str) -> Result<(), NodeError> {
		let url = format!("{}/wallet/update_settings", self.pick_node());
		debug!("Persisting setting {} to {}", key, url);

		let response = self
			.http_client
			.post(&url)
			.form(&[(key, value)])
			.send()
			.await?;

		if !response.status().is_success() {
			return Err(NodeError::Rejected(response.status().to_string()));
		}

		Ok(())
	}
}

/// Parse the plain-text body of a balance response.
fn parse_balance_text(text: &str) -> Result<Amount, NodeError> {
	let trimmed = text.trim();
	trimmed.parse().map_err(|source| NodeError::InvalidBalance {
		text: trimmed.to_string(),
		source,
	})
}

/// Balance lookup seam for the scanner.
///
/// Scan strategies depend on this trait rather than the concrete client
/// so they can run against scripted ledgers in tests.
#[async_trait]
pub trait LedgerQuery: Send + Sync {
	async fn balance(&self, address: &Address) -> Result<Amount, NodeError>;
}

#[async_trait]
impl LedgerQuery for StaeonNodeClient {
	async fn balance(&self, address: &Address) -> Result<Amount, NodeError> {
		self.fetch_balance(address).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_plain_balance_bodies() {
		assert_eq!(parse_balance_text("5").unwrap(), "5".parse().unwrap());
		assert_eq!(
			parse_balance_text(" 12.5\n").unwrap(),
			"12.5".parse().unwrap()
		);
		assert_eq!(parse_balance_text("0").unwrap(), Amount::ZERO);
	}

	#[test]
	fn rejects_non_numeric_balance_bodies() {
		assert!(matches!(
			parse_balance_text("<html>busy</html>"),
			Err(NodeError::InvalidBalance { .. })
		));
		assert!(matches!(
			parse_balance_text("-3"),
			Err(NodeError::InvalidBalance { .. })
		));
	}
}
