mod node;
mod transaction;
mod types;
mod utils;
mod wallet;

use std::sync::Arc;
use tracing::{error, info};

use crate::node::StaeonNodeClient;
use crate::transaction::{Output, TransactionBuilder};
use crate::types::{Address, Amount};
use crate::utils::format_amount;
use crate::wallet::BalanceScanner;
use crate::wallet::keys::{AddressDeriver, SeededKeyring};
use crate::wallet::scan::cancel::CancelToken;
use crate::wallet::scan::persistence::NodeSettingsRepository;
use crate::wallet::scan::strategies::ScanConfig;
use crate::wallet::types::ChainKind;

#[tokio::main(flavor = "current_thread")]
async fn main() {
	tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::from_default_env()
				.add_directive("staeon_wallet=debug".parse().unwrap())
				.add_directive(tracing::Level::INFO.into()),
		)
		.with_target(false)
		.with_thread_ids(false)
		.with_thread_names(false)
		.with_file(false)
		.with_line_number(false)
		.with_timer(tracing_subscriber::fmt::time::time())
		.init();

	info!("Starting wallet");

	let nodes: Vec<String> = std::env::var("STAEON_NODES")
		.map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
		.unwrap_or_else(|_| vec!["http://localhost:8000".to_string()]);
	let client = StaeonNodeClient::new(nodes);

	info!("Created node client");

	let seed = std::env::var("STAEON_SEED").unwrap_or_else(|_| wallet::generate_random_seed());
	let keyring = match SeededKeyring::from_hex_seed(&seed) {
		Ok(keyring) => Arc::new(keyring),
		Err(e) => {
			error!("Failed to load wallet seed: {:?}", e);
			return;
		}
	};

	info!("Created keyring");

	// Session settings normally arrive with the login response; a fresh
	// session carries no overrides and scans sequentially.
	let repository = Arc::new(NodeSettingsRepository::new(
		client.clone(),
		Default::default(),
	));

	let scanner = BalanceScanner::new(
		Arc::new(client.clone()),
		keyring.clone(),
		repository,
		ScanConfig::default(),
	);

	info!("Created balance scanner");

	let (deposits, change) = match scanner.scan_all(CancelToken::never()).await {
		Ok(maps) => maps,
		Err(e) => {
			error!("Balance discovery failed: {:?}", e);
			return;
		}
	};

	info!(
		"Discovered balance: {} on deposit, {} on change",
		format_amount(deposits.total_balance()),
		format_amount(change.total_balance())
	);

	let inputs = deposits.spendable_inputs();
	if inputs.is_empty() {
		info!("No spendable funds discovered, nothing to do");
		return;
	}

	let destination = match std::env::var("STAEON_DEST") {
		Ok(encoded) => Address::new(encoded),
		Err(_) => {
			info!("No STAEON_DEST set, not spending");
			return;
		}
	};

	let change_key = match keyring.derive(ChainKind::Change, change.next_unused_index()) {
		Ok(pair) => pair,
		Err(e) => {
			error!("Failed to derive change address: {:?}", e);
			return;
		}
	};

	let amount: Amount = "1".parse().unwrap(); // 1 coin

	let transaction = match TransactionBuilder::new()
		.with_inputs(inputs)
		.with_outputs(vec![Output::new(destination, amount)])
		.with_change_address(change_key.address)
		.build(keyring.as_ref())
	{
		Ok(tx) => tx,
		Err(e) => {
			error!("Failed to build transaction: {}", e);
			return;
		}
	};

	info!("Created transaction");

	info!("Sending transaction");

	match client.broadcast(&transaction).await {
		Ok(body) => {
			info!("Transaction accepted: {}", body);
			info!("{:#?}", transaction);
		}
		Err(e) => {
			error!("Failed to broadcast transaction: {}", e);
		}
	}
}
