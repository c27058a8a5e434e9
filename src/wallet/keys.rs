//! Key handling seams for the wallet core.
//!
//! HD derivation arithmetic and the elliptic-curve signing primitive are
//! external collaborators; this module defines the traits the rest of the
//! crate works against, plus a deterministic placeholder keyring for the
//! demo binary and tests.

use crate::types::Address;
use crate::wallet::types::ChainKind;

use bech32::{Bech32m, Hrp};
use rand::{Rng, SeedableRng, rngs::StdRng};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KeyError {
	#[error("key derivation failed: {0}")]
	Derivation(String),

	#[error("signing failed: {0}")]
	Signing(String),
}

/// A derived private key and its address.
///
/// The private key is WIF-encoded and lives only in memory for the span of
/// a balance query or a signing operation; nothing in this crate serializes
/// or persists it.
#[derive(Debug, Clone)]
pub struct KeyPair {
	pub wif: String,
	pub address: Address,
}

/// HD derivation seam: one key pair per (chain, index) position.
pub trait AddressDeriver: Send + Sync {
	fn derive(&self, chain: ChainKind, index: u32) -> Result<KeyPair, KeyError>;
}

/// Signing seam over the elliptic-curve primitive.
///
/// Implementations must be deterministic for a fixed (message, key) pair;
/// transaction reproducibility depends on it.
pub trait MessageSigner: Send + Sync {
	fn sign(&self, message: &str, key: &KeyPair) -> Result<String, KeyError>;
}

/// Deterministic stand-in keyring.
///
/// Derives per-position key material by folding the chain path into a seed
/// and addresses as bech32m `stn` strings. Signatures are deterministic in
/// (message, key) but carry no cryptographic weight; a real HD/EC backend
/// replaces this behind [`AddressDeriver`] and [`MessageSigner`].
pub struct SeededKeyring {
	seed: [u8; 32],
}

impl SeededKeyring {
	/// Build a keyring from a 64-character hex seed.
	pub fn from_hex_seed(seed: &str) -> Result<Self, KeyError> {
		let bytes = hex::decode(seed.trim())
			.map_err(|e| KeyError::Derivation(format!("seed is not valid hex: {}", e)))?;
		let seed: [u8; 32] = bytes
			.try_into()
			.map_err(|_| KeyError::Derivation("seed must be exactly 32 bytes".to_string()))?;
		Ok(Self { seed })
	}

	/// Fold a domain string into the master seed.
	fn mixed_seed(&self, domain: &[u8]) -> [u8; 32] {
		let mut out = self.seed;
		for (i, byte) in domain.iter().enumerate() {
			let slot = i % out.len();
			out[slot] = out[slot].rotate_left(3) ^ *byte;
		}
		out
	}
}

impl AddressDeriver for SeededKeyring {
	fn derive(&self, chain: ChainKind, index: u32) -> Result<KeyPair, KeyError> {
		let path = format!("{}/{}", chain.as_str(), index);
		let mut rng = StdRng::from_seed(self.mixed_seed(path.as_bytes()));

		let mut priv_bytes = [0u8; 32];
		rng.fill(&mut priv_bytes);
		let mut addr_bytes = [0u8; 20];
		rng.fill(&mut addr_bytes);

		let encoded = bech32::encode::<Bech32m>(
			Hrp::parse("stn").expect("Failed while bech32 parsing"),
			&addr_bytes,
		)
		.map_err(|e| KeyError::Derivation(format!("address encoding failed: {}", e)))?;

		Ok(KeyPair {
			wif: hex::encode(priv_bytes),
			address: Address::new(encoded),
		})
	}
}

impl MessageSigner for SeededKeyring {
	fn sign(&self, message: &str, key: &KeyPair) -> Result<String, KeyError> {
		let priv_bytes = hex::decode(&key.wif)
			.map_err(|e| KeyError::Signing(format!("invalid key encoding: {}", e)))?;

		let mut state = [0u8; 32];
		for (i, byte) in priv_bytes.iter().chain(message.as_bytes()).enumerate() {
			let slot = i % state.len();
			state[slot] = state[slot].rotate_left(5) ^ *byte;
		}

		let mut rng = StdRng::from_seed(state);
		let mut sig = [0u8; 64];
		rng.fill(&mut sig);
		Ok(hex::encode(sig))
	}
}
