pub mod keys;
pub mod scan;
pub mod types;

pub use scan::BalanceScanner;
pub use types::*;

use rand::Rng;

/// Generate a random 32-byte hex seed.
pub fn generate_random_seed() -> String {
	let mut seed = [0u8; 32];
	rand::rng().fill(&mut seed);
	hex::encode(seed)
}
