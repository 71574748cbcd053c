// 10.0: deterministic identifiers. every node derives the same sub-account for a party
// and the same order ids within a block, so nothing here may depend on local state.

use crate::types::{MarketId, OrderId, PartyId};
use sha3::{Digest, Sha3_256};

const AMM_DERIVATION_VERSION: &str = "AMMv1";

fn sha3_256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha3_256::new();
    hasher.update(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// Sub-account a party's pool trades and holds collateral under.
pub fn derive_amm_party(party: &PartyId, market: &MarketId, index: u64) -> PartyId {
    let preimage = format!("{}{}{}{}", AMM_DERIVATION_VERSION, market, party, index);
    PartyId::new(hex::encode(sha3_256(preimage.as_bytes())))
}

/// Hash chain of ids. Seeded once per block; each id is the hash of the previous one.
#[derive(Debug, Clone)]
pub struct IdGenerator {
    current: [u8; 32],
}

impl IdGenerator {
    pub fn new(seed: &[u8]) -> Self {
        Self { current: sha3_256(seed) }
    }

    /// Seed for one block of one market.
    pub fn for_block(block_hash: &str, market: &MarketId) -> Self {
        Self::new(format!("{}amm-engine{}", block_hash, market).as_bytes())
    }

    pub fn next_id(&mut self) -> String {
        let id = hex::encode(self.current);
        self.current = sha3_256(&self.current);
        id
    }

    pub fn next_order_id(&mut self) -> OrderId {
        OrderId::new(self.next_id())
    }
}
