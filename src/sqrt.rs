// 2.0: deterministic square roots. every curve formula needs sqrt(price) and the same
// handful of bound prices are asked for over and over, so results are memoised.
// no floating point: Decimal's newton iteration is bit for bit identical on every node.

use crate::types::Price;
use rust_decimal::{Decimal, MathematicalOps};
use std::cell::RefCell;
use std::collections::HashMap;

// shape expansion walks many distinct prices; cap the memo so it cannot grow without bound
const MAX_CACHED_ROOTS: usize = 8192;

/// Memoising square root shared by every pool of a market.
#[derive(Debug, Default)]
pub struct Sqrter {
    cache: RefCell<HashMap<Price, Decimal>>,
}

impl Sqrter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sqrt(&self, price: Price) -> Decimal {
        if price.is_zero() {
            return Decimal::ZERO;
        }

        if let Some(root) = self.cache.borrow().get(&price) {
            return *root;
        }

        let root = price
            .value()
            .sqrt()
            .expect("square root of a non-negative price always exists");

        let mut cache = self.cache.borrow_mut();
        if cache.len() >= MAX_CACHED_ROOTS {
            cache.clear();
        }
        cache.insert(price, root);
        root
    }

    pub fn cached(&self) -> usize {
        self.cache.borrow().len()
    }
}
