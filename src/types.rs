// 1.0: all the primitives live here. nothing in the engine works without these types.
// IDs, sides, prices, collateral amounts, timestamps. each is a newtype so the compiler catches type mixups.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;

macro_rules! string_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(MarketId);
string_id!(PartyId);
string_id!(AssetId);
string_id!(PoolId);
string_id!(OrderId);

// Buy = the order takes the base asset. Sell = the order gives it up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    // position delta for the party on this side of a fill
    pub fn signed(&self, size: u64) -> i64 {
        let size = i64::try_from(size).unwrap_or(i64::MAX);
        match self {
            Side::Buy => size,
            Side::Sell => -size,
        }
    }
}

// 1.1: price in asset precision. always a non-negative whole number so it behaves
// like an unsigned fixed point value, but it is stored as a Decimal so curve math
// never leaves the decimal domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal")]
pub struct Price(Decimal);

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{0} is not a non-negative whole price")]
pub struct InvalidPrice(pub Decimal);

impl TryFrom<Decimal> for Price {
    type Error = InvalidPrice;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Price::new(value).ok_or(InvalidPrice(value))
    }
}

impl Price {
    #[must_use]
    pub fn new(value: Decimal) -> Option<Self> {
        if value >= Decimal::ZERO && value.fract().is_zero() {
            Some(Self(value.normalize()))
        } else {
            None
        }
    }

    pub fn new_unchecked(value: Decimal) -> Self {
        debug_assert!(value >= Decimal::ZERO && value.fract().is_zero());
        Self(value.normalize())
    }

    pub fn from_u64(value: u64) -> Self {
        Self(Decimal::from(value))
    }

    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn add(&self, other: Price) -> Self {
        Self(self.0 + other.0)
    }

    pub fn saturating_sub(&self, other: Price) -> Self {
        if other.0 >= self.0 {
            Self::zero()
        } else {
            Self(self.0 - other.0)
        }
    }

    // n whole ticks of size `self`
    pub fn times(&self, n: u64) -> Self {
        Self(self.0 * Decimal::from(n))
    }

    pub fn abs_diff(&self, other: Price) -> Self {
        Self((self.0 - other.0).abs())
    }

    // rounds a non-negative decimal down onto the price grid
    pub fn floor(value: Decimal) -> Self {
        Self::new_unchecked(value.max(Decimal::ZERO).floor())
    }

    pub fn ceil(value: Decimal) -> Self {
        Self::new_unchecked(value.max(Decimal::ZERO).ceil())
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// 1.2: collateral amount in asset precision. commitments, balances and transfers use this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote(Decimal);

impl Quote {
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn add(&self, other: Quote) -> Self {
        Self(self.0 + other.0)
    }

    pub fn sub(&self, other: Quote) -> Self {
        Self(self.0 - other.0)
    }
}

impl fmt::Display for Quote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PartialOrd for Quote {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Quote {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

impl Sum for Quote {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), |acc, q| acc.add(q))
    }
}

// 1.3: millisecond timestamp. block time, never wall clock, inside the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(chrono::Utc::now().timestamp_millis())
    }

    pub fn from_millis(ms: i64) -> Self {
        Self(ms)
    }

    pub fn as_millis(&self) -> i64 {
        self.0
    }
}
