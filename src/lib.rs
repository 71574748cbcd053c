// amm-core: AMM liquidity pool engine for a deterministic derivatives exchange.
// a party commits collateral to a concentrated liquidity curve that trades as a
// virtual counterparty inside the order book.
// all computation is deterministic with no external I/O.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: ids, Side, Price, Quote, Timestamp
//   1.1  sqrt.rs: memoising decimal square root
//   2.x  commands.rs: submit/amend/cancel commands, curve parameters
//   2.1  order.rs: incoming and generated orders
//   3.x  market.rs: market context and risk inputs
//   4.x  curve.rs: liquidity curve generation and volume queries
//   4.1  estimator.rs: closed form curve formulas for previewing a pool
//   5.x  cache.rs: single slot fair price and best price cache
//   7.x  pool/: pool construction, pricing, snapshot
//   8.x  engine/: lifecycle, funding, matching helpers
//   9.x  shape.rs: curve to discrete orders
//   10.x collateral.rs: collateral collaborator + in-memory ledger
//   10.1 position.rs: position collaborator + in-memory book
//   11.x events.rs: state transition events
//   12.x idgen.rs: deterministic sub-account and order ids

// curve math
pub mod curve;
pub mod estimator;
pub mod sqrt;
pub mod types;

// pools and engine
pub mod cache;
pub mod commands;
pub mod engine;
pub mod events;
pub mod idgen;
pub mod market;
pub mod order;
pub mod pool;
pub mod shape;

// collaborators
pub mod collateral;
pub mod position;

// re exports for convenience
pub use collateral::*;
pub use commands::*;
pub use curve::{Curve, CurveSide};
pub use engine::*;
pub use estimator::{estimate, EstimateInputs, EstimatedBounds};
pub use events::*;
pub use idgen::{derive_amm_party, IdGenerator};
pub use market::*;
pub use order::*;
pub use pool::{Pool, PoolError, PoolLimits, PoolSnapshot, PoolStatus};
pub use position::*;
pub use shape::ShapeResult;
pub use sqrt::Sqrter;
pub use types::*;
