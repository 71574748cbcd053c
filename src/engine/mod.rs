// 8.0: AMM engine for one market. owns every pool, runs their lifecycle commands,
// keeps their sub-accounts funded and answers the matching engine's queries.
// deterministic and event-driven with no external I/O.

mod config;
mod core;
mod funding;
mod lifecycle;
mod matching;
mod results;

pub use self::core::{Engine, EngineSnapshot};
pub use config::EngineConfig;
pub use matching::MatchingPass;
pub use results::{BestPrices, EngineError};
