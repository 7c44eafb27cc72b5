//! Strategy selection
//!
//! - `classifier` - Protocol to risk tier lookup
//! - `trend` - Reference asset downtrend check
//! - `selector` - Best pool per tier
//! - `engine` - Cycle driver and scheduler

pub mod types;

pub mod classifier;
pub mod engine;
pub mod selector;
pub mod trend;

pub use classifier::{
    strategy_id, ClassifiedPool, ProtocolRiskTable, RandomRiskScorer, RiskClassifier, RiskScorer,
};
pub use engine::{CycleOutcome, StrategyEngine};
pub use selector::StrategySelector;
pub use trend::{detect_downtrend, TrendDetector, MIN_TREND_SAMPLES};
pub use types::*;
