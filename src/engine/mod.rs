pub mod aggregator;
pub mod core;
pub mod energy;
pub mod momentum;
pub mod stints;
pub mod validator;

pub use aggregator::{ReconciliationReport, StatAggregator};
pub use self::core::{GameEventEngine, GameHandle, ReplayedGame};
pub use energy::EnergyModel;
pub use momentum::MomentumCalculator;
pub use stints::LineupStintTracker;
pub use validator::{validate_event, ValidationContext};
