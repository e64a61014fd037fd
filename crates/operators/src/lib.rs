//! # Operators
//!
//! 关联引擎之上的感知算子。
//!
//! - `ObstacleLocationFinder`: obstacles + depth + pose (+ camera) -> 带世界坐标的障碍物
//! - `TimeToDecisionOperator`: pose -> 决策时限
//!
//! Each operator is a [`sync_engine::Correlate`] stage; `into_engine` wires it
//! to its input channels.

mod deadline;
mod error;
mod geolocation;
pub mod geometry;
mod obstacle_location;
mod time_to_decision;

pub use deadline::{CalibrationFlag, DeadlineEstimate, DeadlineModel};
pub use error::OperatorError;
pub use geolocation::{DepthSource, GeolocationOutcome, GeolocationResolver};
pub use obstacle_location::{LocationStats, ObstacleLocationFinder, OBSTACLE_LOCATION};
pub use time_to_decision::{TimeToDecisionOperator, TIME_TO_DECISION};
