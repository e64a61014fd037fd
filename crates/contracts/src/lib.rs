//! # Contracts
//!
//! Frozen interface contracts shared by every crate of the correlator:
//! channel labels, logical timestamps, stream messages, payloads, operator
//! configuration and the sink trait.
//! Business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Every message carries a [`LogicalTimestamp`], a lexicographically ordered
//!   tuple of integers (producers use `[sim_time_ms]`)
//! - Watermarks certify per channel that no earlier payload will follow

mod blueprint;
mod channel_id;
mod config;
mod error;
mod geometry;
mod message;
mod payload;
mod sink;
mod timestamp;

pub use blueprint::*;
pub use channel_id::ChannelId;
pub use config::*;
pub use error::*;
pub use geometry::*;
pub use message::*;
pub use payload::*;
pub use sink::*;
pub use timestamp::LogicalTimestamp;
