//! # Ingestion Pipeline
//!
//! Channel event ingestion.
//!
//! Responsibilities:
//! - Register input channels and hand out exactly one writer per channel
//! - Fan every writer into one bounded queue of `ChannelEvent`s (backpressure)
//! - Route events to the operators subscribed to their channel
//! - Producers: synthetic driver source and JSON-lines scenario replay
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::{ChannelRouter, IngestionPipeline, SyntheticConfig, SyntheticSource};
//!
//! let mut pipeline = IngestionPipeline::new(100);
//! pipeline.register_channels(channels);
//!
//! let mut router = ChannelRouter::new();
//! let location_rx = router.subscribe("obstacle_location", &location_channels, 100);
//! let router = router.spawn(pipeline.take_receiver().unwrap());
//!
//! let source = SyntheticSource::new(SyntheticConfig::default());
//! let writers = source.start(pipeline.take_senders());
//! ```

mod config;
mod error;
mod pipeline;
mod router;
mod scenario;
mod synthetic;

// Re-exports
pub use config::{IngestionConfig, IngestionMetrics, MetricsSnapshot};
pub use contracts::ChannelEvent;
pub use error::{IngestionError, Result};
pub use pipeline::{join_writers, ChannelReport, ChannelSender, IngestionPipeline};
pub use router::{ChannelRouter, RouterStats};
pub use scenario::Scenario;
pub use synthetic::{SkippedPayload, SyntheticConfig, SyntheticSource};
