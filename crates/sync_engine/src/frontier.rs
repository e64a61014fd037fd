//! Watermark frontier: per-timestamp certification tracking.
//!
//! A channel certifies timestamp `T` with a watermark equal to `T` or with any
//! later watermark. Entries are created lazily the first time a watermark for
//! `T` is observed and removed once `T` resolves.

use std::collections::BTreeMap;

use contracts::LogicalTimestamp;

/// Outcome of one pending timestamp, reported in ascending timestamp order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// Every channel certified the timestamp; the stage should fire
    Ready(LogicalTimestamp),
    /// Superseded before full certification; dropped without firing
    Skipped(LogicalTimestamp),
}

impl Readiness {
    pub fn timestamp(&self) -> &LogicalTimestamp {
        match self {
            Self::Ready(t) | Self::Skipped(t) => t,
        }
    }
}

#[derive(Debug, Clone)]
struct Certification {
    certified: Vec<bool>,
    count: usize,
}

impl Certification {
    fn mark(&mut self, channel_idx: usize) {
        if let Some(slot) = self.certified.get_mut(channel_idx) {
            if !*slot {
                *slot = true;
                self.count += 1;
            }
        }
    }
}

/// 同步前沿
///
/// Tracks pending timestamps and the highest resolved one. Nothing at or below
/// the resolved frontier is ever created again, so each timestamp resolves at
/// most once and resolutions are strictly increasing.
#[derive(Debug)]
pub struct WatermarkFrontier {
    channel_count: usize,
    pending: BTreeMap<LogicalTimestamp, Certification>,
    resolved: Option<LogicalTimestamp>,
    max_pending: usize,
}

impl WatermarkFrontier {
    pub fn new(channel_count: usize, max_pending: usize) -> Self {
        Self {
            channel_count,
            pending: BTreeMap::new(),
            resolved: None,
            max_pending: max_pending.max(1),
        }
    }

    /// Observe a watermark accepted on channel `channel_idx`.
    ///
    /// `watermarks` holds the latest watermark of every channel, already
    /// including `watermark` itself. Returns the resolved timestamps in
    /// ascending order.
    pub fn observe(
        &mut self,
        channel_idx: usize,
        watermark: &LogicalTimestamp,
        watermarks: &[Option<LogicalTimestamp>],
    ) -> Vec<Readiness> {
        if !self.is_resolved(watermark) && !self.pending.contains_key(watermark) {
            let certified: Vec<bool> = (0..self.channel_count)
                .map(|idx| {
                    watermarks
                        .get(idx)
                        .and_then(Option::as_ref)
                        .is_some_and(|wm| wm >= watermark)
                })
                .collect();
            let count = certified.iter().filter(|c| **c).count();
            self.pending
                .insert(watermark.clone(), Certification { certified, count });
        }

        for certification in self.pending.range_mut(..=watermark.clone()).map(|(_, c)| c) {
            certification.mark(channel_idx);
        }

        let mut resolutions = Vec::new();

        let greatest_ready = self
            .pending
            .iter()
            .rev()
            .find(|(_, c)| c.count == self.channel_count)
            .map(|(t, _)| t.clone());

        if let Some(ready) = greatest_ready {
            let mut later = self.pending.split_off(&ready);
            let ready_entry = later.remove(&ready);
            let earlier = std::mem::replace(&mut self.pending, later);

            for (timestamp, certification) in earlier {
                if certification.count == self.channel_count {
                    resolutions.push(Readiness::Ready(timestamp));
                } else {
                    resolutions.push(Readiness::Skipped(timestamp));
                }
            }
            if ready_entry.is_some() {
                resolutions.push(Readiness::Ready(ready.clone()));
            }
            self.resolved = Some(ready);
        }

        while self.pending.len() > self.max_pending {
            match self.pending.pop_first() {
                Some((timestamp, _)) => {
                    self.resolved = Some(timestamp.clone());
                    resolutions.push(Readiness::Skipped(timestamp));
                }
                None => break,
            }
        }

        resolutions
    }

    /// Highest resolved timestamp, if any
    pub fn resolved(&self) -> Option<&LogicalTimestamp> {
        self.resolved.as_ref()
    }

    /// Whether `timestamp` is at or below the resolved frontier
    pub fn is_resolved(&self, timestamp: &LogicalTimestamp) -> bool {
        self.resolved.as_ref().is_some_and(|r| timestamp <= r)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Channels that certified `timestamp`, `None` if it is not pending
    pub fn certified_count(&self, timestamp: &LogicalTimestamp) -> Option<usize> {
        self.pending.get(timestamp).map(|c| c.count)
    }

    /// Drop every pending entry; returns how many were dropped.
    pub fn clear(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(t: u64) -> LogicalTimestamp {
        LogicalTimestamp::from(t)
    }

    /// Feeds watermarks into a frontier the way the engine does.
    struct Harness {
        frontier: WatermarkFrontier,
        watermarks: Vec<Option<LogicalTimestamp>>,
    }

    impl Harness {
        fn new(channels: usize, max_pending: usize) -> Self {
            Self {
                frontier: WatermarkFrontier::new(channels, max_pending),
                watermarks: vec![None; channels],
            }
        }

        fn watermark(&mut self, channel: usize, t: u64) -> Vec<Readiness> {
            self.watermarks[channel] = Some(ts(t));
            self.frontier.observe(channel, &ts(t), &self.watermarks)
        }
    }

    #[test]
    fn test_fires_only_after_every_channel() {
        let mut h = Harness::new(3, 16);
        assert!(h.watermark(0, 5).is_empty());
        assert!(h.watermark(1, 5).is_empty());
        assert_eq!(h.frontier.certified_count(&ts(5)), Some(2));

        assert_eq!(h.watermark(2, 5), vec![Readiness::Ready(ts(5))]);
        assert_eq!(h.frontier.resolved(), Some(&ts(5)));
        assert_eq!(h.frontier.pending_len(), 0);
    }

    #[test]
    fn test_later_watermark_certifies_earlier_timestamps() {
        let mut h = Harness::new(2, 16);
        h.watermark(0, 5);
        h.watermark(0, 6);

        // a single watermark at 7 on the other channel certifies 5 and 6
        assert_eq!(
            h.watermark(1, 7),
            vec![Readiness::Ready(ts(5)), Readiness::Ready(ts(6))]
        );
        assert_eq!(h.frontier.certified_count(&ts(7)), Some(1));

        assert_eq!(h.watermark(0, 8), vec![Readiness::Ready(ts(7))]);
    }

    #[test]
    fn test_entry_sees_existing_watermarks() {
        let mut h = Harness::new(2, 16);
        h.watermark(0, 9);
        // channel 0 is already at 9 when 4 first appears on channel 1
        assert_eq!(h.watermark(1, 4), vec![Readiness::Ready(ts(4))]);
    }

    #[test]
    fn test_never_recreates_resolved_timestamp() {
        let mut h = Harness::new(2, 16);
        h.watermark(0, 5);
        h.watermark(1, 5);

        h.watermark(0, 6);
        h.watermark(1, 6);
        assert_eq!(h.frontier.resolved(), Some(&ts(6)));

        // the frontier ignores anything at or below what it already resolved
        let out = h.frontier.observe(0, &ts(5), &h.watermarks.clone());
        assert!(out.is_empty());
        assert_eq!(h.frontier.pending_len(), 0);
    }

    #[test]
    fn test_resolutions_strictly_increase() {
        let mut h = Harness::new(2, 64);
        let mut fired = Vec::new();
        for t in 1..=20u64 {
            fired.extend(h.watermark((t % 2) as usize, t));
            fired.extend(h.watermark(((t + 1) % 2) as usize, t));
        }
        let timestamps: Vec<_> = fired.iter().map(|r| r.timestamp().clone()).collect();
        assert_eq!(timestamps.len(), 20);
        assert!(timestamps.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_pending_cap_skips_oldest() {
        let mut h = Harness::new(2, 2);
        assert!(h.watermark(0, 1).is_empty());
        assert!(h.watermark(0, 2).is_empty());
        assert_eq!(h.watermark(0, 3), vec![Readiness::Skipped(ts(1))]);
        assert_eq!(h.frontier.resolved(), Some(&ts(1)));

        assert_eq!(
            h.watermark(1, 3),
            vec![Readiness::Ready(ts(2)), Readiness::Ready(ts(3))]
        );
    }

    #[test]
    fn test_clear() {
        let mut h = Harness::new(2, 8);
        h.watermark(0, 1);
        h.watermark(0, 2);
        assert_eq!(h.frontier.clear(), 2);
        assert_eq!(h.frontier.pending_len(), 0);
    }
}
