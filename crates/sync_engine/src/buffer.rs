//! Per-channel FIFO buffer with watermark tracking.
//!
//! Uses index-based separation:
//! - HeapRb stores lightweight metadata (timestamp + slab key)
//! - Slab stores the owned payloads
//!
//! Entries are kept in arrival order and never re-sorted; the correlation
//! stage only ever looks at the head.

use std::fmt;

use contracts::{ChannelId, LogicalTimestamp};
use ringbuf::{traits::*, HeapRb};
use slab::Slab;

use crate::SyncError;

/// Lightweight metadata stored in ring buffer
#[derive(Debug, Clone)]
struct PayloadMeta {
    /// Timestamp carried by the payload message
    timestamp: LogicalTimestamp,
    /// Key into the slab storage
    slab_key: usize,
}

/// Rejected-message counters of one channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelCounters {
    pub accepted: u64,
    pub out_of_order: u64,
    pub overflow: u64,
    pub discarded: u64,
}

/// State of one input channel: pending payloads plus the latest watermark.
pub struct ChannelBuffer<T> {
    channel: ChannelId,
    /// Ring buffer of metadata in arrival order
    index: HeapRb<PayloadMeta>,
    /// Owned payload storage
    storage: Slab<T>,
    max_depth: usize,
    watermark: Option<LogicalTimestamp>,
    counters: ChannelCounters,
}

impl<T> fmt::Debug for ChannelBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelBuffer")
            .field("channel", &self.channel)
            .field("len", &self.index.occupied_len())
            .field("max_depth", &self.max_depth)
            .field("watermark", &self.watermark)
            .finish()
    }
}

impl<T> ChannelBuffer<T> {
    /// Create an empty buffer holding at most `max_depth` payloads
    pub fn new(channel: ChannelId, max_depth: usize) -> Self {
        let max_depth = max_depth.max(1);
        Self {
            channel,
            index: HeapRb::new(max_depth),
            storage: Slab::with_capacity(max_depth.min(64)),
            max_depth,
            watermark: None,
            counters: ChannelCounters::default(),
        }
    }

    /// Append a payload at the tail.
    ///
    /// # Errors
    /// - `OutOfOrder` if `timestamp` is strictly below the last watermark
    /// - `BufferOverflow` if the depth cap is reached (nothing is evicted)
    pub fn push_payload(
        &mut self,
        timestamp: LogicalTimestamp,
        payload: T,
    ) -> Result<(), SyncError> {
        if let Some(watermark) = &self.watermark {
            if &timestamp < watermark {
                self.counters.out_of_order += 1;
                return Err(SyncError::OutOfOrder {
                    channel: self.channel.clone(),
                    timestamp,
                    watermark: watermark.clone(),
                });
            }
        }

        if self.index.is_full() {
            self.counters.overflow += 1;
            return Err(SyncError::BufferOverflow {
                channel: self.channel.clone(),
                depth: self.index.occupied_len(),
                max: self.max_depth,
            });
        }

        let slab_key = self.storage.insert(payload);
        if let Err(meta) = self.index.try_push(PayloadMeta {
            timestamp,
            slab_key,
        }) {
            // unreachable while the fullness check above holds
            self.storage.remove(meta.slab_key);
            self.counters.overflow += 1;
            return Err(SyncError::BufferOverflow {
                channel: self.channel.clone(),
                depth: self.index.occupied_len(),
                max: self.max_depth,
            });
        }
        self.counters.accepted += 1;
        Ok(())
    }

    /// Record a new watermark.
    ///
    /// # Errors
    /// `Regression` if `timestamp` is not strictly greater than the previous one.
    pub fn push_watermark(&mut self, timestamp: LogicalTimestamp) -> Result<(), SyncError> {
        if let Some(previous) = &self.watermark {
            if &timestamp <= previous {
                return Err(SyncError::Regression {
                    channel: self.channel.clone(),
                    previous: previous.clone(),
                    received: timestamp,
                });
            }
        }
        self.watermark = Some(timestamp);
        Ok(())
    }

    /// Remove and return the oldest payload with its timestamp.
    ///
    /// # Errors
    /// `EmptyBuffer` when nothing is buffered; the reported timestamp is the
    /// channel's current watermark (or empty when none was seen yet).
    pub fn pop_front(&mut self) -> Result<(LogicalTimestamp, T), SyncError> {
        match self.index.try_pop() {
            Some(meta) => Ok((meta.timestamp, self.storage.remove(meta.slab_key))),
            None => Err(SyncError::EmptyBuffer {
                channel: self.channel.clone(),
                timestamp: self.watermark.clone().unwrap_or_default(),
            }),
        }
    }

    /// Timestamp of the head entry
    #[inline]
    pub fn peek_timestamp(&self) -> Option<&LogicalTimestamp> {
        self.index.iter().next().map(|meta| &meta.timestamp)
    }

    /// Drop head entries with timestamp `<= through`; returns how many were dropped.
    pub fn discard_through(&mut self, through: &LogicalTimestamp) -> usize {
        let mut dropped = 0;
        while self
            .index
            .iter()
            .next()
            .is_some_and(|meta| &meta.timestamp <= through)
        {
            if let Some(meta) = self.index.try_pop() {
                self.storage.remove(meta.slab_key);
                dropped += 1;
            }
        }
        self.counters.discarded += dropped as u64;
        dropped
    }

    /// Drop every buffered payload; returns how many were dropped.
    pub fn clear(&mut self) -> usize {
        let dropped = self.index.pop_iter().count();
        self.storage.clear();
        self.counters.discarded += dropped as u64;
        dropped
    }

    #[inline]
    pub fn channel(&self) -> &ChannelId {
        &self.channel
    }

    /// Latest watermark seen on this channel
    #[inline]
    pub fn watermark(&self) -> Option<&LogicalTimestamp> {
        self.watermark.as_ref()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.index.occupied_len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    #[inline]
    pub fn counters(&self) -> ChannelCounters {
        self.counters
    }
}
