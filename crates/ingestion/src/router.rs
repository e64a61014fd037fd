//! Channel router
//!
//! Forwards events from the shared ingestion queue to every operator that
//! subscribed to the event's channel. A channel feeding two operators (e.g.
//! `pose`) is cloned into both queues.

use std::collections::HashMap;

use async_channel::{bounded, Receiver, Sender};
use contracts::{ChannelEvent, ChannelId, Payload};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, trace, warn};

/// Routing totals
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouterStats {
    /// Events read from the input queue
    pub received: u64,
    /// Deliveries to subscriber queues (one event may count several times)
    pub delivered: u64,
    /// Events on channels nobody subscribed to
    pub unrouted: u64,
}

struct Subscriber {
    name: String,
    tx: Sender<ChannelEvent<Payload>>,
}

/// Fan-out from the ingestion queue to per-operator queues
#[derive(Default)]
pub struct ChannelRouter {
    subscribers: Vec<Subscriber>,
    routes: HashMap<ChannelId, Vec<usize>>,
}

impl ChannelRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `name` to `channels`; returns that subscriber's queue
    pub fn subscribe(
        &mut self,
        name: &str,
        channels: &[ChannelId],
        capacity: usize,
    ) -> Receiver<ChannelEvent<Payload>> {
        let (tx, rx) = bounded(capacity.max(1));
        let index = self.subscribers.len();
        self.subscribers.push(Subscriber {
            name: name.to_string(),
            tx,
        });
        for channel in channels {
            let route = self.routes.entry(channel.clone()).or_default();
            if !route.contains(&index) {
                route.push(index);
            }
        }
        debug!(subscriber = name, channels = ?channels, "subscriber registered");
        rx
    }

    /// Channels with at least one subscriber
    pub fn channels(&self) -> Vec<ChannelId> {
        let mut channels: Vec<ChannelId> = self.routes.keys().cloned().collect();
        channels.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        channels
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Route until the input closes or every subscriber is gone.
    ///
    /// Subscriber queues close when this returns, which lets the operators
    /// drain and stop.
    #[instrument(name = "channel_router", skip_all, fields(subscribers = self.subscribers.len()))]
    pub async fn run(mut self, input: Receiver<ChannelEvent<Payload>>) -> RouterStats {
        let mut stats = RouterStats::default();

        while let Ok(event) = input.recv().await {
            stats.received += 1;

            let Some(route) = self.routes.get(&event.channel) else {
                stats.unrouted += 1;
                trace!(channel = %event.channel, "no subscriber for channel");
                continue;
            };

            // the last subscriber takes the event, earlier ones get clones
            let targets: Vec<usize> = route
                .iter()
                .copied()
                .filter(|&i| !self.subscribers[i].tx.is_closed())
                .collect();
            let Some((&last, rest)) = targets.split_last() else {
                continue;
            };
            for &i in rest {
                self.deliver(i, event.clone(), &mut stats).await;
            }
            self.deliver(last, event, &mut stats).await;

            if self.subscribers.iter().all(|s| s.tx.is_closed()) {
                warn!("all subscribers closed, router stopping");
                break;
            }
        }

        for subscriber in &self.subscribers {
            subscriber.tx.close();
        }
        self.subscribers.clear();

        info!(
            received = stats.received,
            delivered = stats.delivered,
            unrouted = stats.unrouted,
            "channel router stopped"
        );
        stats
    }

    pub fn spawn(self, input: Receiver<ChannelEvent<Payload>>) -> JoinHandle<RouterStats> {
        tokio::spawn(self.run(input))
    }

    async fn deliver(&self, index: usize, event: ChannelEvent<Payload>, stats: &mut RouterStats) {
        let subscriber = &self.subscribers[index];
        if subscriber.tx.send(event).await.is_ok() {
            stats.delivered += 1;
        } else {
            debug!(subscriber = %subscriber.name, "subscriber queue closed");
        }
    }
}
