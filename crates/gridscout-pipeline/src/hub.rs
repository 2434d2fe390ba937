//! Per-job publish/subscribe for live progress.
//!
//! A job publishes whether or not anyone listens. Listeners come and go; a
//! listener that disconnects never affects the job. Once the terminal message
//! is published the channel is dropped, and anyone arriving later has to use
//! the stored status and results instead.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use futures::stream::{self, Stream};
use tokio::sync::broadcast;

use crate::messages::ProgressMessage;

/// Buffered messages per job before a slow listener starts skipping.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug)]
pub struct ProgressHub {
    channels: Mutex<HashMap<String, broadcast::Sender<ProgressMessage>>>,
    capacity: usize,
}

impl Default for ProgressHub {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl ProgressHub {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    // Critical sections never panic, so a poisoned lock still holds a
    // consistent map.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, broadcast::Sender<ProgressMessage>>> {
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Subscribes to `job_id`, creating its channel if the job has not
    /// published yet. Subscribing before the job starts guarantees the
    /// listener sees the `start` message.
    pub fn open(&self, job_id: &str) -> broadcast::Receiver<ProgressMessage> {
        let mut channels = self.lock();
        channels
            .entry(job_id.to_owned())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Like [`ProgressHub::open`], but only for a job id that is not live.
    ///
    /// Returns `None` when a job with this id is already publishing.
    pub fn open_new(&self, job_id: &str) -> Option<broadcast::Receiver<ProgressMessage>> {
        let mut channels = self.lock();
        if channels.contains_key(job_id) {
            return None;
        }
        let (tx, rx) = broadcast::channel(self.capacity);
        channels.insert(job_id.to_owned(), tx);
        Some(rx)
    }

    /// Subscribes to a job that is currently live.
    pub fn subscribe(&self, job_id: &str) -> Option<broadcast::Receiver<ProgressMessage>> {
        self.lock().get(job_id).map(broadcast::Sender::subscribe)
    }

    #[must_use]
    pub fn is_live(&self, job_id: &str) -> bool {
        self.lock().contains_key(job_id)
    }

    #[must_use]
    pub fn subscriber_count(&self, job_id: &str) -> usize {
        self.lock()
            .get(job_id)
            .map_or(0, broadcast::Sender::receiver_count)
    }

    /// Number of jobs with an open channel.
    #[must_use]
    pub fn live_jobs(&self) -> usize {
        self.lock().len()
    }

    /// Creates the channel for `job_id` if it does not exist yet.
    pub fn register(&self, job_id: &str) {
        let mut channels = self.lock();
        channels
            .entry(job_id.to_owned())
            .or_insert_with(|| broadcast::channel(self.capacity).0);
    }

    /// Sends `message` to every current listener of `job_id`.
    ///
    /// A terminal message closes the channel after delivery; listeners drain
    /// what is buffered and then see the stream end.
    pub fn publish(&self, job_id: &str, message: ProgressMessage) {
        let terminal = message.is_terminal();
        let mut channels = self.lock();

        if let Some(tx) = channels.get(job_id) {
            if tx.send(message).is_err() {
                tracing::trace!(job_id, "no live listeners for progress message");
            }
        }
        if terminal {
            channels.remove(job_id);
        }
    }
}

/// Adapts a subscription into a stream that ends when the job's channel
/// closes. Messages missed by a lagging listener are skipped.
pub fn message_stream(
    rx: broadcast::Receiver<ProgressMessage>,
) -> impl Stream<Item = ProgressMessage> + Send + 'static {
    stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(message) => return Some((message, rx)),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "progress listener lagged, skipping messages");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn start(total: u64) -> ProgressMessage {
        ProgressMessage::Start { total }
    }

    fn done() -> ProgressMessage {
        ProgressMessage::Error {
            message: "stop".to_owned(),
        }
    }

    #[tokio::test]
    async fn subscriber_receives_messages_in_publish_order() {
        let hub = ProgressHub::default();
        let rx = hub.open("job-1");

        hub.publish("job-1", start(4));
        hub.publish(
            "job-1",
            ProgressMessage::CostUpdate {
                cost: rust_decimal::Decimal::ONE,
                api_calls: 1,
            },
        );
        hub.publish("job-1", done());

        let received: Vec<&'static str> = message_stream(rx)
            .map(|m| m.kind())
            .collect()
            .await;
        assert_eq!(received, vec!["start", "cost-update", "error"]);
    }

    #[test]
    fn terminal_message_closes_channel() {
        let hub = ProgressHub::default();
        let _rx = hub.open("job-1");
        assert!(hub.is_live("job-1"));

        hub.publish("job-1", done());
        assert!(!hub.is_live("job-1"));
        assert!(hub.subscribe("job-1").is_none());
    }

    #[test]
    fn publish_without_listeners_is_harmless() {
        let hub = ProgressHub::default();
        hub.register("job-1");
        hub.publish("job-1", start(1));
        hub.publish("unknown", start(1));
        assert!(hub.is_live("job-1"));
        assert_eq!(hub.subscriber_count("job-1"), 0);
    }

    #[tokio::test]
    async fn dropped_listener_does_not_affect_others() {
        let hub = ProgressHub::default();
        let first = hub.open("job-1");
        let second = hub.subscribe("job-1").unwrap();
        assert_eq!(hub.subscriber_count("job-1"), 2);
        drop(first);

        hub.publish("job-1", start(2));
        hub.publish("job-1", done());

        let received: Vec<ProgressMessage> = message_stream(second).collect().await;
        assert_eq!(received.len(), 2);
        assert_eq!(hub.live_jobs(), 0);
    }

    #[tokio::test]
    async fn lagging_listener_skips_to_newest_messages() {
        let hub = ProgressHub::new(2);
        let rx = hub.open("job-1");

        for total in 0..5 {
            hub.publish("job-1", start(total));
        }
        hub.publish("job-1", done());

        let received: Vec<ProgressMessage> = message_stream(rx).collect().await;
        assert_eq!(received.last(), Some(&done()));
        assert!(received.len() <= 2, "got {received:?}");
    }

    #[test]
    fn open_new_refuses_live_job_ids() {
        let hub = ProgressHub::default();
        assert!(hub.open_new("job-1").is_some());
        assert!(hub.open_new("job-1").is_none());

        hub.publish("job-1", done());
        assert!(hub.open_new("job-1").is_some(), "id is reusable once finished");
    }

    #[test]
    fn channels_are_isolated_per_job() {
        let hub = ProgressHub::default();
        let mut a = hub.open("a");
        let mut b = hub.open("b");

        hub.publish("a", start(1));
        assert_eq!(a.try_recv().unwrap(), start(1));
        assert!(b.try_recv().is_err());
    }
}
