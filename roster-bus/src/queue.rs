use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use tokio::sync::{watch, Mutex, Notify};
use tracing::warn;

use roster_core::ChannelKey;

use crate::error::BusError;
use crate::types::Envelope;

/// A single bounded FIFO queue, internally partitioned by [`ChannelKey`] so that
/// two conversations never head-of-line block each other (§4.1).
///
/// Partitions are drained in round-robin order: each call to `next` pops one
/// envelope from whichever partition is least-recently served, preserving
/// strict FIFO order *within* a partition while giving every conversation a
/// fair turn.
pub struct PartitionedQueue {
    name: &'static str,
    capacity: usize,
    inner: Mutex<Inner>,
    notify: Notify,
}

struct Inner {
    partitions: HashMap<ChannelKey, VecDeque<Envelope>>,
    ready: VecDeque<ChannelKey>,
    in_ready: HashSet<ChannelKey>,
    len: usize,
}

impl PartitionedQueue {
    pub fn new(name: &'static str, capacity: usize) -> Self {
        Self {
            name,
            capacity,
            inner: Mutex::new(Inner {
                partitions: HashMap::new(),
                ready: VecDeque::new(),
                in_ready: HashSet::new(),
                len: 0,
            }),
            notify: Notify::new(),
        }
    }

    /// Blocking publish: waits for room if the queue is at capacity. Used by
    /// channel adapters per §4.1 ("channel adapters block").
    pub async fn publish(&self, env: Envelope) {
        loop {
            {
                let mut inner = self.inner.lock().await;
                if inner.len < self.capacity {
                    inner.push(env);
                    drop(inner);
                    self.notify.notify_one();
                    return;
                }
            }
            self.notify.notified().await;
        }
    }

    /// Non-blocking publish for internal producers, which "never block and
    /// instead escalate by logging a warning" (§4.1) when the queue is full.
    pub async fn try_publish(&self, env: Envelope) -> Result<(), BusError> {
        let partition = env.channel_key();
        let mut inner = self.inner.lock().await;
        if inner.len >= self.capacity {
            warn!(queue = self.name, partition = %partition, "bus queue full, envelope dropped");
            return Err(BusError::QueueFull {
                queue: self.name.to_string(),
                partition: partition.to_string(),
            });
        }
        inner.push(env);
        drop(inner);
        self.notify.notify_one();
        Ok(())
    }

    /// Await the next envelope in round-robin partition order.
    pub async fn next(&self) -> Envelope {
        loop {
            {
                let mut inner = self.inner.lock().await;
                if let Some(env) = inner.pop() {
                    return env;
                }
            }
            self.notify.notified().await;
        }
    }

    /// Like [`Self::next`], but returns `None` if `shutdown` fires first.
    pub async fn next_cancellable(&self, shutdown: &mut watch::Receiver<bool>) -> Option<Envelope> {
        loop {
            {
                let mut inner = self.inner.lock().await;
                if let Some(env) = inner.pop() {
                    return Some(env);
                }
            }
            tokio::select! {
                _ = self.notify.notified() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        return None;
                    }
                }
            }
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len
    }
}

impl Inner {
    fn push(&mut self, env: Envelope) {
        let key = env.channel_key();
        self.len += 1;
        self.partitions.entry(key.clone()).or_default().push_back(env);
        if !self.in_ready.contains(&key) {
            self.in_ready.insert(key.clone());
            self.ready.push_back(key);
        }
    }

    fn pop(&mut self) -> Option<Envelope> {
        let key = self.ready.pop_front()?;
        self.in_ready.remove(&key);
        let deque = self.partitions.get_mut(&key)?;
        let env = deque.pop_front();
        if !deque.is_empty() {
            self.in_ready.insert(key.clone());
            self.ready.push_back(key.clone());
        } else {
            self.partitions.remove(&key);
        }
        if env.is_some() {
            self.len -= 1;
        }
        env
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EnvelopeKind;

    fn env(chat: &str, content: &str) -> Envelope {
        Envelope::new("cli", chat, "user", content, EnvelopeKind::Inbound)
    }

    #[tokio::test]
    async fn fifo_within_partition() {
        let q = PartitionedQueue::new("inbound", 16);
        q.publish(env("a", "1")).await;
        q.publish(env("a", "2")).await;
        let first = q.next().await;
        let second = q.next().await;
        assert_eq!(first.content, "1");
        assert_eq!(second.content, "2");
    }

    #[tokio::test]
    async fn round_robin_across_partitions() {
        let q = PartitionedQueue::new("inbound", 16);
        q.publish(env("a", "a1")).await;
        q.publish(env("b", "b1")).await;
        q.publish(env("a", "a2")).await;
        // "a" became ready first, then "b"; draining should serve a1, b1, a2.
        assert_eq!(q.next().await.content, "a1");
        assert_eq!(q.next().await.content, "b1");
        assert_eq!(q.next().await.content, "a2");
    }

    #[tokio::test]
    async fn try_publish_sheds_when_full() {
        let q = PartitionedQueue::new("system", 1);
        q.try_publish(env("a", "1")).await.unwrap();
        let err = q.try_publish(env("a", "2")).await.unwrap_err();
        assert!(matches!(err, BusError::QueueFull { .. }));
    }

    #[tokio::test]
    async fn next_cancellable_returns_none_on_shutdown() {
        let q = PartitionedQueue::new("system", 4);
        let (tx, mut rx) = watch::channel(false);
        let handle = tokio::spawn(async move { q.next_cancellable(&mut rx).await });
        tx.send(true).unwrap();
        let result = handle.await.unwrap();
        assert!(result.is_none());
    }
}
