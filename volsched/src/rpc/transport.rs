/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! One-way message delivery.
//!
//! * `cast` delivers to exactly one consumer of a topic and applies
//!   backpressure when that consumer's queue is full.
//! * `fanout_cast` offers the message to every consumer and never waits:
//!   full or closed queues just miss it.  Used for capability reports, which
//!   the next periodic report supersedes anyway.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use super::envelope::Envelope;
use super::error::RpcError;

/// Queue depth of each in-process subscriber.
pub const CAST_QUEUE_DEPTH: usize = 256;

#[async_trait]
pub trait Transport: Send + Sync {
    async fn cast(&self, topic: &str, envelope: Envelope) -> Result<(), RpcError>;

    async fn fanout_cast(&self, topic: &str, envelope: Envelope) -> Result<(), RpcError>;
}

// ── LocalTransport ────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct TopicQueues {
    subscribers: Vec<mpsc::Sender<Envelope>>,
    next: usize,
}

/// In-process transport: one bounded queue per subscriber.  Casts to a topic
/// rotate over its live subscribers.
#[derive(Debug, Default)]
pub struct LocalTransport {
    topics: Mutex<HashMap<String, TopicQueues>>,
}

impl LocalTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start consuming `topic`.  Dropping the receiver unsubscribes.
    pub fn subscribe(&self, topic: &str) -> mpsc::Receiver<Envelope> {
        let (tx, rx) = mpsc::channel(CAST_QUEUE_DEPTH);
        self.topics
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(topic.to_string())
            .or_default()
            .subscribers
            .push(tx);
        rx
    }

    /// Next live subscriber of `topic`, round-robin.
    fn pick(&self, topic: &str) -> Option<mpsc::Sender<Envelope>> {
        let mut topics = self.topics.lock().unwrap_or_else(|e| e.into_inner());
        let queues = topics.get_mut(topic)?;
        queues.subscribers.retain(|s| !s.is_closed());
        if queues.subscribers.is_empty() {
            return None;
        }
        let idx = queues.next % queues.subscribers.len();
        queues.next = queues.next.wrapping_add(1);
        Some(queues.subscribers[idx].clone())
    }

    fn all(&self, topic: &str) -> Vec<mpsc::Sender<Envelope>> {
        let mut topics = self.topics.lock().unwrap_or_else(|e| e.into_inner());
        match topics.get_mut(topic) {
            Some(queues) => {
                queues.subscribers.retain(|s| !s.is_closed());
                queues.subscribers.clone()
            }
            None => Vec::new(),
        }
    }
}

#[async_trait]
impl Transport for LocalTransport {
    async fn cast(&self, topic: &str, envelope: Envelope) -> Result<(), RpcError> {
        let sender = self
            .pick(topic)
            .ok_or_else(|| RpcError::transport(topic, "no consumer"))?;
        sender
            .send(envelope)
            .await
            .map_err(|_| RpcError::transport(topic, "consumer went away"))
    }

    async fn fanout_cast(&self, topic: &str, envelope: Envelope) -> Result<(), RpcError> {
        let subscribers = self.all(topic);
        for sender in &subscribers {
            if let Err(e) = sender.try_send(envelope.clone()) {
                debug!(topic, method = %envelope.method, error = %e, "fanout delivery skipped");
            }
        }
        debug!(topic, method = %envelope.method, subscribers = subscribers.len(), "fanout cast");
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::version::RpcVersion;

    fn env(n: u32) -> Envelope {
        Envelope::new("ping", RpcVersion::new(1, 0), &serde_json::json!({ "n": n })).unwrap()
    }

    #[tokio::test]
    async fn cast_round_robins_over_subscribers() {
        let t = LocalTransport::new();
        let mut a = t.subscribe("scheduler");
        let mut b = t.subscribe("scheduler");

        for n in 0..4 {
            t.cast("scheduler", env(n)).await.unwrap();
        }
        assert_eq!(a.recv().await.unwrap().args["n"], 0);
        assert_eq!(b.recv().await.unwrap().args["n"], 1);
        assert_eq!(a.recv().await.unwrap().args["n"], 2);
        assert_eq!(b.recv().await.unwrap().args["n"], 3);
    }

    #[tokio::test]
    async fn cast_without_consumer_fails() {
        let t = LocalTransport::new();
        assert!(matches!(
            t.cast("scheduler", env(0)).await,
            Err(RpcError::Transport { .. })
        ));

        let rx = t.subscribe("scheduler");
        drop(rx);
        assert!(t.cast("scheduler", env(0)).await.is_err());
    }

    #[tokio::test]
    async fn fanout_reaches_everyone_and_never_fails() {
        let t = LocalTransport::new();
        assert!(t.fanout_cast("scheduler", env(0)).await.is_ok());

        let mut a = t.subscribe("scheduler");
        let mut b = t.subscribe("scheduler");
        t.fanout_cast("scheduler", env(7)).await.unwrap();
        assert_eq!(a.recv().await.unwrap().args["n"], 7);
        assert_eq!(b.recv().await.unwrap().args["n"], 7);
    }

    #[tokio::test]
    async fn fanout_drops_when_queue_is_full() {
        let t = LocalTransport::new();
        let mut rx = t.subscribe("scheduler");
        for n in 0..(CAST_QUEUE_DEPTH as u32 + 10) {
            t.fanout_cast("scheduler", env(n)).await.unwrap();
        }
        let mut received = 0;
        while rx.try_recv().is_ok() {
            received += 1;
        }
        assert_eq!(received, CAST_QUEUE_DEPTH);
    }
}
