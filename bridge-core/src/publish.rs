//! Abstract MQTT publish boundary. Ported from `original_source/src/mqtt_client.hpp`'s
//! `publish(topic, payload, callback, qos, retain)` contract; the concrete `rumqttc`-backed
//! implementation lives in the `bridge` binary crate.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    #[error("not connected to broker")]
    NotConnected,
    #[error("broker rejected publish: {0}")]
    Rejected(String),
    #[error("publish timed out waiting for completion")]
    Timeout,
    #[error("connection closed before publish completed")]
    Disconnected,
    /// `qos` outside `{0,1,2}`. Per SPEC_FULL.md §4.7, delivered synchronously through the
    /// completion rather than dispatched to the broker.
    #[error("invalid qos {0}, must be 0, 1 or 2")]
    InvalidArgument(u8),
}

/// Outcome of a completed publish, delivered asynchronously per SPEC_FULL.md §4.6/§4.7 QoS
/// timing rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// QoS 0: handed to the client library: no broker acknowledgement is awaited.
    Sent,
    /// QoS 1/2: the broker has acknowledged the publish.
    Acked,
}

/// Runtime-agnostic boundary between the session processor and a concrete MQTT client.
///
/// Implementations report completion via the returned future rather than a callback: QoS 0
/// resolves as soon as the message is hand off to the client library, QoS 1/2 resolves once
/// the broker has acknowledged it (or the connection drops first).
#[async_trait]
pub trait PublishSink: Send + Sync {
    async fn publish(
        &self,
        topic: &str,
        payload: &[u8],
        qos: u8,
        retain: bool,
    ) -> Result<PublishOutcome, PublishError>;
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::Mutex;

    /// In-memory sink recording every publish call and replaying a fixed outcome.
    #[derive(Default)]
    pub struct RecordingSink {
        pub calls: Mutex<Vec<(String, Vec<u8>, u8, bool)>>,
        pub outcome: Mutex<Result<PublishOutcome, PublishError>>,
    }

    impl RecordingSink {
        pub fn new(outcome: Result<PublishOutcome, PublishError>) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                outcome: Mutex::new(outcome),
            }
        }
    }

    #[async_trait]
    impl PublishSink for RecordingSink {
        async fn publish(
            &self,
            topic: &str,
            payload: &[u8],
            qos: u8,
            retain: bool,
        ) -> Result<PublishOutcome, PublishError> {
            self.calls
                .lock()
                .unwrap()
                .push((topic.to_string(), payload.to_vec(), qos, retain));
            self.outcome.lock().unwrap().clone()
        }
    }
}
