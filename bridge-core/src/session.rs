//! Per-connection state machine: drive the frame codec, match against the catalog, render
//! templates, dispatch publishes, and produce the framed ACK/NAK response stream.
//!
//! Ported from `original_source/src/connection_manager.{hpp,cpp}`; the original's direct
//! `boost::asio::async_write` call is replaced by an outbound channel so the caller owns the
//! socket's write half (see the `tcp` module).

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::catalog::PacketCatalog;
use crate::codec::{self, FrameBuffer};
use crate::publish::{PublishOutcome, PublishSink};
use crate::scan::scan;
use crate::template;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Reading,
    AwaitPublish,
    Closed,
}

/// Drives one connection's worth of decoded frames against a shared catalog and publish
/// sink, emitting framed responses through `respond`.
///
/// `SessionProcessor` owns no socket; it is fed raw bytes via [`SessionProcessor::on_data`]
/// and produces response bytes via the `respond` callback supplied there. This keeps it
/// free of any I/O runtime dependency, matching the boundary the `PublishSink` trait draws
/// for the MQTT side.
pub struct SessionProcessor {
    catalog: Arc<PacketCatalog>,
    sink: Arc<dyn PublishSink>,
    decoder: FrameBuffer,
    state: State,
    pending_frames: VecDeque<Vec<u8>>,
    label: String,
}

impl SessionProcessor {
    pub fn new(catalog: Arc<PacketCatalog>, sink: Arc<dyn PublishSink>, label: impl Into<String>) -> Self {
        Self {
            catalog,
            sink,
            decoder: FrameBuffer::new(),
            state: State::Reading,
            pending_frames: VecDeque::new(),
            label: label.into(),
        }
    }

    /// Feed raw bytes read from the socket. Completed frames are queued if the session is
    /// currently awaiting a publish, otherwise processed immediately. `respond` is invoked
    /// with each response frame that should be written back to the peer, in order.
    pub async fn on_data(&mut self, data: &[u8], mut respond: impl FnMut(Vec<u8>)) {
        let mut frames = Vec::new();
        if let Err(err) = self.decoder.feed(data, |f| frames.push(f.to_vec())) {
            error!(session = %self.label, error = %err, "frame decode error, resetting decoder");
            self.decoder.reset();
            return;
        }

        self.pending_frames.extend(frames);
        self.drain_pending(&mut respond).await;
    }

    async fn process_frame(&mut self, frame: &[u8], respond: &mut impl FnMut(Vec<u8>)) {
        debug!(session = %self.label, bytes = frame.len(), "decoded frame");

        let mut env: HashMap<String, String> = HashMap::new();
        let mut matched_template = None;
        scan(&self.catalog, frame, |field_view, packet| {
            env.insert(field_view.desc.name.clone(), field_view.value.to_string());
            if matched_template.is_none() {
                matched_template = Some(packet.template.clone());
            }
        });

        let Some(mqtt_template) = matched_template else {
            warn!(session = %self.label, "no packet in catalog matched frame");
            return;
        };

        let rendered = template::render_pair(&mqtt_template.topic, &mqtt_template.payload, &env);
        let (topic, payload) = match rendered {
            Ok(pair) => pair,
            Err(err) => {
                error!(session = %self.label, error = %err, "template render failed");
                respond(codec::make_response(codec::NAK));
                return;
            }
        };

        self.state = State::AwaitPublish;
        let outcome = self
            .sink
            .publish(&topic, payload.as_bytes(), mqtt_template.qos, mqtt_template.retain)
            .await;

        match outcome {
            Ok(PublishOutcome::Sent) | Ok(PublishOutcome::Acked) => {
                debug!(session = %self.label, topic = %topic, "publish completed");
                respond(codec::make_response(codec::ACK));
            }
            Err(err) => {
                error!(session = %self.label, error = %err, "publish failed");
                respond(codec::make_response(codec::NAK));
            }
        }

        self.state = State::Reading;
    }

    /// Process queued frames one at a time until none remain or the session starts
    /// awaiting a publish again (a nested call can re-enter this state if `respond`
    /// triggers further feeding, which callers should avoid).
    async fn drain_pending(&mut self, respond: &mut impl FnMut(Vec<u8>)) {
        while self.state == State::Reading {
            let Some(frame) = self.pending_frames.pop_front() else {
                break;
            };
            self.process_frame(&frame, respond).await;
        }
    }

    pub fn close(&mut self) {
        self.state = State::Closed;
    }

    pub fn is_closed(&self) -> bool {
        self.state == State::Closed
    }
}
