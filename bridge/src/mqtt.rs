//! Concrete `rumqttc`-backed [`PublishSink`] (ambient addition, SPEC_FULL.md §4.7
//! "Concrete adapter"). Bridges `rumqttc`'s pkid-keyed PUBACK/PUBCOMP event stream into
//! the completion-oriented contract `bridge-core`'s session processor expects, mirroring
//! `original_source/src/mqtt_client.cpp`'s qos/retain/completion mapping.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bridge_core::publish::{PublishError, PublishOutcome, PublishSink};
use rumqttc::{AsyncClient, Event, EventLoop, Incoming, MqttOptions, Outgoing, QoS};
use tokio::sync::{oneshot, Mutex as AsyncMutex};
use tracing::{debug, warn};

type Completion = oneshot::Sender<Result<PublishOutcome, PublishError>>;

/// A completion waiting to be matched to the pkid `rumqttc` assigns once it actually
/// writes the PUBLISH packet to the socket. Tagged with a locally-assigned `id` so a
/// publish call that errors out before being written can remove its own reservation
/// without racing a concurrent caller's push onto the same queue.
struct Reservation {
    id: u64,
    sender: Completion,
}

/// `PublishSink` implementation backed by a single shared `rumqttc::AsyncClient`.
///
/// QoS 0 completes as soon as the publish request is handed to the client's internal
/// queue ("fire and forget", matching SPEC_FULL.md §4.7's "completion fires when the
/// local send completes"). QoS 1/2 complete when the broker's PUBACK/PUBCOMP arrives,
/// observed on a background task polling the `rumqttc::EventLoop`. Reconnection is left
/// entirely to that event loop; this adapter never initiates a reconnect itself.
pub struct RumqttcSink {
    client: AsyncClient,
    next_id: AtomicU64,
    pending_order: Mutex<VecDeque<Reservation>>,
    pending_by_pkid: Mutex<HashMap<u16, Completion>>,
    /// Serializes "reserve a completion slot, then hand the request to `rumqttc`" across
    /// concurrent callers. `rumqttc` assigns pkids and emits `Outgoing::Publish` events in
    /// the order requests reach its internal queue; holding this lock across both steps
    /// guarantees a reservation's position in `pending_order` matches that submission
    /// order exactly, so `drive_event_loop`'s FIFO pairing in [`pending_order`] never
    /// binds one caller's reservation to another caller's pkid.
    submit_lock: AsyncMutex<()>,
}

impl RumqttcSink {
    /// Connect to `host:port` as `client_id` and spawn the task that drives the event
    /// loop and resolves completions.
    pub fn connect(client_id: &str, host: &str, port: u16) -> Arc<Self> {
        let mut options = MqttOptions::new(client_id, host, port);
        options.set_keep_alive(Duration::from_secs(30));

        let (client, eventloop) = AsyncClient::new(options, 64);
        let sink = Arc::new(Self {
            client,
            next_id: AtomicU64::new(0),
            pending_order: Mutex::new(VecDeque::new()),
            pending_by_pkid: Mutex::new(HashMap::new()),
            submit_lock: AsyncMutex::new(()),
        });

        tokio::spawn(drive_event_loop(sink.clone(), eventloop));
        sink
    }
}

async fn drive_event_loop(sink: Arc<RumqttcSink>, mut eventloop: EventLoop) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Outgoing(Outgoing::Publish(pkid))) => {
                if let Some(reservation) = sink.pending_order.lock().unwrap().pop_front() {
                    sink.pending_by_pkid
                        .lock()
                        .unwrap()
                        .insert(pkid, reservation.sender);
                }
            }
            Ok(Event::Incoming(Incoming::PubAck(ack))) => complete(&sink, ack.pkid),
            Ok(Event::Incoming(Incoming::PubComp(comp))) => complete(&sink, comp.pkid),
            Ok(_) => {}
            Err(err) => {
                warn!(error = %err, "mqtt event loop error, rumqttc will reconnect");
                fail_all(&sink, PublishError::Disconnected);
            }
        }
    }
}

fn complete(sink: &RumqttcSink, pkid: u16) {
    if let Some(sender) = sink.pending_by_pkid.lock().unwrap().remove(&pkid) {
        let _ = sender.send(Ok(PublishOutcome::Acked));
    }
}

fn fail_all(sink: &RumqttcSink, err: PublishError) {
    for (_, sender) in sink.pending_by_pkid.lock().unwrap().drain() {
        let _ = sender.send(Err(err.clone()));
    }
    for reservation in sink.pending_order.lock().unwrap().drain(..) {
        let _ = reservation.sender.send(Err(err.clone()));
    }
}

#[async_trait]
impl PublishSink for RumqttcSink {
    async fn publish(
        &self,
        topic: &str,
        payload: &[u8],
        qos: u8,
        retain: bool,
    ) -> Result<PublishOutcome, PublishError> {
        let mqtt_qos = match qos {
            0 => QoS::AtMostOnce,
            1 => QoS::AtLeastOnce,
            2 => QoS::ExactlyOnce,
            other => return Err(PublishError::InvalidArgument(other)),
        };

        if qos == 0 {
            self.client
                .publish(topic, mqtt_qos, retain, payload)
                .await
                .map_err(|e| PublishError::Rejected(e.to_string()))?;
            debug!(topic, "qos 0 publish handed to client");
            return Ok(PublishOutcome::Sent);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();

        // Hold submit_lock across the reservation push AND the actual submission so no
        // other caller's publish() can interleave between them; otherwise this
        // reservation's position in `pending_order` could land ahead of or behind where
        // rumqttc actually enqueues the packet, desynchronizing the FIFO pairing in
        // `drive_event_loop`.
        let submit_result = {
            let _guard = self.submit_lock.lock().await;
            self.pending_order
                .lock()
                .unwrap()
                .push_back(Reservation { id, sender: tx });
            self.client.publish(topic, mqtt_qos, retain, payload).await
        };

        if let Err(err) = submit_result {
            self.pending_order.lock().unwrap().retain(|r| r.id != id);
            return Err(PublishError::Rejected(err.to_string()));
        }

        rx.await.unwrap_or(Err(PublishError::Disconnected))
    }
}
