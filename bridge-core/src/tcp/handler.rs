#![forbid(unsafe_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::BytesMut;
use tokio::io::{self, AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::catalog::PacketCatalog;
use crate::publish::PublishSink;
use crate::session::SessionProcessor;

/// Live-connection counters, teacher's `ConnectionCount` pattern
/// (`huginn-proxy-lib/src/tcp/metrics.rs`) ported unchanged: an atomic gauge plus
/// monotonic total/error counters, decremented via an RAII guard on task exit.
#[derive(Debug, Default)]
pub struct ConnectionCount {
    current: AtomicUsize,
    total: AtomicU64,
    errors: AtomicU64,
}

#[derive(Debug, Clone, Copy)]
pub struct ConnectionSnapshot {
    pub current: usize,
    pub total: u64,
    pub errors: u64,
}

impl ConnectionCount {
    pub fn current(&self) -> usize {
        self.current.load(Ordering::Relaxed)
    }

    pub fn increment_errors(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ConnectionSnapshot {
        ConnectionSnapshot {
            current: self.current.load(Ordering::Relaxed),
            total: self.total.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }

    fn acquire(self: &Arc<Self>) -> ConnectionGuard {
        self.current.fetch_add(1, Ordering::Relaxed);
        self.total.fetch_add(1, Ordering::Relaxed);
        ConnectionGuard {
            counts: self.clone(),
        }
    }
}

/// Decrements the live-connection gauge on drop, guaranteeing release on every exit path
/// (normal return, early `?`, or panic unwinding past the task boundary) per SPEC_FULL.md
/// §5 "Resource lifetime".
struct ConnectionGuard {
    counts: Arc<ConnectionCount>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.counts.current.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Accept connections until `shutdown` reports `true`, spawning one task per connection.
/// Once the accept loop stops, waits for every spawned task to finish so in-flight sessions
/// drain instead of being aborted mid-publish.
pub(crate) async fn accept_loop(
    listener: TcpListener,
    catalog: Arc<PacketCatalog>,
    sink: Arc<dyn PublishSink>,
    counters: Arc<ConnectionCount>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut tasks = JoinSet::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, addr)) => {
                        let guard = counters.acquire();
                        let snapshot = counters.snapshot();
                        info!(%addr, current = snapshot.current, total = snapshot.total, "accepted connection");

                        let catalog = catalog.clone();
                        let sink = sink.clone();
                        let counters = counters.clone();
                        tasks.spawn(async move {
                            let _guard = guard;
                            if let Err(err) = handle_connection(stream, addr, catalog, sink).await {
                                counters.increment_errors();
                                warn!(%addr, error = %err, "session ended with io error");
                            } else {
                                debug!(%addr, "session closed");
                            }
                        });
                    }
                    Err(err) => {
                        counters.increment_errors();
                        warn!(error = %err, "failed to accept connection");
                    }
                }
            }
            changed = shutdown.changed() => {
                match changed {
                    Ok(()) if *shutdown.borrow() => {
                        info!("shutdown signal received, stopping accept loop");
                        break;
                    }
                    Ok(()) => continue,
                    Err(_) => continue,
                }
            }
        }
    }

    if !tasks.is_empty() {
        info!(pending = tasks.len(), "draining in-flight sessions");
    }
    while tasks.join_next().await.is_some() {}
}

/// Drive one connection: read bytes, feed them through [`SessionProcessor`], and write
/// back whatever framed responses it produces, in order. A single task owns the socket's
/// read and write halves, so writes to this peer are never interleaved with another task's.
async fn handle_connection(
    mut stream: TcpStream,
    addr: SocketAddr,
    catalog: Arc<PacketCatalog>,
    sink: Arc<dyn PublishSink>,
) -> io::Result<()> {
    let mut session = SessionProcessor::new(catalog, sink, addr.to_string());
    let mut buf = BytesMut::with_capacity(4096);

    loop {
        buf.clear();
        let n = stream.read_buf(&mut buf).await?;
        if n == 0 {
            session.close();
            return Ok(());
        }

        let mut responses: Vec<Vec<u8>> = Vec::new();
        session.on_data(&buf[..n], |resp| responses.push(resp)).await;
        for resp in responses {
            stream.write_all(&resp).await?;
        }
    }
}
