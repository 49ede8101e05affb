#![forbid(unsafe_code)]

//! TCP accept loop (ambient addition, SPEC_FULL.md §4.9). The out-of-scope TCP accept/
//! listen boilerplate named in SPEC_FULL.md §1 is genuinely out of scope for the *protocol*
//! logic, but a runnable bridge still needs one; this module ports the shape of the
//! teacher's `tcp::{mod,handler}` accept loop (listener bind, live-connection counter,
//! per-connection task, `watch`-driven shutdown) and drives it with [`crate::session::SessionProcessor`]
//! instead of the teacher's HTTP/TLS forwarding.

mod handler;

use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

use crate::catalog::PacketCatalog;
use crate::config::Config;
use crate::publish::PublishSink;

pub use handler::ConnectionCount;

#[derive(Debug, Error)]
pub enum TcpError {
    #[error("bind failed: {0}")]
    Bind(std::io::Error),
}

/// Bind `config.tcp.bind` and accept connections until `shutdown` reports `true`, running
/// each connection's frame/scan/template/publish pipeline on its own task against the
/// shared `catalog` and `sink`. In-flight connections are allowed to drain once the accept
/// loop stops; see SPEC_FULL.md §5 "Resource lifetime".
pub async fn run(
    config: Arc<Config>,
    catalog: Arc<PacketCatalog>,
    sink: Arc<dyn PublishSink>,
    shutdown: watch::Receiver<bool>,
) -> Result<(), TcpError> {
    let listener = TcpListener::bind(config.tcp.bind)
        .await
        .map_err(TcpError::Bind)?;
    info!(addr = %config.tcp.bind, "tcp listener bound");

    let counters = Arc::new(ConnectionCount::default());
    handler::accept_loop(listener, catalog, sink, counters, shutdown).await;
    Ok(())
}
