//! Event consumption and dispatch.

use falcon_cluster::contract::RECONFIG_EVENT_REASON;
use falcon_cluster::{ClusterApi, EventStream, PodEvent};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::reconfigure::Reconfigurer;

#[derive(Debug, Error)]
pub enum DaemonError {
    /// The orchestrator event stream ended or failed. Fatal: the
    /// supervisor restarts the process to re-establish the watch.
    #[error("event stream lost: {0}")]
    StreamLost(String),
}

/// Run the daemon until the event stream is lost.
///
/// The consumer forwards `Reconfig` events onto a bounded(1) channel; the
/// reconfigurer drains it one trigger at a time. The channel bound is the
/// backpressure: while a reconfiguration runs, at most one trigger queues
/// and the rest wait inside the stream.
pub async fn run<C, S>(reconfigurer: Reconfigurer<C>, mut events: S) -> Result<(), DaemonError>
where
    C: ClusterApi + 'static,
    S: EventStream,
{
    let (tx, rx) = mpsc::channel::<PodEvent>(1);

    let worker = tokio::spawn(reconfigure_loop(reconfigurer, rx));

    let result = consume_events(&mut events, tx).await;
    worker.abort();
    result
}

async fn consume_events<S: EventStream>(
    events: &mut S,
    tx: mpsc::Sender<PodEvent>,
) -> Result<(), DaemonError> {
    loop {
        match events.next_event().await {
            Ok(Some(event)) => {
                if event.reason != RECONFIG_EVENT_REASON {
                    continue;
                }
                debug!(
                    pod = %format!("{}/{}", event.pod_namespace, event.pod_name),
                    "Forwarding Reconfig event"
                );
                if tx.send(event).await.is_err() {
                    return Err(DaemonError::StreamLost(
                        "reconfigurer task stopped".to_string(),
                    ));
                }
            }
            Ok(None) => {
                error!("Event stream ended");
                return Err(DaemonError::StreamLost("stream ended".to_string()));
            }
            Err(e) => {
                error!(error = %e, "Event stream failed");
                return Err(DaemonError::StreamLost(e.to_string()));
            }
        }
    }
}

async fn reconfigure_loop<C: ClusterApi>(
    mut reconfigurer: Reconfigurer<C>,
    mut rx: mpsc::Receiver<PodEvent>,
) {
    info!("Reconfigurer ready");
    while let Some(event) = rx.recv().await {
        reconfigurer.handle_event(&event).await;
    }
}
