//! Kubelet socket watch.
//!
//! When the kubelet restarts it recreates its registration socket and
//! forgets every registered plugin. Rather than carry an in-process
//! re-registration protocol, the plugin exits when it sees the socket
//! recreated and lets its supervisor restart it, which re-registers.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Event, EventKind, RecursiveMode, Watcher};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("filesystem watch failed: {0}")]
    Notify(#[from] notify::Error),

    #[error("filesystem watch channel closed")]
    Closed,
}

/// Block until the kubelet socket is recreated under `plugin_dir`.
///
/// Returns `Ok(())` once the socket reappears; the caller is expected to
/// exit so its supervisor restarts and re-registers the plugin. The short
/// settle delay lets the kubelet finish binding before we give up the
/// old registration.
pub async fn wait_for_socket_recreation(
    plugin_dir: &Path,
    socket_name: &str,
) -> Result<(), WatchError> {
    let socket_path: PathBuf = plugin_dir.join(socket_name);
    info!(socket = %socket_path.display(), "Watching for kubelet socket recreation");

    let (tx, mut rx) = tokio::sync::mpsc::channel::<Result<Event, notify::Error>>(16);
    let mut watcher = notify::recommended_watcher(move |res| {
        // The watcher runs on its own thread; a full channel only drops
        // duplicate notifications for the same burst of events.
        let _ = tx.blocking_send(res);
    })?;
    watcher.watch(plugin_dir, RecursiveMode::NonRecursive)?;

    while let Some(res) = rx.recv().await {
        let event = res?;
        if !matches!(event.kind, EventKind::Create(_)) {
            continue;
        }
        if event.paths.iter().any(|p| p == &socket_path) {
            tokio::time::sleep(Duration::from_secs(1)).await;
            info!(socket = %socket_path.display(), "Kubelet socket recreated");
            return Ok(());
        }
    }

    Err(WatchError::Closed)
}
