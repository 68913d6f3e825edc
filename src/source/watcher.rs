//! Runtime snapshot watcher for converge-on-change.

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::lifecycle::scheduler::Trigger;

/// A watcher that requests a convergence when the runtime snapshot changes.
pub struct RuntimeWatcher {
    path: PathBuf,
    trigger_tx: mpsc::UnboundedSender<Trigger>,
}

impl RuntimeWatcher {
    /// Create a new RuntimeWatcher feeding the given trigger channel.
    pub fn new(path: &Path, trigger_tx: mpsc::UnboundedSender<Trigger>) -> Self {
        Self {
            path: path.to_path_buf(),
            trigger_tx,
        }
    }

    /// Start watching in a background thread.
    ///
    /// The parent directory is watched rather than the file itself, since the
    /// distribution side usually replaces the snapshot by rename.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.trigger_tx.clone();
        let file_name = self.path.file_name().map(|name| name.to_os_string());
        let watch_dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if !(event.kind.is_modify() || event.kind.is_create()) {
                        return;
                    }
                    let touches_snapshot = event
                        .paths
                        .iter()
                        .any(|p| p.file_name() == file_name.as_deref());
                    if touches_snapshot {
                        tracing::debug!("Runtime configuration change detected");
                        let _ = tx.send(Trigger::SourceChanged);
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&watch_dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Runtime configuration watcher started");
        Ok(watcher)
    }
}
