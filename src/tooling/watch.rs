//! Manifest watch mode: re-apply manifests when files under the directory change.

use crate::error::ApiError;
use crate::manifest::{apply_all, is_manifest, load_dir};
use crate::store::Client;
use notify::{Event, EventKind, RecursiveMode, Watcher};
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// Watch mode configuration
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Manifest directory
    pub manifests: PathBuf,
    /// Quiet period after the last change before re-applying
    pub debounce_ms: u64,
}

impl WatchConfig {
    pub fn new(manifests: PathBuf) -> Self {
        Self {
            manifests,
            debounce_ms: 250,
        }
    }
}

/// Whether a filesystem event touches a manifest file
pub(crate) fn is_relevant(event: &Event) -> bool {
    matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    ) && event.paths.iter().any(|path| is_manifest(path))
}

pub struct ManifestWatcher {
    client: Client,
    config: WatchConfig,
}

impl ManifestWatcher {
    pub fn new(client: Client, config: WatchConfig) -> Self {
        Self { client, config }
    }

    /// Watch until `shutdown` completes
    pub async fn run<F>(&self, shutdown: F) -> Result<(), ApiError>
    where
        F: Future<Output = ()>,
    {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |res| {
            // Receiver gone means the watcher is shutting down.
            let _ = tx.send(res);
        })
        .map_err(|e| ApiError::Watch(format!("Failed to create watcher: {}", e)))?;

        watcher
            .watch(&self.config.manifests, RecursiveMode::Recursive)
            .map_err(|e| ApiError::Watch(format!("Failed to watch directory: {}", e)))?;

        info!(manifests = ?self.config.manifests, "Watching manifests");

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                event = rx.recv() => match event {
                    Some(Ok(event)) if is_relevant(&event) => {
                        self.debounce(&mut rx).await;
                        self.reapply().await;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => warn!("Watch error: {}", e),
                    None => {
                        error!("Watcher channel disconnected");
                        break;
                    }
                },
            }
        }

        Ok(())
    }

    async fn debounce(&self, rx: &mut mpsc::UnboundedReceiver<notify::Result<Event>>) {
        let window = Duration::from_millis(self.config.debounce_ms);
        while let Ok(Some(_)) = timeout(window, rx.recv()).await {}
    }

    /// Deleted manifests leave their records in place.
    async fn reapply(&self) {
        let manifests = match load_dir(&self.config.manifests) {
            Ok(manifests) => manifests,
            Err(e) => {
                warn!(error = %e, "Skipping re-apply of invalid manifests");
                return;
            }
        };
        match apply_all(&self.client, &manifests).await {
            Ok(written) => debug!(written, "Re-applied manifests"),
            Err(e) => error!(error = %e, "Failed to re-apply manifests"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, ModifyKind};

    #[test]
    fn test_only_manifest_changes_are_relevant() {
        let yaml = Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("/m/agents.yaml"));
        assert!(is_relevant(&yaml));

        let notes = Event::new(EventKind::Modify(ModifyKind::Any))
            .add_path(PathBuf::from("/m/notes.txt"));
        assert!(!is_relevant(&notes));

        let access = Event::new(EventKind::Access(notify::event::AccessKind::Any))
            .add_path(PathBuf::from("/m/agents.yaml"));
        assert!(!is_relevant(&access));
    }
}
