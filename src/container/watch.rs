//! File system watcher for the layer files.

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::PathBuf;
use std::sync::Weak;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::{ContainerInner, IniContainer, IniPaths};
use crate::Result;

/// Watch the container directory and reload after `debounce` of quiet
/// following a change to one of the layer files.
pub(super) fn spawn(
    container: Weak<ContainerInner>,
    paths: IniPaths,
    debounce: Duration,
    shutdown: CancellationToken,
) -> Result<JoinHandle<()>> {
    let (tx, mut rx) = tokio::sync::mpsc::channel(100);

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| {
            if let Ok(event) = res {
                let _ = tx.blocking_send(event);
            }
        },
        Config::default(),
    )?;

    std::fs::create_dir_all(&paths.directory)?;
    watcher.watch(&paths.directory, RecursiveMode::NonRecursive)?;
    tracing::debug!(directory = %paths.directory.display(), "Watching ini files");

    Ok(tokio::spawn(async move {
        // Keep the watcher alive for the lifetime of the task
        let _watcher = watcher;
        let mut touched: Vec<PathBuf> = Vec::new();
        let mut last_event_time = Instant::now();

        loop {
            let timeout = if touched.is_empty() {
                Duration::from_secs(3600)
            } else {
                debounce.saturating_sub(last_event_time.elapsed())
            };

            tokio::select! {
                _ = shutdown.cancelled() => break,
                event = rx.recv() => {
                    let Some(event) = event else { break };
                    if !matches!(
                        event.kind,
                        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
                    ) {
                        continue;
                    }
                    let relevant: Vec<PathBuf> = event
                        .paths
                        .into_iter()
                        .filter(|p| paths.contains(p))
                        .collect();
                    if relevant.is_empty() {
                        continue;
                    }
                    for path in relevant {
                        if !touched.contains(&path) {
                            touched.push(path);
                        }
                    }
                    last_event_time = Instant::now();
                }
                _ = tokio::time::sleep(timeout), if !touched.is_empty() => {
                    let Some(inner) = container.upgrade() else { break };
                    let changed = std::mem::take(&mut touched);
                    if let Err(e) = IniContainer::from_inner(inner).on_files_changed(&changed).await {
                        tracing::error!(error = %e, "Reload after file change failed");
                    }
                }
            }
        }
        tracing::debug!("File watch stopped");
    }))
}
