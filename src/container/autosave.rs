//! Periodic save of changed sections.

use std::sync::Weak;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::{ContainerInner, IniContainer};

/// Check for unsaved changes every `interval` until `shutdown` fires or the
/// container is dropped.
pub(super) fn spawn(
    container: Weak<ContainerInner>,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }
            let Some(inner) = container.upgrade() else {
                break;
            };
            if let Err(e) = IniContainer::from_inner(inner).autosave().await {
                tracing::error!(error = %e, "Autosave failed");
            }
        }
        tracing::debug!("Autosave stopped");
    })
}
