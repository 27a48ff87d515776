//! Periodic autosave task.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::session::{EditorSession, SaveStatus};

/// Handle to a running autosave loop.
pub struct AutosaveHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl AutosaveHandle {
    /// Token that stops the loop when cancelled.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Stop the loop and wait for it to finish its final flush.
    pub async fn shutdown(self) {
        self.token.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "autosave task ended abnormally");
        }
    }
}

/// Save `session` every `interval` while it has unsaved changes.
///
/// Failures are logged and retried on the next tick. On shutdown, pending
/// changes get one last save attempt.
pub fn spawn_autosave(session: Arc<EditorSession>, interval: Duration) -> AutosaveHandle {
    let token = CancellationToken::new();
    let cancelled = token.clone();

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancelled.cancelled() => break,
                _ = ticker.tick() => match session.autosave_tick().await {
                    Ok(SaveStatus::Saved { version, .. }) => debug!(version, "autosaved"),
                    Ok(SaveStatus::Skipped(reason)) => debug!(?reason, "autosave skipped"),
                    Err(e) => warn!(error = %e, "autosave failed, will retry"),
                },
            }
        }

        if session.has_unsaved_changes()
            && let Err(e) = session.save_now().await
        {
            warn!(error = %e, "final autosave failed");
        }
        info!("autosave stopped");
    });

    info!(interval_secs = interval.as_secs_f64(), "autosave started");
    AutosaveHandle { token, task }
}
