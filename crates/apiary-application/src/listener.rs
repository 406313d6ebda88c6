// SPDX-License-Identifier: GPL-3.0-or-later
use std::sync::Arc;

use apiary_domain::AnnounceEvent;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::autosnatch::AutosnatchState;
use crate::coordinator::{AnnounceOutcome, SnatchCoordinator};

/// Consume announces for one tracker until the channel closes.
///
/// Announces are handled one at a time. Failures only affect the announce
/// being handled. Returns how many torrents were snatched.
pub async fn run_listener(
    coordinator: Arc<SnatchCoordinator>,
    autosnatch: AutosnatchState,
    mut events: mpsc::Receiver<AnnounceEvent>,
) -> usize {
    let tracker = coordinator.tracker_name().to_string();
    info!(target: "coordinator", %tracker, "announce listener started");

    let mut snatched = 0;
    while let Some(event) = events.recv().await {
        if event.tracker != tracker {
            warn!(target: "coordinator", %tracker, from = %event.tracker, "announce for another tracker ignored");
            continue;
        }
        if !autosnatch.is_enabled() {
            debug!(target: "coordinator", %tracker, "autosnatching disabled, announce ignored");
            continue;
        }
        debug!(target: "announce", %tracker, line = %event.line, "announced");

        if !coordinator.tracker().is_logged_in().await {
            if let Err(e) = coordinator.tracker().login().await {
                error!(target: "coordinator", %tracker, error = %e, "could not log in, announce dropped");
                continue;
            }
        }

        match coordinator.handle_announce(&event.line).await {
            Ok(AnnounceOutcome::Snatched(snatch)) => {
                snatched += 1;
                debug!(target: "coordinator", %tracker, filter = %snatch.filter, path = %snatch.path.display(), "announce handled");
            }
            Ok(outcome) => {
                debug!(target: "coordinator", %tracker, ?outcome, "announce handled");
            }
            Err(e) => {
                error!(target: "coordinator", %tracker, error = %e, "error dealing with announced torrent");
            }
        }
    }

    info!(target: "coordinator", %tracker, snatched, "announce listener stopped");
    snatched
}
