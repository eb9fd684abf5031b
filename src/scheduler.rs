//! Recurring cycle scheduling.
//!
//! A single timer task fires on a fixed interval and dispatches each cycle
//! onto its own blocking task, so a slow cycle never stalls the timer or
//! the shutdown path. Overlapping cycles are tolerated: each one owns its
//! sessions and shares nothing in-process.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::client::MailGateway;
use crate::cycle::{CycleStats, run_cycle};

/// Run one cycle on the blocking pool and wait for it.
///
/// Used for the startup pass; scheduled firings go through
/// [`spawn_cycle_scheduler`] instead and are not awaited.
pub async fn run_cycle_blocking(
    gateway: Arc<dyn MailGateway>,
    keywords: Vec<String>,
) -> CycleStats {
    let result =
        tokio::task::spawn_blocking(move || run_cycle(gateway.as_ref(), &keywords)).await;
    match result {
        Ok(stats) => stats,
        Err(e) => {
            error!("cycle task panicked: {e}");
            CycleStats::default()
        }
    }
}

/// Spawn the recurring scheduler.
///
/// Returns the timer task handle and a shutdown sender; sending `true`
/// stops the timer promptly (well under a second) without aborting any
/// in-flight cycle. The first firing happens one full interval after
/// spawn — the caller runs the startup cycle itself.
pub fn spawn_cycle_scheduler(
    gateway: Arc<dyn MailGateway>,
    keywords: Vec<String>,
    interval: Duration,
) -> (JoinHandle<()>, watch::Sender<bool>) {
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    let handle = tokio::spawn(async move {
        info!(
            "scheduler started, checking emails every {}s",
            interval.as_secs()
        );

        let mut tick = tokio::time::interval(interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // An interval's first tick completes immediately; consume it so the
        // startup cycle is not doubled.
        tick.tick().await;

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    info!("scheduled check: looking for new emails");
                    let gateway = Arc::clone(&gateway);
                    let keywords = keywords.clone();
                    // Fire and forget; overlap with a still-running cycle
                    // is acceptable.
                    tokio::task::spawn_blocking(move || {
                        let stats = run_cycle(gateway.as_ref(), &keywords);
                        info!(
                            seen = stats.seen,
                            replied = stats.replied,
                            failed = stats.failed,
                            "cycle complete"
                        );
                    });
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("scheduler shutting down");
                        return;
                    }
                }
            }
        }
    });

    (handle, shutdown_tx)
}
