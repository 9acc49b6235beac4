use std::time::Duration;

use tokio::time::{MissedTickBehavior, interval};
use tracing::info;

use crate::state::{SharedState, session::SweepReport};

/// Retire expired rounds and forget stale retained ones.
pub fn sweep_once(state: &SharedState) -> SweepReport {
    state.sessions().sweep(state.now())
}

/// Sweep the session store every `period` until the task is dropped.
pub async fn run(state: SharedState, period: Duration) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(period_seconds = period.as_secs(), "session sweeper started");

    loop {
        ticker.tick().await;
        sweep_once(&state);
    }
}
