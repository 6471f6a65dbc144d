//! Long-running background task that re-checks expired confirmation
//! deadlines.
//!
//! The read paths already reconcile lazily, so this task only tightens
//! timeliness for exchanges nobody is looking at. It reuses the exact same
//! idempotent reconcile as the read paths.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{error, info};

use crate::exchange;
use crate::realtime::Rooms;
use crate::db;

pub struct SweeperState {
    pub pool: SqlitePool,
    pub rooms: Arc<Rooms>,
    pub interval_secs: u64,
}

/// Spawn the sweep loop as a background [`tokio`] task.
pub async fn run(state: Arc<SweeperState>) {
    if state.interval_secs == 0 {
        info!("Deadline sweeper disabled; reads still reconcile lazily");
        return;
    }

    info!(
        "Deadline sweeper checking every {} second(s)",
        state.interval_secs
    );

    loop {
        match sweep_once(&state).await {
            Ok(0) => {}
            Ok(n) => info!("Deadline sweep cancelled {n} expired exchange(s)"),
            Err(e) => error!("Deadline sweep error: {e}"),
        }

        tokio::time::sleep(Duration::from_secs(state.interval_secs)).await;
    }
}

/// Perform a single sweep iteration. Returns how many exchanges were
/// closed out.
pub(crate) async fn sweep_once(state: &SweeperState) -> crate::errors::Result<usize> {
    let now = Utc::now();
    let overdue = db::list_overdue_exchanges(&state.pool, now).await?;

    let mut cancelled = 0usize;
    for row in overdue {
        let before = row.estado.clone();
        let after = exchange::reconcile(&state.pool, &state.rooms, row, now).await;
        if after.estado != before {
            cancelled += 1;
        }
    }
    Ok(cancelled)
}
