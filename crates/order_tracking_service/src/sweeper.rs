/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::info;

use crate::common::types::TimeStamp;
use crate::hub::ConnectionHub;

/// Periodically removes idle sessions until graceful termination is requested.
///
/// The termination flag is checked on every tick, so shutdown waits at most
/// one `sweep_interval`.
pub async fn run_session_sweeper(
    hub: Arc<ConnectionHub>,
    graceful_termination_requested: Arc<AtomicBool>,
    sweep_interval: Duration,
) {
    let mut timer = interval(sweep_interval);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        timer.tick().await;

        if graceful_termination_requested.load(Ordering::Relaxed) {
            info!(tag = "[Graceful Shutting Down]", "Stopping session sweeper");
            break;
        }

        let swept = hub.sweep_idle(TimeStamp::now()).await;
        if !swept.is_empty() {
            let remaining = hub.session_count().await;
            info!(tag = "[Idle Sessions Swept]", count = swept.len(), remaining = remaining);
        }
    }
}
