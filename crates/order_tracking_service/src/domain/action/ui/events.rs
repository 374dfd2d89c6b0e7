/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use std::{sync::Arc, time::Duration};

use actix_web::{
    http::header::{CacheControl, CacheDirective},
    web::{Bytes, Data},
    HttpResponse,
};
use futures::Stream;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::warn;

use crate::common::types::*;
use crate::domain::types::ui::events::keep_alive_frame;
use crate::environment::AppState;
use crate::hub::{ConnectionHub, Subscription};
use crate::tools::error::AppError;

/// Unsubscribes its connection once the response body owning it is dropped,
/// which is how a client going away becomes visible.
pub struct UnsubscribeOnDrop {
    hub: Arc<ConnectionHub>,
    connection_id: ConnectionId,
}

impl UnsubscribeOnDrop {
    pub fn new(hub: Arc<ConnectionHub>, connection_id: ConnectionId) -> Self {
        Self { hub, connection_id }
    }
}

impl Drop for UnsubscribeOnDrop {
    fn drop(&mut self) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let hub = self.hub.to_owned();
        let connection_id = self.connection_id.to_owned();
        runtime.spawn(async move {
            hub.unsubscribe(&connection_id).await;
        });
    }
}

/// SSE frames for one subscription, with a keep-alive comment whenever the
/// order has been quiet for `keep_alive`. Ends when the hub drops the
/// subscriber, e.g. after a teardown.
pub fn event_stream(
    hub: Arc<ConnectionHub>,
    subscription: Subscription,
    keep_alive: Duration,
) -> impl Stream<Item = Result<Bytes, AppError>> {
    let Subscription {
        connection_id,
        receiver,
    } = subscription;

    let mut ticker = interval_at(Instant::now() + keep_alive, keep_alive);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let guard = UnsubscribeOnDrop::new(hub, connection_id);

    futures::stream::unfold(
        (receiver, ticker, guard),
        |(mut receiver, mut ticker, guard)| async move {
            let frame = tokio::select! {
                biased;
                event = receiver.recv() => match event {
                    Some(event) => event.to_sse_frame().map_err(|err| {
                        warn!(tag = "[Event Stream Closed]", event = %event, error = %err.message());
                        AppError::TransportError(err.message())
                    }),
                    None => return None,
                },
                _ = ticker.tick() => Ok(keep_alive_frame()),
            };
            ticker.reset();
            Some((frame, (receiver, ticker, guard)))
        },
    )
}

pub async fn open_event_stream(
    data: Data<AppState>,
    order_id: OrderId,
    participant: Participant,
) -> HttpResponse {
    let subscription = data.hub.subscribe(&order_id, participant).await;

    HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(CacheControl(vec![CacheDirective::NoCache]))
        .insert_header(("X-Accel-Buffering", "no"))
        .streaming(event_stream(
            data.hub.to_owned(),
            subscription,
            data.keep_alive,
        ))
}
