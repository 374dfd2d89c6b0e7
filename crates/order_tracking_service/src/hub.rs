/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use std::sync::Arc;

use rustc_hash::FxHashMap;
use tokio::sync::{
    mpsc::{self, error::TrySendError},
    Mutex, OwnedMutexGuard, RwLock,
};
use tracing::{debug, info, warn};

use crate::common::{
    route::{plan_route, RouteParams, RoutePlan},
    types::*,
};
use crate::domain::types::ui::events::*;
use crate::outbound::external::RoutingGateway;
use crate::registry::{Session, SessionRegistry};
use crate::tools::{
    error::AppError,
    prometheus::{CONNECTED_SUBSCRIBERS, DROPPED_EVENTS, TOTAL_LOCATION_UPDATES},
};

struct Subscriber {
    connection_id: ConnectionId,
    participant: Participant,
    sender: mpsc::Sender<TrackingEvent>,
}

/// Live subscribers of one order. Its mutex is the serialisation point for
/// every state change of that order.
#[derive(Default)]
struct OrderRoom {
    subscribers: Vec<Subscriber>,
    /// Set once the room has been taken out of the map. Holders of a stale
    /// handle must look the room up again.
    closed: bool,
}

/// Receiving end of one subscription.
pub struct Subscription {
    pub connection_id: ConnectionId,
    pub receiver: mpsc::Receiver<TrackingEvent>,
}

#[derive(Debug, Clone, Copy)]
pub struct HubSettings {
    pub route_params: RouteParams,
    /// Events buffered per subscriber before new ones are dropped. Must be at least 1.
    pub subscriber_buffer: usize,
    pub session_idle_timeout: Seconds,
}

/// Everything known about one order, for operators.
#[derive(Debug, Clone)]
pub struct OrderInspection {
    pub session: Session,
    pub route_plan: Option<RoutePlan>,
    pub subscriber_count: usize,
}

/// Bridges subscriber connections to the session registry.
///
/// Every mutation of an order happens while holding that order's room lock, and
/// the resulting events are handed to each subscriber's bounded channel before
/// the lock is released. Delivery never awaits: a full channel loses that one
/// event for that one subscriber, a closed channel gets its subscriber detached.
pub struct ConnectionHub {
    registry: SessionRegistry,
    rooms: RwLock<FxHashMap<OrderId, Arc<Mutex<OrderRoom>>>>,
    connections: RwLock<FxHashMap<ConnectionId, OrderId>>,
    settings: HubSettings,
    gateway: Option<Arc<dyn RoutingGateway>>,
}

/// Hands one event to every subscriber `event_for` picks, skipping `origin`.
/// Returns the connections whose receiving end is gone.
fn fan_out<F>(room: &OrderRoom, origin: Option<&ConnectionId>, mut event_for: F) -> Vec<ConnectionId>
where
    F: FnMut(&Participant) -> Option<TrackingEvent>,
{
    let mut closed = Vec::new();
    for subscriber in room
        .subscribers
        .iter()
        .filter(|subscriber| Some(&subscriber.connection_id) != origin)
    {
        let Some(event) = event_for(&subscriber.participant) else {
            continue;
        };
        match subscriber.sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                DROPPED_EVENTS.inc();
                warn!(tag = "[Event Dropped]", connection_id = %subscriber.connection_id.0, event = %event);
            }
            Err(TrySendError::Closed(_)) => closed.push(subscriber.connection_id.to_owned()),
        }
    }
    closed
}

fn customer_view(session: Option<&Session>, customer_id: &CustomerId) -> CustomerView {
    CustomerView {
        driver: session.and_then(|session| session.driver.to_owned()),
        customer: session.and_then(|session| session.customers.get(customer_id).cloned()),
    }
}

impl ConnectionHub {
    pub fn new(
        registry: SessionRegistry,
        settings: HubSettings,
        gateway: Option<Arc<dyn RoutingGateway>>,
    ) -> Self {
        Self {
            registry,
            rooms: RwLock::new(FxHashMap::default()),
            connections: RwLock::new(FxHashMap::default()),
            settings,
            gateway,
        }
    }

    /// Copy of the order's current session.
    pub async fn session(&self, order_id: &OrderId) -> Option<Session> {
        self.registry.get_session(order_id).await
    }

    pub async fn session_count(&self) -> usize {
        self.registry.session_count().await
    }

    pub fn settings(&self) -> &HubSettings {
        &self.settings
    }

    pub fn gateway(&self) -> Option<&dyn RoutingGateway> {
        self.gateway.as_deref()
    }

    /// Locks the room of `order_id`, creating it if needed.
    async fn lock_room(&self, order_id: &OrderId) -> OwnedMutexGuard<OrderRoom> {
        loop {
            let existing = self.rooms.read().await.get(order_id).cloned();
            let room = match existing {
                Some(room) => room,
                None => self
                    .rooms
                    .write()
                    .await
                    .entry(order_id.to_owned())
                    .or_default()
                    .clone(),
            };
            let guard = room.lock_owned().await;
            if !guard.closed {
                return guard;
            }
        }
    }

    /// Locks the room of `order_id` only if one exists.
    async fn lock_existing_room(&self, order_id: &OrderId) -> Option<OwnedMutexGuard<OrderRoom>> {
        loop {
            let room = self.rooms.read().await.get(order_id).cloned()?;
            let guard = room.lock_owned().await;
            if !guard.closed {
                return Some(guard);
            }
        }
    }

    async fn close_room(&self, mut room: OwnedMutexGuard<OrderRoom>, order_id: &OrderId) {
        room.closed = true;
        let mut rooms = self.rooms.write().await;
        if rooms
            .get(order_id)
            .is_some_and(|current| Arc::ptr_eq(current, OwnedMutexGuard::mutex(&room)))
        {
            rooms.remove(order_id);
        }
    }

    /// A room with neither subscribers nor a session has nothing left to guard.
    async fn release_if_unused(&self, room: OwnedMutexGuard<OrderRoom>, order_id: &OrderId) {
        if room.subscribers.is_empty() && self.registry.get_session(order_id).await.is_none() {
            self.close_room(room, order_id).await;
        }
    }

    fn driver_view(&self, session: Option<&Session>) -> DriverView {
        let Some((session, driver)) =
            session.and_then(|session| session.driver.as_ref().map(|driver| (session, driver)))
        else {
            return DriverView {
                driver: None,
                customers: session.map(Session::customers_by_id).unwrap_or_default(),
                total_distance_km: None,
                total_time_minutes: None,
            };
        };

        let plan = plan_route(&driver.position, &session.stops(), &self.settings.route_params);

        DriverView {
            driver: Some(driver.to_owned()),
            customers: plan
                .ordered_stops
                .iter()
                .filter_map(|stop| session.customers.get(&stop.id).cloned())
                .collect(),
            total_distance_km: Some(plan.total_distance_km),
            total_time_minutes: Some(plan.total_time_minutes),
        }
    }

    /// Registers a new subscriber and queues its initial snapshot before any
    /// later event of the order can reach it.
    pub async fn subscribe(&self, order_id: &OrderId, participant: Participant) -> Subscription {
        let (sender, receiver) = mpsc::channel(self.settings.subscriber_buffer);
        let connection_id = ConnectionId::new();

        let mut room = self.lock_room(order_id).await;

        let session = self.registry.get_session(order_id).await;
        let snapshot = match &participant {
            Participant::Driver => Snapshot::Driver(self.driver_view(session.as_ref())),
            Participant::Customer(customer_id) => {
                Snapshot::Customer(customer_view(session.as_ref(), customer_id))
            }
        };

        if let Err(err) = sender.try_send(TrackingEvent::Initial(snapshot)) {
            warn!(tag = "[Initial Snapshot Not Queued]", order_id = %order_id.0, error = %err);
        }

        self.connections
            .write()
            .await
            .insert(connection_id.to_owned(), order_id.to_owned());
        room.subscribers.push(Subscriber {
            connection_id: connection_id.to_owned(),
            participant: participant.to_owned(),
            sender,
        });
        CONNECTED_SUBSCRIBERS.inc();

        info!(tag = "[Subscriber Joined]", order_id = %order_id.0, connection_id = %connection_id.0, role = %participant.role());

        Subscription {
            connection_id,
            receiver,
        }
    }

    /// Forgets a connection. When it was the last one of a customer, that
    /// customer's slot is removed and the remaining subscribers are told.
    pub async fn unsubscribe(&self, connection_id: &ConnectionId) {
        let Some(order_id) = self.connections.read().await.get(connection_id).cloned() else {
            return;
        };

        let Some(mut room) = self.lock_existing_room(&order_id).await else {
            return;
        };

        self.detach(&mut room, &order_id, vec![connection_id.to_owned()])
            .await;
        self.release_if_unused(room, &order_id).await;
    }

    /// Removes every connection in `pending`, following up on customer
    /// departures. Broadcasts made on the way may surface more closed
    /// connections; those are handled in the same pass.
    async fn detach(&self, room: &mut OrderRoom, order_id: &OrderId, mut pending: Vec<ConnectionId>) {
        while let Some(connection_id) = pending.pop() {
            let Some(position) = room
                .subscribers
                .iter()
                .position(|subscriber| subscriber.connection_id == connection_id)
            else {
                continue;
            };

            let subscriber = room.subscribers.remove(position);
            self.connections.write().await.remove(&connection_id);
            CONNECTED_SUBSCRIBERS.dec();

            info!(tag = "[Subscriber Left]", order_id = %order_id.0, connection_id = %connection_id.0, role = %subscriber.participant.role());

            if let Participant::Customer(customer_id) = subscriber.participant {
                pending.extend(self.release_customer(room, order_id, &customer_id).await);
            }
        }
    }

    /// Drops the customer's slot unless another of its connections is still live.
    async fn release_customer(
        &self,
        room: &OrderRoom,
        order_id: &OrderId,
        customer_id: &CustomerId,
    ) -> Vec<ConnectionId> {
        if room
            .subscribers
            .iter()
            .any(|subscriber| subscriber.participant.customer_id() == Some(customer_id))
        {
            return Vec::new();
        }

        if !self.registry.remove_customer(order_id, customer_id).await {
            return Vec::new();
        }

        info!(tag = "[Customer Removed]", order_id = %order_id.0, customer_id = %customer_id.0);

        let session = self.registry.get_session(order_id).await;
        let view = self.driver_view(session.as_ref());
        let disconnected = TrackingEvent::CustomerDisconnected(CustomerDisconnected {
            id: customer_id.to_owned(),
        });

        let mut closed = fan_out(room, None, |_| Some(disconnected.to_owned()));
        closed.extend(fan_out(room, None, |participant| {
            matches!(participant, Participant::Driver)
                .then(|| TrackingEvent::CustomersUpdate(view.to_owned()))
        }));
        closed
    }

    /// Stores the driver's position and pushes each subscriber its own view of it.
    ///
    /// `origin` is skipped during fan-out. Split submit/stream transports pass
    /// `None` since the reporter is never one of the stream subscribers.
    pub async fn report_driver_location(
        self: &Arc<Self>,
        order_id: &OrderId,
        position: Coordinate,
        origin: Option<&ConnectionId>,
    ) -> DriverState {
        let mut room = self.lock_room(order_id).await;

        let driver = self.registry.upsert_driver(order_id, position).await;
        let refreshed = self.registry.refresh_customer_distances(order_id).await;
        TOTAL_LOCATION_UPDATES
            .with_label_values(&[Role::Driver.to_string().as_str()])
            .inc();

        let session = self.registry.get_session(order_id).await;
        let view = self.driver_view(session.as_ref());

        let closed = fan_out(&room, origin, |participant| match participant {
            Participant::Driver => Some(TrackingEvent::CustomersUpdate(view.to_owned())),
            Participant::Customer(customer_id) => Some(TrackingEvent::DriverUpdate(
                customer_view(session.as_ref(), customer_id),
            )),
        });
        self.detach(&mut room, order_id, closed).await;
        drop(room);

        debug!(tag = "[Driver Location Applied]", order_id = %order_id.0, customers = refreshed.len());

        self.spawn_road_refinement(
            order_id,
            position,
            refreshed
                .into_iter()
                .map(|customer| (customer.id, customer.position))
                .collect(),
        );

        driver
    }

    /// Stores a customer's position and pushes the new entry, then the
    /// reordered stop list, to driver subscribers.
    pub async fn report_customer_location(
        self: &Arc<Self>,
        order_id: &OrderId,
        customer_id: &CustomerId,
        position: Coordinate,
        address: Option<String>,
        origin: Option<&ConnectionId>,
    ) -> CustomerState {
        let mut room = self.lock_room(order_id).await;

        let customer = self
            .registry
            .upsert_customer(order_id, customer_id, position, address)
            .await;
        TOTAL_LOCATION_UPDATES
            .with_label_values(&[Role::Customer.to_string().as_str()])
            .inc();

        let session = self.registry.get_session(order_id).await;
        let view = self.driver_view(session.as_ref());
        let update = TrackingEvent::CustomerUpdate(customer.to_owned());

        let mut closed = fan_out(&room, origin, |participant| {
            matches!(participant, Participant::Driver).then(|| update.to_owned())
        });
        closed.extend(fan_out(&room, origin, |participant| {
            matches!(participant, Participant::Driver)
                .then(|| TrackingEvent::CustomersUpdate(view.to_owned()))
        }));
        self.detach(&mut room, order_id, closed).await;
        drop(room);

        if let Some(driver) = session.and_then(|session| session.driver) {
            self.spawn_road_refinement(
                order_id,
                driver.position,
                vec![(customer.id.to_owned(), customer.position)],
            );
        }

        customer
    }

    /// Asks the routing gateway for road figures in the background. Stops at
    /// the first failure, leaving the straight-line figures in place.
    fn spawn_road_refinement(
        self: &Arc<Self>,
        order_id: &OrderId,
        driver_at: Coordinate,
        customers: Vec<(CustomerId, Coordinate)>,
    ) {
        let Some(gateway) = self.gateway.clone() else {
            return;
        };
        if customers.is_empty() {
            return;
        }

        let hub = Arc::clone(self);
        let order_id = order_id.to_owned();
        tokio::spawn(async move {
            for (customer_id, customer_at) in customers {
                match gateway.route(&driver_at, &customer_at).await {
                    Ok(estimate) => {
                        hub.apply_road_estimate(
                            &order_id,
                            &customer_id,
                            &driver_at,
                            &customer_at,
                            estimate,
                        )
                        .await
                    }
                    Err(_) => break,
                }
            }
        });
    }

    /// Applies a road estimate computed for the given positions and, if it
    /// still holds, pushes the refreshed views.
    pub async fn apply_road_estimate(
        &self,
        order_id: &OrderId,
        customer_id: &CustomerId,
        driver_at: &Coordinate,
        customer_at: &Coordinate,
        estimate: TravelEstimate,
    ) {
        let Some(mut room) = self.lock_existing_room(order_id).await else {
            return;
        };

        if self
            .registry
            .apply_road_estimate(order_id, customer_id, driver_at, customer_at, estimate)
            .await
            .is_none()
        {
            return;
        }

        let session = self.registry.get_session(order_id).await;
        let view = self.driver_view(session.as_ref());

        let closed = fan_out(&room, None, |participant| match participant {
            Participant::Driver => Some(TrackingEvent::CustomersUpdate(view.to_owned())),
            Participant::Customer(id) if id == customer_id => Some(TrackingEvent::DriverUpdate(
                customer_view(session.as_ref(), id),
            )),
            Participant::Customer(_) => None,
        });
        self.detach(&mut room, order_id, closed).await;
    }

    /// Voluntary departure of a customer. Ends all of that customer's streams
    /// and removes its slot.
    pub async fn disconnect_customer(
        &self,
        order_id: &OrderId,
        customer_id: &CustomerId,
    ) -> Result<(), AppError> {
        let mut room = self.lock_room(order_id).await;

        if self.registry.get_session(order_id).await.is_none() {
            self.release_if_unused(room, order_id).await;
            return Err(AppError::UnknownOrder(order_id.0.to_owned()));
        }

        let (leaving, staying): (Vec<Subscriber>, Vec<Subscriber>) = room
            .subscribers
            .drain(..)
            .partition(|subscriber| subscriber.participant.customer_id() == Some(customer_id));
        room.subscribers = staying;

        if !leaving.is_empty() {
            let mut connections = self.connections.write().await;
            for subscriber in &leaving {
                connections.remove(&subscriber.connection_id);
                CONNECTED_SUBSCRIBERS.dec();
            }
        }

        let closed = self.release_customer(&room, order_id, customer_id).await;
        self.detach(&mut room, order_id, closed).await;

        Ok(())
    }

    /// Administrative removal of an order. Remaining subscribers receive an
    /// `order-closed` event and their streams end.
    pub async fn teardown(&self, order_id: &OrderId) -> Result<Session, AppError> {
        let mut room = self.lock_room(order_id).await;

        let session = self.registry.remove_session(order_id).await;
        let closing = TrackingEvent::order_closed(order_id);

        let subscribers: Vec<Subscriber> = room.subscribers.drain(..).collect();
        if !subscribers.is_empty() {
            let mut connections = self.connections.write().await;
            for subscriber in subscribers {
                if subscriber.sender.try_send(closing.to_owned()).is_err() {
                    debug!(tag = "[Order Closed Not Delivered]", connection_id = %subscriber.connection_id.0);
                }
                connections.remove(&subscriber.connection_id);
                CONNECTED_SUBSCRIBERS.dec();
            }
        }

        self.close_room(room, order_id).await;

        info!(tag = "[Order Torn Down]", order_id = %order_id.0, had_session = session.is_some());

        session.ok_or(AppError::UnknownOrder(order_id.0.to_owned()))
    }

    /// Tears down sessions that have been idle for longer than the configured
    /// timeout and have nobody listening. Returns the swept orders.
    pub async fn sweep_idle(&self, now: TimeStamp) -> Vec<OrderId> {
        let idle_timeout = self.settings.session_idle_timeout;
        let mut swept = Vec::new();

        for order_id in self.registry.idle_sessions(now, idle_timeout).await {
            let room = self.lock_room(&order_id).await;

            if !room.subscribers.is_empty() {
                continue;
            }

            // Activity may have happened between listing and locking.
            let still_idle = self
                .registry
                .get_session(&order_id)
                .await
                .is_some_and(|session| session.is_idle(now, idle_timeout));
            if !still_idle {
                self.release_if_unused(room, &order_id).await;
                continue;
            }

            self.registry.remove_session(&order_id).await;
            self.close_room(room, &order_id).await;

            info!(tag = "[Idle Session Swept]", order_id = %order_id.0);
            swept.push(order_id);
        }

        swept
    }

    pub async fn inspect(&self, order_id: &OrderId) -> Result<OrderInspection, AppError> {
        let room = self.lock_existing_room(order_id).await;
        let subscriber_count = room.as_ref().map_or(0, |room| room.subscribers.len());

        let session = self
            .registry
            .get_session(order_id)
            .await
            .ok_or(AppError::UnknownOrder(order_id.0.to_owned()))?;

        let route_plan = session.driver.as_ref().map(|driver| {
            plan_route(&driver.position, &session.stops(), &self.settings.route_params)
        });

        Ok(OrderInspection {
            session,
            route_plan,
            subscriber_count,
        })
    }

    pub async fn subscriber_count(&self, order_id: &OrderId) -> usize {
        self.lock_existing_room(order_id)
            .await
            .map_or(0, |room| room.subscribers.len())
    }
}
