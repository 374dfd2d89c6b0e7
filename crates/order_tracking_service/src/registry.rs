/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use std::sync::Arc;

use chrono::Duration;
use rustc_hash::FxHashMap;
use tokio::sync::{Mutex, RwLock};
use tracing::info;

use crate::common::{geo::*, route::Stop, types::*};
use crate::tools::prometheus::ACTIVE_SESSIONS;

/// In-memory tracking state of one order.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub order_id: OrderId,
    pub driver: Option<DriverState>,
    pub customers: FxHashMap<CustomerId, CustomerState>,
    pub created_at: TimeStamp,
    pub last_activity_at: TimeStamp,
}

impl Session {
    fn new(order_id: OrderId) -> Self {
        let now = TimeStamp::now();
        Self {
            order_id,
            driver: None,
            customers: FxHashMap::default(),
            created_at: now,
            last_activity_at: now,
        }
    }

    /// Customers as route stops, in no particular order.
    pub fn stops(&self) -> Vec<Stop> {
        self.customers
            .values()
            .map(|customer| Stop {
                id: customer.id.to_owned(),
                position: customer.position,
            })
            .collect()
    }

    /// A timeout too large to subtract from `now` never expires.
    pub fn is_idle(&self, now: TimeStamp, Seconds(idle_timeout): Seconds) -> bool {
        i64::try_from(idle_timeout)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|idle_timeout| now.0.checked_sub_signed(idle_timeout))
            .is_some_and(|cutoff| self.last_activity_at.0 <= cutoff)
    }

    /// Customers sorted by id, used when there is no driver to order them by.
    pub fn customers_by_id(&self) -> Vec<CustomerState> {
        let mut customers: Vec<CustomerState> = self.customers.values().cloned().collect();
        customers.sort_by(|a, b| a.id.cmp(&b.id));
        customers
    }
}

/// Owns every [`Session`] of the process.
///
/// The outer map lock is only held to find or insert an entry. Each session
/// sits behind its own mutex, so operations on different orders never wait on
/// each other and operations on the same order are applied one at a time.
pub struct SessionRegistry {
    sessions: RwLock<FxHashMap<OrderId, Arc<Mutex<Session>>>>,
    avg_speed: KmPerHour,
}

impl SessionRegistry {
    pub fn new(avg_speed: KmPerHour) -> Self {
        Self {
            sessions: RwLock::new(FxHashMap::default()),
            avg_speed,
        }
    }

    async fn existing(&self, order_id: &OrderId) -> Option<Arc<Mutex<Session>>> {
        self.sessions.read().await.get(order_id).cloned()
    }

    async fn get_or_create(&self, order_id: &OrderId) -> Arc<Mutex<Session>> {
        if let Some(session) = self.existing(order_id).await {
            return session;
        }

        let mut sessions = self.sessions.write().await;
        sessions
            .entry(order_id.to_owned())
            .or_insert_with(|| {
                info!(tag = "[Session Created]", order_id = %order_id.0);
                ACTIVE_SESSIONS.inc();
                Arc::new(Mutex::new(Session::new(order_id.to_owned())))
            })
            .clone()
    }

    pub(crate) async fn upsert_driver(&self, order_id: &OrderId, position: Coordinate) -> DriverState {
        let session = self.get_or_create(order_id).await;
        let mut session = session.lock().await;

        let driver = DriverState {
            position,
            last_updated_at: TimeStamp::now(),
        };
        session.driver = Some(driver.to_owned());
        session.last_activity_at = driver.last_updated_at;

        driver
    }

    /// Overwrites the customer's slot and recomputes its straight-line
    /// distance and ETA when a driver is known.
    pub(crate) async fn upsert_customer(
        &self,
        order_id: &OrderId,
        customer_id: &CustomerId,
        position: Coordinate,
        address: Option<String>,
    ) -> CustomerState {
        let session = self.get_or_create(order_id).await;
        let mut session = session.lock().await;

        let estimate = session
            .driver
            .as_ref()
            .map(|driver| straight_line_estimate(&driver.position, &position, self.avg_speed));

        let customer = CustomerState {
            id: customer_id.to_owned(),
            position,
            address,
            last_updated_at: TimeStamp::now(),
            distance_km: estimate.map(|estimate| estimate.distance_km),
            eta_minutes: estimate.map(|estimate| estimate.duration_minutes),
        };

        session.last_activity_at = customer.last_updated_at;
        session
            .customers
            .insert(customer_id.to_owned(), customer.to_owned());

        customer
    }

    /// Recomputes every customer's straight-line figures against the current
    /// driver position. Returns the refreshed customers, or nothing without a driver.
    pub(crate) async fn refresh_customer_distances(&self, order_id: &OrderId) -> Vec<CustomerState> {
        let Some(session) = self.existing(order_id).await else {
            return Vec::new();
        };
        let mut session = session.lock().await;

        let Some(driver_position) = session.driver.as_ref().map(|driver| driver.position) else {
            return Vec::new();
        };

        session
            .customers
            .values_mut()
            .map(|customer| {
                let estimate =
                    straight_line_estimate(&driver_position, &customer.position, self.avg_speed);
                customer.distance_km = Some(estimate.distance_km);
                customer.eta_minutes = Some(estimate.duration_minutes);
                customer.to_owned()
            })
            .collect()
    }

    /// Returns whether a slot was actually removed.
    pub(crate) async fn remove_customer(&self, order_id: &OrderId, customer_id: &CustomerId) -> bool {
        let Some(session) = self.existing(order_id).await else {
            return false;
        };
        let mut session = session.lock().await;

        let removed = session.customers.remove(customer_id).is_some();
        if removed {
            session.last_activity_at = TimeStamp::now();
        }
        removed
    }

    pub async fn get_session(&self, order_id: &OrderId) -> Option<Session> {
        let session = self.existing(order_id).await?;
        let session = session.lock().await;
        Some(session.to_owned())
    }

    pub(crate) async fn remove_session(&self, order_id: &OrderId) -> Option<Session> {
        let session = self.sessions.write().await.remove(order_id)?;
        ACTIVE_SESSIONS.dec();
        info!(tag = "[Session Removed]", order_id = %order_id.0);
        let session = session.lock().await;
        Some(session.to_owned())
    }

    /// Overwrites a customer's figures with a road-accurate estimate, as long
    /// as neither party has moved since the estimate was requested.
    pub(crate) async fn apply_road_estimate(
        &self,
        order_id: &OrderId,
        customer_id: &CustomerId,
        driver_at: &Coordinate,
        customer_at: &Coordinate,
        estimate: TravelEstimate,
    ) -> Option<CustomerState> {
        let session = self.existing(order_id).await?;
        let mut session = session.lock().await;

        if session.driver.as_ref().map(|driver| &driver.position) != Some(driver_at) {
            return None;
        }

        let customer = session.customers.get_mut(customer_id)?;
        if &customer.position != customer_at {
            return None;
        }

        customer.distance_km = Some(estimate.distance_km);
        customer.eta_minutes = Some(estimate.duration_minutes);

        Some(customer.to_owned())
    }

    /// Orders whose last mutation is older than `idle_timeout`.
    pub(crate) async fn idle_sessions(&self, now: TimeStamp, idle_timeout: Seconds) -> Vec<OrderId> {
        let sessions: Vec<Arc<Mutex<Session>>> =
            self.sessions.read().await.values().cloned().collect();

        let mut idle = Vec::new();
        for session in sessions {
            let session = session.lock().await;
            if session.is_idle(now, idle_timeout) {
                idle.push(session.order_id.to_owned());
            }
        }
        idle
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
