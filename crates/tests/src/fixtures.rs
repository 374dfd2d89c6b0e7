/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use order_tracking_service::{
    common::types::*,
    domain::types::ui::events::TrackingEvent,
    environment::{AppState, TrackingConfig},
    hub::{ConnectionHub, Subscription},
    outbound::external::RoutingGateway,
    registry::SessionRegistry,
    tools::error::AppError,
};

pub fn coordinate(lat: f64, lon: f64) -> Coordinate {
    Coordinate::new(lat, lon).expect("valid coordinate")
}

pub fn order(id: &str) -> OrderId {
    OrderId(id.to_string())
}

pub fn customer(id: &str) -> CustomerId {
    CustomerId(id.to_string())
}

pub fn hub_with(gateway: Option<Arc<dyn RoutingGateway>>) -> Arc<ConnectionHub> {
    hub_with_config(TrackingConfig::default(), gateway)
}

pub fn hub_with_config(
    tracking_cfg: TrackingConfig,
    gateway: Option<Arc<dyn RoutingGateway>>,
) -> Arc<ConnectionHub> {
    let settings = tracking_cfg.hub_settings();
    Arc::new(ConnectionHub::new(
        SessionRegistry::new(settings.route_params.avg_speed),
        settings,
        gateway,
    ))
}

pub fn app_state_with(gateway: Option<Arc<dyn RoutingGateway>>) -> AppState {
    AppState::with_gateway(
        TrackingConfig::default(),
        gateway,
        9000,
        512_000,
        vec!["MALFORMED_REPORT".to_string()],
    )
}

/// Next queued event, failing the test if none arrives within a second.
pub async fn next_event(subscription: &mut Subscription) -> TrackingEvent {
    tokio::time::timeout(Duration::from_secs(1), subscription.receiver.recv())
        .await
        .expect("no event within a second")
        .expect("subscription closed")
}

/// Everything queued right now, without waiting.
pub fn drain(subscription: &mut Subscription) -> Vec<TrackingEvent> {
    let mut events = Vec::new();
    while let Ok(event) = subscription.receiver.try_recv() {
        events.push(event);
    }
    events
}

/// Gateway whose every call fails, as when the provider is down.
pub struct UnreachableGateway;

#[async_trait]
impl RoutingGateway for UnreachableGateway {
    async fn route(&self, _: &Coordinate, _: &Coordinate) -> Result<TravelEstimate, AppError> {
        Err(AppError::GatewayUnavailable("connection refused".to_string()))
    }

    async fn geocode(&self, _: &str) -> Result<Coordinate, AppError> {
        Err(AppError::GatewayUnavailable("connection refused".to_string()))
    }
}

/// Gateway answering every route with the same road figures and every
/// address with the same position.
pub struct FixedGateway {
    pub estimate: TravelEstimate,
    pub position: Coordinate,
}

#[async_trait]
impl RoutingGateway for FixedGateway {
    async fn route(&self, _: &Coordinate, _: &Coordinate) -> Result<TravelEstimate, AppError> {
        Ok(self.estimate)
    }

    async fn geocode(&self, address: &str) -> Result<Coordinate, AppError> {
        if address == "nowhere" {
            return Err(AppError::AddressNotFound(address.to_string()));
        }
        Ok(self.position)
    }
}

/// Gateway answering with a fixed road estimate per destination.
pub struct RoadTable(pub Vec<(Coordinate, TravelEstimate)>);

#[async_trait]
impl RoutingGateway for RoadTable {
    async fn route(&self, _: &Coordinate, to: &Coordinate) -> Result<TravelEstimate, AppError> {
        self.0
            .iter()
            .find(|(destination, _)| destination == to)
            .map(|(_, estimate)| *estimate)
            .ok_or(AppError::GatewayUnavailable("no road known".to_string()))
    }

    async fn geocode(&self, address: &str) -> Result<Coordinate, AppError> {
        Err(AppError::AddressNotFound(address.to_string()))
    }
}
