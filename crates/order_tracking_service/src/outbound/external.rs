/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, Url};
use tracing::{info, warn};

use super::types::*;
use crate::common::{geo::straight_line_estimate, types::*};
use crate::environment::RoutingConfig;
use crate::tools::{callapi::call_api, error::AppError};

/// Point-to-point routing and address lookup by a third party.
#[async_trait]
pub trait RoutingGateway: Send + Sync {
    async fn route(&self, from: &Coordinate, to: &Coordinate) -> Result<TravelEstimate, AppError>;

    async fn geocode(&self, address: &str) -> Result<Coordinate, AppError>;
}

/// Road figures when a gateway is configured and answers, straight-line figures otherwise.
pub async fn estimate_travel(
    gateway: Option<&dyn RoutingGateway>,
    from: &Coordinate,
    to: &Coordinate,
    avg_speed: KmPerHour,
) -> TravelEstimate {
    if let Some(gateway) = gateway {
        if let Ok(estimate) = gateway.route(from, to).await {
            return estimate;
        }
    }
    straight_line_estimate(from, to, avg_speed)
}

/// OpenRouteService directions plus a Nominatim compatible search endpoint.
pub struct OpenRouteServiceGateway {
    client: Client,
    route_url: Url,
    geocode_url: Url,
    api_key: String,
    degraded: AtomicBool,
}

impl OpenRouteServiceGateway {
    pub fn new(routing_cfg: &RoutingConfig) -> Result<Self, AppError> {
        let route_url = Url::parse(&routing_cfg.route_url).map_err(|err| {
            AppError::InvalidConfiguration(format!("route_url ({}) : {err}", routing_cfg.route_url))
        })?;
        let geocode_url = Url::parse(&routing_cfg.geocode_url).map_err(|err| {
            AppError::InvalidConfiguration(format!(
                "geocode_url ({}) : {err}",
                routing_cfg.geocode_url
            ))
        })?;

        let client = Client::builder()
            .timeout(Duration::from_millis(routing_cfg.request_timeout_ms))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| AppError::InvalidConfiguration(err.to_string()))?;

        Ok(Self {
            client,
            route_url,
            geocode_url,
            api_key: routing_cfg.api_key.to_owned(),
            degraded: AtomicBool::new(false),
        })
    }

    /// Logs once when the provider starts failing and once when it recovers.
    fn observe<T>(&self, result: Result<T, AppError>) -> Result<T, AppError> {
        match &result {
            Ok(_) | Err(AppError::AddressNotFound(_)) => {
                if self.degraded.swap(false, Ordering::Relaxed) {
                    info!(tag = "[Routing Gateway Recovered]");
                }
            }
            Err(err) => {
                if !self.degraded.swap(true, Ordering::Relaxed) {
                    warn!(tag = "[Routing Gateway Degraded]", error = %err.message(), "Falling back to straight-line estimates");
                }
            }
        }
        result
    }

    async fn fetch_route(
        &self,
        from: &Coordinate,
        to: &Coordinate,
    ) -> Result<TravelEstimate, AppError> {
        let request = DirectionsRequest {
            coordinates: vec![[from.lon().0, from.lat().0], [to.lon().0, to.lat().0]],
        };

        let response: DirectionsResponse = call_api(
            &self.client,
            Method::POST,
            &self.route_url,
            vec![("Authorization", self.api_key.as_str())],
            Some(request),
        )
        .await
        .map_err(|err| AppError::GatewayUnavailable(err.message()))?;

        let summary = response
            .routes
            .into_iter()
            .next()
            .map(|route| route.summary)
            .ok_or(AppError::GatewayUnavailable("No route returned".to_string()))?;

        Ok(TravelEstimate {
            distance_km: Kilometers(summary.distance / 1000.0),
            duration_minutes: Minutes((summary.duration / 60.0).round().max(0.0) as u32),
            source: EstimateSource::Road,
        })
    }

    async fn fetch_coordinate(&self, address: &str) -> Result<Coordinate, AppError> {
        let mut url = self.geocode_url.to_owned();
        url.query_pairs_mut()
            .append_pair("format", "json")
            .append_pair("limit", "1")
            .append_pair("q", address);

        let hits: Vec<GeocodeHit> = call_api(&self.client, Method::GET, &url, vec![], None::<()>)
            .await
            .map_err(|err| AppError::GatewayUnavailable(err.message()))?;

        let hit = hits
            .into_iter()
            .next()
            .ok_or(AppError::AddressNotFound(address.to_string()))?;

        let lat = hit.lat.parse::<f64>().map_err(|_| {
            AppError::GatewayUnavailable(format!("Unparsable latitude : {}", hit.lat))
        })?;
        let lon = hit.lon.parse::<f64>().map_err(|_| {
            AppError::GatewayUnavailable(format!("Unparsable longitude : {}", hit.lon))
        })?;

        Coordinate::new(lat, lon)
    }
}

#[async_trait]
impl RoutingGateway for OpenRouteServiceGateway {
    async fn route(&self, from: &Coordinate, to: &Coordinate) -> Result<TravelEstimate, AppError> {
        self.observe(self.fetch_route(from, to).await)
    }

    async fn geocode(&self, address: &str) -> Result<Coordinate, AppError> {
        self.observe(self.fetch_coordinate(address).await)
    }
}
