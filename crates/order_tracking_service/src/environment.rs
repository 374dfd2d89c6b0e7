/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use std::{sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    common::{route::RouteParams, types::*},
    hub::{ConnectionHub, HubSettings},
    outbound::external::{OpenRouteServiceGateway, RoutingGateway},
    registry::SessionRegistry,
    tools::{error::AppError, logger::LoggerConfig},
};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub workers: usize,
    pub logger_cfg: LoggerConfig,
    pub tracking_cfg: TrackingConfig,
    pub routing_cfg: RoutingConfig,
    pub request_timeout: u64,
    pub log_unprocessible_req_body: Vec<String>,
    pub max_allowed_req_size: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TrackingConfig {
    pub avg_speed_kmh: f64,
    pub per_stop_dwell_minutes: u32,
    pub subscriber_buffer: usize,
    pub keep_alive_seconds: u64,
    pub session_idle_timeout: u64,
    pub sweep_interval: u64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            avg_speed_kmh: 30.0,
            per_stop_dwell_minutes: 5,
            subscriber_buffer: 64,
            keep_alive_seconds: 15,
            session_idle_timeout: 3600,
            sweep_interval: 60,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RoutingConfig {
    pub enabled: bool,
    pub route_url: String,
    pub geocode_url: String,
    pub api_key: String,
    pub request_timeout_ms: u64,
}

/// Largest idle timeout, in seconds, that still fits a millisecond duration.
const MAX_SESSION_IDLE_TIMEOUT: u64 = (i64::MAX / 1000) as u64;

impl TrackingConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        if !(self.avg_speed_kmh.is_finite() && self.avg_speed_kmh > 0.0) {
            return Err(AppError::InvalidConfiguration(format!(
                "avg_speed_kmh must be positive, got {}",
                self.avg_speed_kmh
            )));
        }
        if self.subscriber_buffer == 0 {
            return Err(AppError::InvalidConfiguration(
                "subscriber_buffer must be at least 1".to_string(),
            ));
        }
        if self.keep_alive_seconds == 0 || self.sweep_interval == 0 {
            return Err(AppError::InvalidConfiguration(
                "keep_alive_seconds and sweep_interval must be at least 1".to_string(),
            ));
        }
        if self.session_idle_timeout > MAX_SESSION_IDLE_TIMEOUT {
            return Err(AppError::InvalidConfiguration(format!(
                "session_idle_timeout must be at most {MAX_SESSION_IDLE_TIMEOUT}, got {}",
                self.session_idle_timeout
            )));
        }
        Ok(())
    }

    pub fn hub_settings(&self) -> HubSettings {
        HubSettings {
            route_params: RouteParams {
                avg_speed: KmPerHour(self.avg_speed_kmh),
                per_stop_dwell: Minutes(self.per_stop_dwell_minutes),
            },
            subscriber_buffer: self.subscriber_buffer,
            session_idle_timeout: Seconds(self.session_idle_timeout),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<ConnectionHub>,
    pub keep_alive: Duration,
    pub sweep_interval: Duration,
    pub max_allowed_req_size: usize,
    pub log_unprocessible_req_body: Vec<String>,
    pub request_timeout: u64,
}

impl AppState {
    pub fn new(app_config: AppConfig) -> Result<AppState, AppError> {
        let tracking_cfg = app_config.tracking_cfg;
        tracking_cfg.validate()?;

        let gateway: Option<Arc<dyn RoutingGateway>> = if app_config.routing_cfg.enabled {
            info!(tag = "[Routing Gateway Enabled]", route_url = %app_config.routing_cfg.route_url, geocode_url = %app_config.routing_cfg.geocode_url);
            Some(Arc::new(OpenRouteServiceGateway::new(&app_config.routing_cfg)?))
        } else {
            info!(tag = "[Routing Gateway Disabled]", "Using straight-line estimates only");
            None
        };

        Ok(AppState::with_gateway(
            tracking_cfg,
            gateway,
            app_config.request_timeout,
            app_config.max_allowed_req_size,
            app_config.log_unprocessible_req_body,
        ))
    }

    /// Builds the state around an already constructed gateway. `tracking_cfg`
    /// is expected to be validated.
    pub fn with_gateway(
        tracking_cfg: TrackingConfig,
        gateway: Option<Arc<dyn RoutingGateway>>,
        request_timeout: u64,
        max_allowed_req_size: usize,
        log_unprocessible_req_body: Vec<String>,
    ) -> AppState {
        let settings = tracking_cfg.hub_settings();
        let registry = SessionRegistry::new(settings.route_params.avg_speed);

        AppState {
            hub: Arc::new(ConnectionHub::new(registry, settings, gateway)),
            keep_alive: Duration::from_secs(tracking_cfg.keep_alive_seconds),
            sweep_interval: Duration::from_secs(tracking_cfg.sweep_interval),
            max_allowed_req_size,
            log_unprocessible_req_body,
            request_timeout,
        }
    }
}
