/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use actix_web::web::Data;

use crate::common::types::*;
use crate::domain::types::ui::location::{GeocodeRequest, RouteRequest};
use crate::environment::AppState;
use crate::outbound::external::estimate_travel;
use crate::tools::error::AppError;

/// Never fails on provider trouble: the straight-line estimate is returned instead.
pub async fn route(
    data: Data<AppState>,
    request_body: RouteRequest,
) -> Result<TravelEstimate, AppError> {
    let [start_lat, start_lon] = request_body.start;
    let [end_lat, end_lon] = request_body.end;
    let start = Coordinate::new(start_lat, start_lon)?;
    let end = Coordinate::new(end_lat, end_lon)?;

    Ok(estimate_travel(
        data.hub.gateway(),
        &start,
        &end,
        data.hub.settings().route_params.avg_speed,
    )
    .await)
}

pub async fn geocode(
    data: Data<AppState>,
    request_body: GeocodeRequest,
) -> Result<Coordinate, AppError> {
    if request_body.address.trim().is_empty() {
        return Err(AppError::InvalidRequest("address is empty".to_string()));
    }

    let gateway = data.hub.gateway().ok_or(AppError::GatewayUnavailable(
        "Geocoding is not configured".to_string(),
    ))?;

    gateway.geocode(&request_body.address).await
}
