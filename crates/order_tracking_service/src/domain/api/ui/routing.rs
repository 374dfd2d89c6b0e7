/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use actix_web::{
    post,
    web::{Data, Json},
};

use crate::{
    common::types::*,
    domain::{action::ui::routing, types::ui::location::*},
    environment::AppState,
    tools::error::AppError,
};

#[post("/route")]
pub async fn route(
    data: Data<AppState>,
    param_obj: Json<RouteRequest>,
) -> Result<Json<TravelEstimate>, AppError> {
    Ok(Json(routing::route(data, param_obj.into_inner()).await?))
}

#[post("/geocode")]
pub async fn geocode(
    data: Data<AppState>,
    param_obj: Json<GeocodeRequest>,
) -> Result<Json<Coordinate>, AppError> {
    Ok(Json(routing::geocode(data, param_obj.into_inner()).await?))
}
