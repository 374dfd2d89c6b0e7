/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use actix_web::{
    delete, get,
    web::{Data, Json, Path},
};

use crate::{
    common::types::*,
    domain::{action::internal::order, types::internal::order::*},
    environment::AppState,
    tools::error::AppError,
};

#[get("/internal/orders/{orderId}")]
pub async fn order_details(
    data: Data<AppState>,
    path: Path<String>,
) -> Result<Json<OrderDetailsResponse>, AppError> {
    let order_id = OrderId(path.into_inner());

    Ok(Json(order::order_details(order_id, data).await?))
}

#[delete("/internal/orders/{orderId}")]
pub async fn close_order(data: Data<AppState>, path: Path<String>) -> Result<Json<APISuccess>, AppError> {
    let order_id = OrderId(path.into_inner());

    Ok(Json(order::close_order(order_id, data).await?))
}
