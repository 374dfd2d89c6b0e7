/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use actix_web::{
    get, post,
    web::{Data, Json, Path, Query},
    HttpResponse,
};
use serde_json::Value;

use crate::{
    common::types::*,
    domain::{
        action::ui::{events, location},
        types::ui::location::*,
    },
    environment::AppState,
    tools::error::AppError,
};

#[post("/submit-driver-location")]
pub async fn submit_driver_location(
    data: Data<AppState>,
    param_obj: Json<Value>,
) -> Result<Json<APISuccess>, AppError> {
    let request_body = parse_report::<SubmitDriverLocationRequest>(param_obj.into_inner())?;

    Ok(Json(
        location::submit_driver_location(data, request_body).await?,
    ))
}

#[post("/submit-customer-location")]
pub async fn submit_customer_location(
    data: Data<AppState>,
    param_obj: Json<Value>,
) -> Result<Json<APISuccess>, AppError> {
    let request_body = parse_report::<SubmitCustomerLocationRequest>(param_obj.into_inner())?;

    Ok(Json(
        location::submit_customer_location(data, request_body).await?,
    ))
}

#[post("/disconnect")]
pub async fn disconnect(
    data: Data<AppState>,
    param_obj: Json<Value>,
) -> Result<Json<APISuccess>, AppError> {
    let request_body = parse_report::<DisconnectRequest>(param_obj.into_inner())?;

    Ok(Json(location::disconnect(data, request_body).await?))
}

#[get("/driver-events/{orderId}")]
pub async fn driver_events(data: Data<AppState>, path: Path<String>) -> HttpResponse {
    let order_id = OrderId(path.into_inner());

    events::open_event_stream(data, order_id, Participant::Driver).await
}

#[get("/customer-events/{orderId}")]
pub async fn customer_events(
    data: Data<AppState>,
    path: Path<String>,
    query: Query<CustomerEventsQuery>,
) -> Result<HttpResponse, AppError> {
    let order_id = OrderId(path.into_inner());
    let CustomerEventsQuery { customer_id } = query.into_inner();

    if customer_id.0.trim().is_empty() {
        return Err(AppError::InvalidRequest("customerId is empty".to_string()));
    }

    Ok(events::open_event_stream(data, order_id, Participant::Customer(customer_id)).await)
}
