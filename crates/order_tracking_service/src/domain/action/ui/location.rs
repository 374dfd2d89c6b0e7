/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use actix_web::web::Data;
use tracing::info;

use crate::common::types::*;
use crate::domain::types::ui::location::*;
use crate::environment::AppState;
use crate::tools::error::AppError;

pub async fn submit_driver_location(
    data: Data<AppState>,
    request_body: SubmitDriverLocationRequest,
) -> Result<APISuccess, AppError> {
    let position = Coordinate::new(request_body.latitude, request_body.longitude)?;

    data.hub
        .report_driver_location(&request_body.order_id, position, None)
        .await;

    Ok(APISuccess::default())
}

/// Coordinates win when both are present. An address on its own is resolved
/// through the geocoder first.
pub async fn submit_customer_location(
    data: Data<AppState>,
    request_body: SubmitCustomerLocationRequest,
) -> Result<APISuccess, AppError> {
    let SubmitCustomerLocationRequest {
        order_id,
        customer_id,
        latitude,
        longitude,
        address,
    } = request_body;

    let position = match (latitude, longitude, address.as_deref()) {
        (Some(latitude), Some(longitude), _) => Coordinate::new(latitude, longitude)?,
        (None, None, Some(address)) if !address.trim().is_empty() => {
            let gateway = data.hub.gateway().ok_or(AppError::GatewayUnavailable(
                "Geocoding is not configured".to_string(),
            ))?;
            gateway.geocode(address).await?
        }
        _ => {
            return Err(AppError::MalformedReport(
                "Expected latitude and longitude, or an address".to_string(),
            ))
        }
    };

    data.hub
        .report_customer_location(&order_id, &customer_id, position, address, None)
        .await;

    Ok(APISuccess::default())
}

pub async fn disconnect(
    data: Data<AppState>,
    request_body: DisconnectRequest,
) -> Result<APISuccess, AppError> {
    match request_body.role {
        Role::Customer => {
            data.hub
                .disconnect_customer(&request_body.order_id, &request_body.customer_id)
                .await?
        }
        // Driver state survives disconnects so a reconnect resumes where it left off.
        Role::Driver => {
            info!(tag = "[Driver Disconnect Ignored]", order_id = %request_body.order_id.0)
        }
    }

    Ok(APISuccess::default())
}
