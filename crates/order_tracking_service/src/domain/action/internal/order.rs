/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use crate::environment::AppState;
use crate::tools::error::AppError;
use crate::{common::types::*, domain::types::internal::order::*};
use actix_web::web::Data;

pub async fn order_details(
    order_id: OrderId,
    data: Data<AppState>,
) -> Result<OrderDetailsResponse, AppError> {
    let inspection = data.hub.inspect(&order_id).await?;
    let session = inspection.session;

    let customers = match &inspection.route_plan {
        Some(route_plan) => route_plan
            .ordered_stops
            .iter()
            .filter_map(|stop| session.customers.get(&stop.id).cloned())
            .collect(),
        None => session.customers_by_id(),
    };

    Ok(OrderDetailsResponse {
        order_id,
        driver: session.driver,
        customers,
        route: inspection.route_plan,
        subscribers: inspection.subscriber_count,
        created_at: session.created_at,
        last_activity_at: session.last_activity_at,
    })
}

pub async fn close_order(order_id: OrderId, data: Data<AppState>) -> Result<APISuccess, AppError> {
    data.hub.teardown(&order_id).await?;

    Ok(APISuccess::default())
}
