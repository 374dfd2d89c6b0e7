/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use actix_web::web::Bytes;
use serde::Serialize;
use serde_json::Value;
use strum_macros::Display;

use crate::common::types::*;
use crate::tools::error::{AppError, ErrorBody};

/// What a driver sees: every customer, nearest first, with trip totals.
///
/// Without a driver position the customers are listed by id and the totals are absent.
///
/// The order and the totals always follow straight-line distance. A customer's
/// `distanceKm` and `etaMinutes` may already hold road figures, so they need not
/// increase down the list.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DriverView {
    pub driver: Option<DriverState>,
    pub customers: Vec<CustomerState>,
    pub total_distance_km: Option<Kilometers>,
    pub total_time_minutes: Option<Minutes>,
}

/// What one customer sees: the driver and its own distance and ETA.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CustomerView {
    pub driver: Option<DriverState>,
    pub customer: Option<CustomerState>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum Snapshot {
    Driver(DriverView),
    Customer(CustomerView),
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct CustomerDisconnected {
    pub id: CustomerId,
}

/// Events pushed to subscribers. The display name is the SSE event name.
#[derive(Debug, Clone, PartialEq, Display)]
pub enum TrackingEvent {
    #[strum(serialize = "initial")]
    Initial(Snapshot),
    #[strum(serialize = "driver-update")]
    DriverUpdate(CustomerView),
    #[strum(serialize = "customer-update")]
    CustomerUpdate(CustomerState),
    #[strum(serialize = "customers-update")]
    CustomersUpdate(DriverView),
    #[strum(serialize = "customer-disconnected")]
    CustomerDisconnected(CustomerDisconnected),
    #[strum(serialize = "order-closed")]
    OrderClosed(ErrorBody),
}

impl TrackingEvent {
    pub fn order_closed(order_id: &OrderId) -> Self {
        TrackingEvent::OrderClosed(AppError::UnknownOrder(order_id.0.to_owned()).error_body())
    }

    pub fn data(&self) -> Result<Value, AppError> {
        match self {
            TrackingEvent::Initial(snapshot) => serde_json::to_value(snapshot),
            TrackingEvent::DriverUpdate(view) => serde_json::to_value(view),
            TrackingEvent::CustomerUpdate(customer) => serde_json::to_value(customer),
            TrackingEvent::CustomersUpdate(view) => serde_json::to_value(view),
            TrackingEvent::CustomerDisconnected(disconnected) => serde_json::to_value(disconnected),
            TrackingEvent::OrderClosed(reason) => serde_json::to_value(reason),
        }
        .map_err(|err| AppError::SerializationError(err.to_string()))
    }

    /// One `text/event-stream` frame.
    pub fn to_sse_frame(&self) -> Result<Bytes, AppError> {
        Ok(Bytes::from(format!("event: {}\ndata: {}\n\n", self, self.data()?)))
    }
}

pub fn keep_alive_frame() -> Bytes {
    Bytes::from_static(b": keep-alive\n\n")
}
