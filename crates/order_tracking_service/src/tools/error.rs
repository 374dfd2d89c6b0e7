/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use actix_web::{
    http::{header::ContentType, StatusCode},
    HttpResponse, ResponseError,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error_message: String,
    pub error_code: String,
}

#[macros::add_error]
pub enum AppError {
    InvalidRequest(String),
    InvalidCoordinate(f64, f64),
    MalformedReport(String),
    UnknownOrder(String),
    GatewayUnavailable(String),
    AddressNotFound(String),
    TransportError(String),
    LargePayloadSize(usize, usize),
    ExternalAPICallError(String),
    SerializationError(String),
    DeserializationError(String),
    InvalidConfiguration(String),
    RequestTimeout,
}

impl AppError {
    pub fn error_body(&self) -> ErrorBody {
        ErrorBody {
            error_message: self.message(),
            error_code: self.code(),
        }
    }

    pub fn message(&self) -> String {
        match self {
            AppError::InvalidRequest(err) => err.to_string(),
            AppError::InvalidCoordinate(lat, lon) => {
                format!("Coordinate out of range : (Lat : {lat}, Lon : {lon})")
            }
            AppError::MalformedReport(err) => format!("Malformed location report : {err}"),
            AppError::UnknownOrder(order_id) => {
                format!("No tracking session for order : {order_id}")
            }
            AppError::GatewayUnavailable(err) => format!("Routing gateway unavailable : {err}"),
            AppError::AddressNotFound(address) => format!("Address not found : {address}"),
            AppError::TransportError(err) => err.to_string(),
            AppError::LargePayloadSize(length, limit) => {
                format!("Content length ({length} Bytes) greater than allowed maximum limit : ({limit} Bytes)")
            }
            AppError::ExternalAPICallError(err) => err.to_string(),
            AppError::SerializationError(err) => err.to_string(),
            AppError::DeserializationError(err) => err.to_string(),
            AppError::InvalidConfiguration(err) => format!("Invalid configuration : {err}"),
            AppError::RequestTimeout => "Request timed out".to_string(),
        }
    }

    pub fn code(&self) -> String {
        match self {
            AppError::InvalidRequest(_) => "INVALID_REQUEST",
            AppError::InvalidCoordinate(_, _) => "INVALID_COORDINATE",
            AppError::MalformedReport(_) => "MALFORMED_REPORT",
            AppError::UnknownOrder(_) => "UNKNOWN_ORDER",
            AppError::GatewayUnavailable(_) => "GATEWAY_UNAVAILABLE",
            AppError::AddressNotFound(_) => "ADDRESS_NOT_FOUND",
            AppError::TransportError(_) => "TRANSPORT_ERROR",
            AppError::LargePayloadSize(_, _) => "LARGE_PAYLOAD_SIZE",
            AppError::ExternalAPICallError(_) => "EXTERNAL_API_CALL_ERROR",
            AppError::SerializationError(_) => "SERIALIZATION_ERROR",
            AppError::DeserializationError(_) => "DESERIALIZATION_ERROR",
            AppError::InvalidConfiguration(_) => "INVALID_CONFIGURATION",
            AppError::RequestTimeout => "REQUEST_TIMEOUT",
        }
        .to_string()
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .json(self.error_body())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidCoordinate(_, _) => StatusCode::BAD_REQUEST,
            AppError::MalformedReport(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::UnknownOrder(_) => StatusCode::NOT_FOUND,
            AppError::GatewayUnavailable(_) => StatusCode::BAD_GATEWAY,
            AppError::AddressNotFound(_) => StatusCode::NOT_FOUND,
            AppError::TransportError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::LargePayloadSize(_, _) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::ExternalAPICallError(_) => StatusCode::BAD_GATEWAY,
            AppError::SerializationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::DeserializationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::InvalidConfiguration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::RequestTimeout => StatusCode::REQUEST_TIMEOUT,
        }
    }
}
