/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use crate::tools::error::AppError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use uuid::Uuid;

#[derive(Deserialize, Serialize, Clone, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct OrderId(pub String);
#[derive(Deserialize, Serialize, Clone, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct CustomerId(pub String);
#[derive(Deserialize, Serialize, Clone, Debug, Eq, Hash, PartialEq)]
pub struct ConnectionId(pub String);
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Copy)]
pub struct Latitude(pub f64);
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Copy)]
pub struct Longitude(pub f64);
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Hash, Ord)]
pub struct TimeStamp(pub DateTime<Utc>);
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, PartialOrd, Copy, Default)]
pub struct Kilometers(pub f64);
#[derive(Deserialize, Serialize, Clone, Debug, Eq, PartialEq, PartialOrd, Ord, Copy, Default)]
pub struct Minutes(pub u32);
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, PartialOrd, Copy)]
pub struct KmPerHour(pub f64);
#[derive(Deserialize, Serialize, Clone, Debug, Eq, PartialEq, PartialOrd, Ord, Copy)]
pub struct Seconds(pub u64);

impl ConnectionId {
    pub fn new() -> Self {
        ConnectionId(Uuid::new_v4().to_string())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeStamp {
    pub fn now() -> Self {
        TimeStamp(Utc::now())
    }
}

/// A validated position on the earth's surface.
///
/// The only way to build one is [`Coordinate::new`], so every `Coordinate` in
/// the system is finite and within range.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Copy)]
#[serde(try_from = "RawCoordinate")]
pub struct Coordinate {
    #[serde(rename = "latitude")]
    lat: Latitude,
    #[serde(rename = "longitude")]
    lon: Longitude,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Result<Self, AppError> {
        // NaN fails both range checks
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return Err(AppError::InvalidCoordinate(lat, lon));
        }
        Ok(Coordinate {
            lat: Latitude(lat),
            lon: Longitude(lon),
        })
    }

    pub fn lat(&self) -> Latitude {
        self.lat
    }

    pub fn lon(&self) -> Longitude {
        self.lon
    }
}

#[derive(Deserialize)]
struct RawCoordinate {
    latitude: f64,
    longitude: f64,
}

impl TryFrom<RawCoordinate> for Coordinate {
    type Error = AppError;

    fn try_from(raw: RawCoordinate) -> Result<Self, Self::Error> {
        Coordinate::new(raw.latitude, raw.longitude)
    }
}

#[derive(Debug, Clone, Copy, EnumString, Display, Serialize, Deserialize, Eq, Hash, PartialEq)]
pub enum Role {
    #[strum(serialize = "driver")]
    #[serde(rename = "driver")]
    Driver,
    #[strum(serialize = "customer")]
    #[serde(rename = "customer")]
    Customer,
}

/// Who a subscription speaks for. A customer subscription carries the
/// caller-supplied customer id so its slot can be released when it leaves.
#[derive(Debug, Clone, Eq, Hash, PartialEq)]
pub enum Participant {
    Driver,
    Customer(CustomerId),
}

impl Participant {
    pub fn role(&self) -> Role {
        match self {
            Participant::Driver => Role::Driver,
            Participant::Customer(_) => Role::Customer,
        }
    }

    pub fn customer_id(&self) -> Option<&CustomerId> {
        match self {
            Participant::Driver => None,
            Participant::Customer(customer_id) => Some(customer_id),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DriverState {
    #[serde(flatten)]
    pub position: Coordinate,
    pub last_updated_at: TimeStamp,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CustomerState {
    pub id: CustomerId,
    #[serde(flatten)]
    pub position: Coordinate,
    pub address: Option<String>,
    pub last_updated_at: TimeStamp,
    pub distance_km: Option<Kilometers>,
    pub eta_minutes: Option<Minutes>,
}

#[derive(Debug, Clone, Copy, Display, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum EstimateSource {
    #[strum(serialize = "straightLine")]
    StraightLine,
    #[strum(serialize = "road")]
    Road,
}

/// Distance and travel time between two points, either from the routing
/// gateway or from the straight-line fallback.
#[derive(Serialize, Clone, Debug, PartialEq, Copy)]
#[serde(rename_all = "camelCase")]
pub struct TravelEstimate {
    pub distance_km: Kilometers,
    pub duration_minutes: Minutes,
    pub source: EstimateSource,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct APISuccess {
    success: bool,
}

impl Default for APISuccess {
    fn default() -> Self {
        Self { success: true }
    }
}

#[derive(Serialize, Debug)]
pub struct ResponseData {
    pub result: String,
}
