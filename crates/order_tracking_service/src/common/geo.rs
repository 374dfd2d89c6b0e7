/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use std::f64::consts::PI;

use crate::common::types::*;

/// Mean radius of the earth in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

fn deg2rad(degrees: f64) -> f64 {
    degrees * PI / 180.0
}

/// Great-circle distance between two points using the haversine formula.
pub fn haversine_distance_km(from: &Coordinate, to: &Coordinate) -> Kilometers {
    let Latitude(lat1) = from.lat();
    let Longitude(lon1) = from.lon();
    let Latitude(lat2) = to.lat();
    let Longitude(lon2) = to.lon();

    let dlat = deg2rad(lat2 - lat1);
    let dlon = deg2rad(lon2 - lon1);

    let rlat1 = deg2rad(lat1);
    let rlat2 = deg2rad(lat2);

    let sq = |x: f64| x * x;

    // Both points are validated coordinates, so 0 <= h <= 1 up to rounding.
    let h = sq((dlat / 2.0).sin()) + rlat1.cos() * rlat2.cos() * sq((dlon / 2.0).sin());
    let h = h.clamp(0.0, 1.0);

    Kilometers(2.0 * EARTH_RADIUS_KM * h.sqrt().atan2((1.0 - h).sqrt()))
}

/// Minutes needed to cover `distance` at `speed`, rounded to the nearest minute.
///
/// `speed` is validated to be positive when the configuration is loaded.
pub fn estimate_eta_minutes(Kilometers(distance): Kilometers, KmPerHour(speed): KmPerHour) -> Minutes {
    Minutes((distance / speed * 60.0).round().max(0.0) as u32)
}

/// Straight-line distance and travel time, used whenever road figures are unavailable.
pub fn straight_line_estimate(from: &Coordinate, to: &Coordinate, speed: KmPerHour) -> TravelEstimate {
    let distance_km = haversine_distance_km(from, to);
    TravelEstimate {
        distance_km,
        duration_minutes: estimate_eta_minutes(distance_km, speed),
        source: EstimateSource::StraightLine,
    }
}
