/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use macros::measure_duration;
use serde::Serialize;
use tracing::debug;

use crate::common::{geo::*, types::*};

#[derive(Debug, Clone, PartialEq)]
pub struct Stop {
    pub id: CustomerId,
    pub position: Coordinate,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlannedStop {
    pub id: CustomerId,
    /// Straight-line distance from the driver, not from the previous stop.
    pub distance_km: Kilometers,
    pub eta_minutes: Minutes,
}

#[derive(Serialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct RoutePlan {
    pub ordered_stops: Vec<PlannedStop>,
    /// Length of the chained path driver -> first stop -> ... -> last stop.
    pub total_distance_km: Kilometers,
    pub total_time_minutes: Minutes,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteParams {
    pub avg_speed: KmPerHour,
    pub per_stop_dwell: Minutes,
}

impl Default for RouteParams {
    fn default() -> Self {
        Self {
            avg_speed: KmPerHour(30.0),
            per_stop_dwell: Minutes(5),
        }
    }
}

/// Orders `stops` nearest-first from the driver and computes the trip totals.
///
/// A single pass sort on the distance from the driver's current position, not a
/// tour optimisation. Equal distances fall back to the stop id so the result is
/// stable across calls. Total time is travel time on the chained path plus one
/// dwell per stop, rounded once at the end.
#[measure_duration]
pub fn plan_route(driver: &Coordinate, stops: &[Stop], params: &RouteParams) -> RoutePlan {
    let mut measured: Vec<(&Stop, Kilometers)> = stops
        .iter()
        .map(|stop| (stop, haversine_distance_km(driver, &stop.position)))
        .collect();

    measured.sort_by(|(stop_a, Kilometers(dist_a)), (stop_b, Kilometers(dist_b))| {
        dist_a.total_cmp(dist_b).then_with(|| stop_a.id.cmp(&stop_b.id))
    });

    let mut total_distance = 0.0;
    let mut previous = *driver;
    let mut ordered_stops = Vec::with_capacity(measured.len());

    for (stop, distance_km) in measured {
        let Kilometers(leg) = haversine_distance_km(&previous, &stop.position);
        total_distance += leg;
        previous = stop.position;

        ordered_stops.push(PlannedStop {
            id: stop.id.to_owned(),
            distance_km,
            eta_minutes: estimate_eta_minutes(distance_km, params.avg_speed),
        });
    }

    let KmPerHour(speed) = params.avg_speed;
    let Minutes(dwell) = params.per_stop_dwell;
    let total_time = total_distance / speed * 60.0 + (ordered_stops.len() as f64) * (dwell as f64);

    RoutePlan {
        ordered_stops,
        total_distance_km: Kilometers(total_distance),
        total_time_minutes: Minutes(total_time.round() as u32),
    }
}
