/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use serde::{Deserialize, Serialize};

#[derive(Serialize, Debug)]
pub struct DirectionsRequest {
    /// `[[lon, lat], [lon, lat]]`
    pub coordinates: Vec<[f64; 2]>,
}

#[derive(Deserialize, Debug)]
pub struct DirectionsResponse {
    pub routes: Vec<DirectionsRoute>,
}

#[derive(Deserialize, Debug)]
pub struct DirectionsRoute {
    pub summary: RouteSummary,
}

#[derive(Deserialize, Debug)]
pub struct RouteSummary {
    /// Meters. Absent when start and end are the same point.
    #[serde(default)]
    pub distance: f64,
    /// Seconds.
    #[serde(default)]
    pub duration: f64,
}

/// One search hit. The provider returns coordinates as strings.
#[derive(Deserialize, Debug)]
pub struct GeocodeHit {
    pub lat: String,
    pub lon: String,
}
