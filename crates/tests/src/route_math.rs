/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use order_tracking_service::common::{geo::*, route::*, types::*};

use crate::fixtures::*;

#[test]
fn haversine_is_symmetric_and_zero_on_itself() {
    let points = [
        coordinate(12.9716, 77.5946),
        coordinate(-33.8688, 151.2093),
        coordinate(90.0, 0.0),
        coordinate(0.0, -180.0),
        coordinate(51.5074, -0.1278),
    ];

    for a in &points {
        assert_eq!(haversine_distance_km(a, a), Kilometers(0.0));
        for b in &points {
            let Kilometers(ab) = haversine_distance_km(a, b);
            let Kilometers(ba) = haversine_distance_km(b, a);
            assert!((ab - ba).abs() < 1e-9, "{ab} != {ba}");
        }
    }
}

#[test]
fn eta_from_distance_and_speed() {
    assert_eq!(estimate_eta_minutes(Kilometers(60.0), KmPerHour(30.0)), Minutes(120));
    assert_eq!(estimate_eta_minutes(Kilometers(0.0), KmPerHour(30.0)), Minutes(0));
}

#[test]
fn nearer_stop_comes_first_and_total_follows_the_path() {
    let driver = coordinate(0.0, 0.0);
    let near = coordinate(0.0, 1.0);
    let far = coordinate(0.0, 2.0);
    let stops = vec![
        Stop {
            id: customer("far"),
            position: far,
        },
        Stop {
            id: customer("near"),
            position: near,
        },
    ];

    let plan = plan_route(&driver, &stops, &RouteParams::default());

    let order: Vec<&str> = plan
        .ordered_stops
        .iter()
        .map(|stop| stop.id.0.as_str())
        .collect();
    assert_eq!(order, vec!["near", "far"]);

    let Kilometers(leg_one) = haversine_distance_km(&driver, &near);
    let Kilometers(leg_two) = haversine_distance_km(&near, &far);
    let Kilometers(direct) = haversine_distance_km(&driver, &far);
    let Kilometers(total) = plan.total_distance_km;

    assert!((total - (leg_one + leg_two)).abs() < 1e-6);
    assert!(total + 1e-9 >= direct);

    // Per-stop figures are measured from the driver, not along the path.
    assert!((plan.ordered_stops[1].distance_km.0 - direct).abs() < 1e-6);
}

#[test]
fn total_time_adds_dwell_per_stop() {
    let driver = coordinate(0.0, 0.0);
    let stops = vec![Stop {
        id: customer("only"),
        position: coordinate(0.0, 1.0),
    }];
    let params = RouteParams {
        avg_speed: KmPerHour(30.0),
        per_stop_dwell: Minutes(5),
    };

    let plan = plan_route(&driver, &stops, &params);

    // 111.19 km at 30 km/h is 222.4 minutes, plus one dwell.
    assert_eq!(plan.total_time_minutes, Minutes(227));
}

#[test]
fn no_stops_is_an_empty_plan() {
    let plan = plan_route(&coordinate(10.0, 10.0), &[], &RouteParams::default());

    assert!(plan.ordered_stops.is_empty());
    assert_eq!(plan.total_distance_km, Kilometers(0.0));
    assert_eq!(plan.total_time_minutes, Minutes(0));
}

#[test]
fn out_of_range_coordinates_are_rejected() {
    assert!(Coordinate::new(90.5, 0.0).is_err());
    assert!(Coordinate::new(0.0, -180.5).is_err());
    assert!(Coordinate::new(f64::NAN, 0.0).is_err());
    assert!(Coordinate::new(-90.0, 180.0).is_ok());
}
