/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use order_tracking_service::{
    common::types::*,
    domain::{
        action::ui::events::event_stream,
        types::ui::{events::*, location::*},
    },
    environment::TrackingConfig,
    outbound::external::{estimate_travel, RoutingGateway},
    tools::error::AppError,
};
use serde_json::json;

use crate::fixtures::*;

fn customer_ids(view: &DriverView) -> Vec<&str> {
    view.customers
        .iter()
        .map(|customer| customer.id.0.as_str())
        .collect()
}

#[tokio::test]
async fn late_subscriber_sees_the_last_driver_position() {
    let hub = hub_with(None);
    let order_id = order("order-1");
    let position = coordinate(12.9716, 77.5946);

    hub.report_driver_location(&order_id, position, None).await;
    let mut subscription = hub
        .subscribe(&order_id, Participant::Customer(customer("c1")))
        .await;

    match next_event(&mut subscription).await {
        TrackingEvent::Initial(Snapshot::Customer(view)) => {
            let driver = view.driver.expect("driver in initial snapshot");
            assert_eq!(driver.position, position);
            assert!(view.customer.is_none());
        }
        other => panic!("unexpected first event {other}"),
    }
}

#[tokio::test]
async fn repeated_customer_reports_keep_only_the_latest_position() {
    let hub = hub_with(None);
    let order_id = order("order-2");
    let first = coordinate(20.1, 78.0);
    let second = coordinate(20.2, 78.1);

    hub.report_customer_location(&order_id, &customer("c1"), first, None, None)
        .await;
    hub.report_customer_location(&order_id, &customer("c1"), second, None, None)
        .await;

    let session = hub
        .session(&order_id)
        .await
        .expect("session exists");
    assert_eq!(session.customers.len(), 1);
    assert_eq!(session.customers[&customer("c1")].position, second);
}

#[tokio::test]
async fn customer_departure_is_announced_once_and_dropped_from_later_updates() {
    let hub = hub_with(None);
    let order_id = order("order-3");

    hub.report_driver_location(&order_id, coordinate(20.0, 78.0), None)
        .await;
    hub.report_customer_location(&order_id, &customer("c1"), coordinate(20.1, 78.0), None, None)
        .await;
    hub.report_customer_location(&order_id, &customer("c2"), coordinate(20.5, 78.0), None, None)
        .await;

    let mut driver = hub.subscribe(&order_id, Participant::Driver).await;
    let mut staying = hub
        .subscribe(&order_id, Participant::Customer(customer("c2")))
        .await;
    let leaving = hub
        .subscribe(&order_id, Participant::Customer(customer("c1")))
        .await;
    drain(&mut driver);
    drain(&mut staying);

    let leaving_connection = leaving.connection_id.to_owned();
    drop(leaving);
    hub.unsubscribe(&leaving_connection).await;

    let driver_events = drain(&mut driver);
    let staying_events = drain(&mut staying);

    for events in [&driver_events, &staying_events] {
        let announcements: Vec<&CustomerDisconnected> = events
            .iter()
            .filter_map(|event| match event {
                TrackingEvent::CustomerDisconnected(disconnected) => Some(disconnected),
                _ => None,
            })
            .collect();
        assert_eq!(announcements.len(), 1);
        assert_eq!(announcements[0].id, customer("c1"));
    }

    hub.report_driver_location(&order_id, coordinate(20.01, 78.0), None)
        .await;

    let updates: Vec<DriverView> = drain(&mut driver)
        .into_iter()
        .filter_map(|event| match event {
            TrackingEvent::CustomersUpdate(view) => Some(view),
            _ => None,
        })
        .collect();
    assert!(!updates.is_empty());
    for view in &updates {
        assert_eq!(customer_ids(view), vec!["c2"]);
    }

    // Unsubscribing twice is harmless.
    hub.unsubscribe(&leaving_connection).await;
    assert!(drain(&mut driver).is_empty());
}

#[tokio::test]
async fn reconnecting_customer_keeps_its_slot() {
    let hub = hub_with(None);
    let order_id = order("order-4");

    hub.report_customer_location(&order_id, &customer("c1"), coordinate(20.1, 78.0), None, None)
        .await;

    let old_stream = hub
        .subscribe(&order_id, Participant::Customer(customer("c1")))
        .await;
    let mut new_stream = hub
        .subscribe(&order_id, Participant::Customer(customer("c1")))
        .await;
    drain(&mut new_stream);

    hub.unsubscribe(&old_stream.connection_id).await;

    assert!(drain(&mut new_stream).is_empty());
    let session = hub
        .session(&order_id)
        .await
        .expect("session exists");
    assert!(session.customers.contains_key(&customer("c1")));
    assert_eq!(hub.subscriber_count(&order_id).await, 1);
}

#[tokio::test]
async fn malformed_report_leaves_the_session_untouched() {
    let hub = hub_with(None);
    let order_id = order("order-5");
    hub.report_driver_location(&order_id, coordinate(20.0, 78.0), None)
        .await;
    let before = hub.session(&order_id).await;

    let result = parse_report::<SubmitDriverLocationRequest>(json!({
        "orderId": "order-5",
        "latitude": "abc",
        "longitude": 78.0,
    }));

    assert!(matches!(result, Err(AppError::MalformedReport(_))));
    assert_eq!(hub.session(&order_id).await, before);
}

#[tokio::test]
async fn driver_view_lists_nearer_customer_first() {
    let hub = hub_with(None);
    let order_id = order("order-6");

    hub.report_driver_location(&order_id, coordinate(20.0, 78.0), None)
        .await;
    hub.report_customer_location(
        &order_id,
        &customer("B"),
        coordinate(20.5, 78.0),
        Some("Far street".to_string()),
        None,
    )
    .await;
    hub.report_customer_location(
        &order_id,
        &customer("A"),
        coordinate(20.1, 78.0),
        Some("Near street".to_string()),
        None,
    )
    .await;

    let mut driver = hub.subscribe(&order_id, Participant::Driver).await;

    let TrackingEvent::Initial(Snapshot::Driver(view)) = next_event(&mut driver).await else {
        panic!("driver snapshot expected");
    };
    assert_eq!(customer_ids(&view), vec!["A", "B"]);

    let a = view.customers[0].distance_km.expect("distance for A");
    let b = view.customers[1].distance_km.expect("distance for B");
    assert!(a < b);
    assert!(view.total_distance_km.is_some());
    assert!(view.total_time_minutes.is_some());
}

#[tokio::test]
async fn customer_update_reaches_drivers_but_not_other_customers() {
    let hub = hub_with(None);
    let order_id = order("order-7");

    let mut driver = hub.subscribe(&order_id, Participant::Driver).await;
    let mut other = hub
        .subscribe(&order_id, Participant::Customer(customer("c2")))
        .await;
    drain(&mut driver);
    drain(&mut other);

    hub.report_customer_location(&order_id, &customer("c1"), coordinate(20.1, 78.0), None, None)
        .await;

    let names: Vec<String> = drain(&mut driver)
        .iter()
        .map(|event| event.to_string())
        .collect();
    assert_eq!(names, vec!["customer-update", "customers-update"]);
    assert!(drain(&mut other).is_empty());
}

#[tokio::test]
async fn full_subscriber_buffer_drops_events_without_blocking_others() {
    let hub = hub_with(None);
    let order_id = order("order-8");
    let buffer = hub.settings().subscriber_buffer;

    let _stalled = hub.subscribe(&order_id, Participant::Driver).await;
    let mut reading = hub.subscribe(&order_id, Participant::Driver).await;

    for step in 0..(buffer + 5) {
        hub.report_driver_location(&order_id, coordinate(20.0, 78.0 + step as f64 * 0.001), None)
            .await;
        drain(&mut reading);
    }

    assert_eq!(hub.subscriber_count(&order_id).await, 2);
}

#[tokio::test]
async fn teardown_closes_every_stream_with_unknown_order() {
    let hub = hub_with(None);
    let order_id = order("order-9");

    hub.report_driver_location(&order_id, coordinate(20.0, 78.0), None)
        .await;
    let mut customer_stream = hub
        .subscribe(&order_id, Participant::Customer(customer("c1")))
        .await;
    drain(&mut customer_stream);

    let session = hub.teardown(&order_id).await.expect("session torn down");
    assert_eq!(session.order_id, order_id);

    match next_event(&mut customer_stream).await {
        TrackingEvent::OrderClosed(reason) => assert_eq!(reason.error_code, "UNKNOWN_ORDER"),
        other => panic!("unexpected event {other}"),
    }
    assert!(customer_stream.receiver.recv().await.is_none());
    assert!(hub.session(&order_id).await.is_none());

    assert!(matches!(
        hub.teardown(&order_id).await,
        Err(AppError::UnknownOrder(_))
    ));
}

#[tokio::test]
async fn disconnecting_unknown_order_is_rejected() {
    let hub = hub_with(None);

    let result = hub
        .disconnect_customer(&order("missing"), &customer("c1"))
        .await;

    assert!(matches!(result, Err(AppError::UnknownOrder(_))));
    assert_eq!(hub.session_count().await, 0);
}

#[tokio::test]
async fn idle_sweep_spares_orders_with_listeners() {
    let hub = hub_with(None);
    let watched = order("watched");
    let abandoned = order("abandoned");

    hub.report_driver_location(&watched, coordinate(20.0, 78.0), None)
        .await;
    hub.report_driver_location(&abandoned, coordinate(21.0, 78.0), None)
        .await;
    let _listener = hub.subscribe(&watched, Participant::Driver).await;

    let later = TimeStamp(chrono::Utc::now() + chrono::Duration::hours(2));
    let swept = hub.sweep_idle(later).await;

    assert_eq!(swept, vec![abandoned.to_owned()]);
    assert!(hub.session(&watched).await.is_some());
    assert!(hub.session(&abandoned).await.is_none());
}

#[tokio::test]
async fn unreachable_gateway_falls_back_to_straight_line() {
    let gateway: &dyn RoutingGateway = &UnreachableGateway;
    let from = coordinate(0.0, 0.0);
    let to = coordinate(0.0, 1.0);

    let estimate = estimate_travel(Some(gateway), &from, &to, KmPerHour(30.0)).await;

    assert_eq!(estimate.source, EstimateSource::StraightLine);
    assert_eq!(estimate.duration_minutes, Minutes(222));
}

#[tokio::test]
async fn road_estimate_replaces_straight_line_figures() -> anyhow::Result<()> {
    let road = TravelEstimate {
        distance_km: Kilometers(42.0),
        duration_minutes: Minutes(55),
        source: EstimateSource::Road,
    };
    let hub = hub_with(Some(Arc::new(FixedGateway {
        estimate: road,
        position: coordinate(20.1, 78.0),
    })));
    let order_id = order("order-10");

    hub.report_driver_location(&order_id, coordinate(20.0, 78.0), None)
        .await;
    hub.report_customer_location(&order_id, &customer("c1"), coordinate(20.1, 78.0), None, None)
        .await;

    tokio::time::timeout(Duration::from_secs(1), async {
        loop {
            let refined = hub
                .session(&order_id)
                .await
                .and_then(|session| session.customers.get(&customer("c1")).cloned())
                .is_some_and(|customer| customer.distance_km == Some(Kilometers(42.0)));
            if refined {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await?;

    let session = hub
        .session(&order_id)
        .await
        .expect("session exists");
    assert_eq!(session.customers[&customer("c1")].eta_minutes, Some(Minutes(55)));
    Ok(())
}

#[tokio::test]
async fn event_stream_starts_with_initial_frame() {
    let hub = hub_with(None);
    let order_id = order("order-11");
    hub.report_driver_location(&order_id, coordinate(20.0, 78.0), None)
        .await;

    let subscription = hub.subscribe(&order_id, Participant::Driver).await;
    let mut stream = Box::pin(event_stream(hub.clone(), subscription, Duration::from_secs(15)));

    let frame = stream
        .next()
        .await
        .expect("stream ended early")
        .expect("frame serialised");
    let frame = String::from_utf8(frame.to_vec()).expect("utf-8 frame");

    assert!(frame.starts_with("event: initial\ndata: {"));
    assert!(frame.ends_with("\n\n"));
    assert!(frame.contains("\"latitude\":20.0"));

    // Dropping the body is how a departed client is noticed.
    drop(stream);
    tokio::time::timeout(Duration::from_secs(1), async {
        while hub.subscriber_count(&order_id).await > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("subscriber removed after the stream is dropped");
    assert!(hub.session(&order_id).await.is_some());
}

#[tokio::test]
async fn quiet_stream_emits_keep_alive() {
    let hub = hub_with(None);
    let order_id = order("order-12");

    let subscription = hub.subscribe(&order_id, Participant::Driver).await;
    let stream = event_stream(hub.clone(), subscription, Duration::from_millis(20));
    futures::pin_mut!(stream);

    let initial = stream.next().await.expect("initial").expect("frame");
    assert!(initial.starts_with(b"event: initial"));

    let keep_alive = tokio::time::timeout(Duration::from_secs(1), stream.next())
        .await
        .expect("keep-alive within a second")
        .expect("stream open")
        .expect("frame");
    assert_eq!(keep_alive, keep_alive_frame());
}

#[tokio::test]
async fn unbounded_idle_timeout_never_sweeps_a_fresh_session() {
    let hub = hub_with_config(
        TrackingConfig {
            session_idle_timeout: u64::MAX,
            ..TrackingConfig::default()
        },
        None,
    );
    let order_id = order("order-13");

    hub.report_driver_location(&order_id, coordinate(20.0, 78.0), None)
        .await;
    let swept = hub.sweep_idle(TimeStamp::now()).await;

    assert!(swept.is_empty());
    assert!(hub.session(&order_id).await.is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_reports_on_one_order_are_all_kept() -> anyhow::Result<()> {
    let hub = hub_with_config(
        TrackingConfig {
            subscriber_buffer: 1024,
            ..TrackingConfig::default()
        },
        None,
    );
    let order_id = order("order-14");
    let mut driver = hub.subscribe(&order_id, Participant::Driver).await;

    let reports: Vec<_> = (0..100u32)
        .map(|step| {
            let hub = hub.clone();
            let order_id = order_id.to_owned();
            tokio::spawn(async move {
                let offset = f64::from(step) * 0.001;
                hub.report_customer_location(
                    &order_id,
                    &customer(&format!("c{step}")),
                    coordinate(20.0 + offset, 78.0),
                    None,
                    None,
                )
                .await;
                if step % 10 == 0 {
                    hub.report_driver_location(&order_id, coordinate(20.0, 78.0 + offset), None)
                        .await;
                }
            })
        })
        .collect();
    for report in reports {
        report.await?;
    }

    let session = hub.session(&order_id).await.expect("session exists");
    assert_eq!(session.customers.len(), 100);

    let last_view = drain(&mut driver)
        .into_iter()
        .filter_map(|event| match event {
            TrackingEvent::CustomersUpdate(view) => Some(view),
            _ => None,
        })
        .last()
        .expect("customers-update received");

    assert_eq!(last_view.driver, session.driver);
    let mut listed = last_view.customers;
    listed.sort_by(|a, b| a.id.cmp(&b.id));
    assert_eq!(listed, session.customers_by_id());
    Ok(())
}

#[tokio::test]
async fn road_figures_do_not_reorder_the_driver_view() -> anyhow::Result<()> {
    let near = coordinate(20.1, 78.0);
    let far = coordinate(20.5, 78.0);
    let road = |km: f64, minutes| TravelEstimate {
        distance_km: Kilometers(km),
        duration_minutes: Minutes(minutes),
        source: EstimateSource::Road,
    };
    let hub = hub_with(Some(Arc::new(RoadTable(vec![
        (near, road(80.0, 90)),
        (far, road(60.0, 70)),
    ]))));
    let order_id = order("order-15");

    hub.report_driver_location(&order_id, coordinate(20.0, 78.0), None)
        .await;
    hub.report_customer_location(&order_id, &customer("A"), near, None, None)
        .await;
    hub.report_customer_location(&order_id, &customer("B"), far, None, None)
        .await;

    tokio::time::timeout(Duration::from_secs(1), async {
        loop {
            let refined = hub.session(&order_id).await.is_some_and(|session| {
                session.customers.get(&customer("A")).and_then(|c| c.distance_km)
                    == Some(Kilometers(80.0))
                    && session.customers.get(&customer("B")).and_then(|c| c.distance_km)
                        == Some(Kilometers(60.0))
            });
            if refined {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await?;

    let mut driver = hub.subscribe(&order_id, Participant::Driver).await;
    let TrackingEvent::Initial(Snapshot::Driver(view)) = next_event(&mut driver).await else {
        panic!("driver snapshot expected");
    };

    assert_eq!(customer_ids(&view), vec!["A", "B"]);
    assert_eq!(view.customers[0].distance_km, Some(Kilometers(80.0)));
    assert_eq!(view.customers[1].distance_km, Some(Kilometers(60.0)));
    Ok(())
}

#[tokio::test]
async fn reporting_connection_is_skipped_during_fan_out() {
    let hub = hub_with(None);
    let order_id = order("order-16");

    let mut reporter = hub.subscribe(&order_id, Participant::Driver).await;
    let mut watcher = hub.subscribe(&order_id, Participant::Driver).await;
    let mut rider = hub
        .subscribe(&order_id, Participant::Customer(customer("c1")))
        .await;
    drain(&mut reporter);
    drain(&mut watcher);
    drain(&mut rider);

    let reporter_id = reporter.connection_id.to_owned();
    hub.report_driver_location(&order_id, coordinate(20.0, 78.0), Some(&reporter_id))
        .await;

    let names = |events: Vec<TrackingEvent>| -> Vec<String> {
        events.iter().map(|event| event.to_string()).collect()
    };
    assert!(drain(&mut reporter).is_empty());
    assert_eq!(names(drain(&mut watcher)), vec!["customers-update"]);
    assert_eq!(names(drain(&mut rider)), vec!["driver-update"]);
}

#[tokio::test]
async fn session_copy_is_detached_from_live_state() {
    let hub = hub_with(None);
    let order_id = order("order-17");
    hub.report_driver_location(&order_id, coordinate(20.0, 78.0), None)
        .await;
    let mut driver = hub.subscribe(&order_id, Participant::Driver).await;
    drain(&mut driver);

    let mut copy = hub.session(&order_id).await.expect("session exists");
    copy.driver = None;

    let live = hub.session(&order_id).await.expect("session exists");
    assert!(live.driver.is_some());
    assert_eq!(hub.session_count().await, 1);
    assert!(drain(&mut driver).is_empty());
}
